#![deny(clippy::all)]

use anyhow::Context;
use ruc::{compile, Target};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, process};
use structopt::StructOpt;

/// Optional JSON config file consulted by `compile --config`, for include
/// directories a project wants applied on every invocation without
/// repeating `--include` at the command line.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CompileConfig {
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
}

/// The sub-command to execute.
#[derive(Debug, StructOpt)]
enum Command {
    /// Compile source code to textual IR.
    #[structopt(name = "compile")]
    Compile {
        /// Path to the source code file.
        #[structopt(parse(from_os_str), long = "source", short = "s")]
        source_path: PathBuf,
        /// Target the emitted module at x86_64-pc-linux-gnu (the default).
        #[structopt(long = "x86_64", conflicts_with = "mipsel")]
        x86_64: bool,
        /// Target the emitted module at mipsel-unknown-linux-gnu.
        #[structopt(long = "mipsel")]
        mipsel: bool,
        /// Additional `#include "..."` search directories, checked in order
        /// after the including file's own directory.
        #[structopt(parse(from_os_str), long = "include")]
        include_dirs: Vec<PathBuf>,
        /// Path to a JSON config file providing additional include
        /// directories.
        #[structopt(parse(from_os_str), long = "config")]
        config_path: Option<PathBuf>,
        /// Where to write the emitted IR. Defaults to stdout.
        #[structopt(parse(from_os_str), long = "output", short = "o")]
        output_path: Option<PathBuf>,
    },
}

/// RuC: compiles source code to textual IR.
#[derive(Debug, StructOpt)]
#[structopt(name = "ruc")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Command,
}

fn read_file(path: &PathBuf) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

fn load_config(path_opt: &Option<PathBuf>) -> anyhow::Result<CompileConfig> {
    match path_opt {
        None => Ok(CompileConfig::default()),
        Some(path) => {
            let config_str = read_file(path)?;
            serde_json::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file {:?}", path))
        }
    }
}

fn run(opt: Opt) -> anyhow::Result<()> {
    match opt.cmd {
        Command::Compile {
            source_path,
            x86_64: _,
            mipsel,
            mut include_dirs,
            config_path,
            output_path,
        } => {
            let config = load_config(&config_path)?;
            include_dirs.extend(config.include_dirs);

            let target = if mipsel { Target::Mipsel } else { Target::X86_64 };

            let source = read_file(&source_path)?;
            let ir = compile(&source, include_dirs, target)
                .map_err(|err| anyhow::anyhow!("{:#}", err))
                .with_context(|| format!("Failed to compile {:?}", source_path))?;

            match output_path {
                Some(path) => fs::write(&path, ir)
                    .with_context(|| format!("Failed to write output file {:?}", path))?,
                None => println!("{}", ir),
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let exit_code = match run(Opt::from_args()) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    };
    process::exit(exit_code);
}
