use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use log::info;
use pdt10::MatchBackend;
use std::path::PathBuf;

mod batch;
mod bitmap;

use batch::{Mode, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "pdt10",
    version,
    about = "Convert a directory of bitmaps to PDT10 containers, or back again"
)]
struct Cli {
    /// compress png/bmp files, or decompress .pdt files
    #[arg(value_enum)]
    mode: Mode,

    input_dir: PathBuf,

    output_dir: PathBuf,

    /// How copy-backs are searched for when compressing
    #[arg(short, long, value_enum, default_value_t = Backend::Indexed)]
    backend: Backend,

    /// Write a token trace next to every output file
    #[arg(long)]
    trace: bool,

    /// Log more; repeat for a per-file trace level
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Backend {
    Indexed,
    Linear,
}

impl From<Backend> for MatchBackend {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Indexed => MatchBackend::Indexed,
            Backend::Linear => MatchBackend::Linear,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = Settings {
        backend: cli.backend.into(),
        trace: cli.trace,
    };
    let summary = batch::run(cli.mode, &cli.input_dir, &cli.output_dir, &settings)?;
    info!("{}", summary);

    Ok(())
}
