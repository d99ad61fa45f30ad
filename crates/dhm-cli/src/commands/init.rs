use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use dhm_core::config;
use dhm_core::state::{DhmMode, ReconstructionState};

#[derive(Clone, ValueEnum)]
pub enum ModeArg {
    OffAxis,
    Inline,
}

#[derive(Args)]
pub struct InitArgs {
    /// Receipt path to create
    #[arg(default_value = "receipt.toml")]
    pub output: PathBuf,

    /// Acquisition mode recorded in the receipt
    #[arg(long, value_enum, default_value = "off-axis")]
    pub mode: ModeArg,
}

pub fn run(args: &InitArgs) -> Result<()> {
    let mode = match args.mode {
        ModeArg::OffAxis => DhmMode::OffAxis,
        ModeArg::Inline => DhmMode::Inline,
    };
    let state = ReconstructionState::new(mode);
    config::store(&state, &args.output)?;
    println!("Wrote default receipt to {}", args.output.display());
    println!("Fill in File_Paths and System_Parameters before running.");
    Ok(())
}
