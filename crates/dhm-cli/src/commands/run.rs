use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use dhm_core::batch::{self, BatchObserver, BatchOutcome, CancelToken};
use dhm_core::config;

#[derive(Args)]
pub struct RunArgs {
    /// Config receipt describing the run
    pub receipt: PathBuf,

    /// Override the processing range, 0-based inclusive (START:END)
    #[arg(long)]
    pub frames: Option<String>,
}

struct ProgressObserver {
    bar: ProgressBar,
}

impl BatchObserver for ProgressObserver {
    fn frame_finished(&self, _index: usize) {
        self.bar.inc(1);
    }
}

fn parse_range(spec: &str) -> Result<(usize, usize)> {
    let (a, b) = spec
        .split_once(':')
        .with_context(|| format!("expected START:END, got '{spec}'"))?;
    let start: usize = a.trim().parse().context("invalid range start")?;
    let end: usize = b.trim().parse().context("invalid range end")?;
    Ok((start, end))
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut state = config::load(&args.receipt)?;

    let total = state.refresh_frame_list()?;
    if total == 0 {
        bail!("no image frames found in {}", state.read_dir().display());
    }

    if let Some(spec) = &args.frames {
        let (start, end) = parse_range(spec)?;
        state.set_range(start, end)?;
    }
    // Receipts written against a longer series are clamped to what exists.
    let (start, end) = state.range();
    let end = end.min(total - 1);
    state.set_range(start.min(end), end)?;

    println!(
        "Reconstructing frames {start}..={end} ({} mode)",
        state.mode()
    );

    let bar = ProgressBar::new((end - start + 1) as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("Frames [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let observer = ProgressObserver { bar: bar.clone() };

    let token = CancelToken::new();
    let outcome = batch::run_batch(&mut state, &token, &observer)?;
    bar.finish();

    match outcome {
        BatchOutcome::Completed { frames } => {
            println!("Done: {frames} frames reconstructed");
        }
        BatchOutcome::Cancelled {
            checkpoint,
            last_completed,
        } => {
            let resume = last_completed.map(|i| i + 1).unwrap_or(start);
            println!(
                "Cancelled {} (code {}); resume with --frames {resume}:{end}",
                checkpoint,
                checkpoint.code()
            );
        }
    }

    Ok(())
}
