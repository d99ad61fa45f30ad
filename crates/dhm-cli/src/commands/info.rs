use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use dhm_core::config;
use dhm_core::state::DhmMode;

#[derive(Args)]
pub struct InfoArgs {
    /// Config receipt to summarize
    pub receipt: PathBuf,

    /// Inspect a saved in-line volume slice (FRAME:SLICE, 0-based)
    #[arg(long)]
    pub slice: Option<String>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mut state = config::load(&args.receipt)?;

    println!("{}", style("Receipt").bold());
    println!("  mode:        {}", state.mode());
    println!("  frames dir:  {}", state.read_dir().display());
    println!("  background:  {}", state.back_path().display());
    match state.save_dir() {
        Some(dir) => println!("  save dir:    {}", dir.display()),
        None => println!("  save dir:    {}", style("(not set, outputs discarded)").dim()),
    }

    let sys = state.system();
    println!("{}", style("Optics").bold());
    println!(
        "  pixel pitch: {} x {} um, magnification {}x",
        sys.pixel_x_um(),
        sys.pixel_y_um(),
        sys.magnification()
    );
    println!(
        "  wavelength:  {} nm, refractive index {}",
        sys.wavelength_nm(),
        sys.refractive_index()
    );

    println!("{}", style("Reconstruction").bold());
    match state.mode() {
        DhmMode::OffAxis => {
            println!("  distance:    {} um", state.recon().diffraction_distance);
            let filt = state.filter();
            println!(
                "  filter:      {} in quadrant {}, rate {:.0}%, pad {} px",
                filt.kind,
                filt.quadrant,
                filt.rate * 100.0,
                filt.apodization_pad
            );
        }
        DhmMode::Inline => {
            let rec = state.recon();
            println!(
                "  z-stack:     {} to {} um in {} slices",
                rec.z_start, rec.z_end, rec.z_slices
            );
        }
    }

    if let Some(spec) = &args.slice {
        let (frame, slice) = spec
            .split_once(':')
            .with_context(|| format!("expected FRAME:SLICE, got '{spec}'"))?;
        let frame: usize = frame.trim().parse().context("invalid frame index")?;
        let slice: usize = slice.trim().parse().context("invalid slice index")?;

        state.load_volume_slice(frame, slice)?;
        let data = &state.buffers.volume_slice;
        let (min, max) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        println!("{}", style("Volume slice").bold());
        println!(
            "  frame {frame}, slice {slice}: {}x{} px, intensity {min:.4}..{max:.4}",
            data.nrows(),
            data.ncols()
        );
    }

    let (start, end) = state.range();
    match state.refresh_frame_list() {
        Ok(total) => {
            println!(
                "  range:       frames {start}..={end} of {total} in series"
            );
        }
        Err(e) => {
            println!(
                "  range:       frames {start}..={end} ({})",
                style(format!("series unavailable: {e}")).yellow()
            );
        }
    }

    Ok(())
}
