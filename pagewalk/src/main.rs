use std::{
    io::{self, BufRead, Write},
    process,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    buffer::{count_non_zero, PageBuffer},
    config::{Config, Mode, SizeMib, MIB},
    gate::Gate,
    probe::{MemoryProbe, ProcessProbe},
    report::{Checkpoint, ConfigEcho, Summary},
    walk::{Progress, Walk},
};

mod buffer;
mod config;
mod gate;
mod probe;
mod report;
mod walk;

const PRESCAN_BYTES: usize = 1024;

#[derive(Debug, Parser)]
#[command(author, version, about, allow_negative_numbers = true)]
struct Opt {
    #[clap(index(1), help = "r - read one byte from every page, w - write one byte to every page")]
    mode: Mode,
    #[clap(index(2), help = "size of the buffer in MiB")]
    size: SizeMib,
    // anything after the size is accepted and ignored
    #[clap(index(3), hide = true, num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
    _ignored: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => usage(err),
    };
    let cfg = match Config::new(opt.mode, opt.size) {
        Ok(cfg) => cfg,
        Err(err) => usage(Opt::command().error(ErrorKind::ValueValidation, err)),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&cfg, &ProcessProbe::new(), stdin.lock(), stdout.lock())?;
    Ok(())
}

fn usage(err: clap::Error) -> ! {
    let rendered = err.render().to_string();
    let mut stdout = io::stdout().lock();
    // stdout may already be closed, the exit code is what matters then
    let _ = write!(stdout, "{}", rendered);
    if !rendered.contains("Usage:") {
        let _ = writeln!(stdout, "\n{}", Opt::command().render_usage());
    }
    let _ = stdout.flush();
    process::exit(1)
}

/// Allocates the buffer, walks it and reports along the way.
///
/// The buffer lives until this function returns, on every path.
fn run(cfg: &Config, probe: &impl MemoryProbe, input: impl BufRead, mut out: impl Write) -> Result<Progress> {
    let mut gate = Gate::new(input);
    write!(out, "{}", ConfigEcho(cfg))?;

    let mut buffer = PageBuffer::allocate(cfg.size_bytes);
    info!(
        "allocated {} MiB, page size {} bytes",
        cfg.size_mib, cfg.page_size
    );

    let prescan = count_non_zero(&buffer[..PRESCAN_BYTES.min(buffer.len())]);
    writeln!(out, "non-zero bytes in first KiB: {} of {}", prescan, PRESCAN_BYTES)?;
    print_stats(probe, &mut out)?;

    writeln!(out, "\nstarting in mode '{}', press enter to continue", cfg.mode)?;
    out.flush()?;
    gate.wait();

    let walk = Walk {
        mode: cfg.mode,
        page_size: cfg.page_size,
        pause_interval: cfg.pause_interval,
    };
    let start = Instant::now();
    // the loop can't fail, so output errors are held until it finishes
    let mut deferred: Result<()> = Ok(());
    let progress = walk.run(&mut buffer, |progress| {
        debug!("checkpoint at {} bytes", progress.processed_bytes);
        if deferred.is_err() {
            gate.wait();
            return;
        }
        let checkpoint = Checkpoint {
            progress,
            size_mib: cfg.size_mib,
            elapsed: start.elapsed(),
        };
        deferred = write_checkpoint(&checkpoint, probe, &mut out);
        gate.wait();
    });
    let elapsed = start.elapsed();
    deferred.context("writing checkpoint")?;

    let summary = Summary {
        mode: cfg.mode,
        progress,
        elapsed,
    };
    write!(out, "\n{}", summary)?;
    print_stats(probe, &mut out)?;
    out.flush()?;
    info!("processed {} MiB in {:?}", progress.processed_bytes / MIB, elapsed);
    gate.wait();
    Ok(progress)
}

fn write_checkpoint(checkpoint: &Checkpoint, probe: &impl MemoryProbe, out: &mut impl Write) -> Result<()> {
    write!(out, "{}", checkpoint)?;
    print_stats(probe, out)?;
    writeln!(out, "press enter to continue")?;
    out.flush()?;
    Ok(())
}

fn print_stats(probe: &impl MemoryProbe, out: &mut impl Write) -> Result<()> {
    match probe.snapshot() {
        Ok(snapshot) => write!(out, "{}", snapshot)?,
        Err(err) => {
            warn!("collecting memory stats: {:?}", err);
            writeln!(out, "memory stats: unavailable")?;
        }
    }
    Ok(())
}
