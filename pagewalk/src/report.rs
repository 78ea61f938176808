use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use crate::{
    config::{Config, Mode, MIB},
    walk::Progress,
};

pub(crate) fn round_to_millis(duration: Duration) -> Duration {
    let millis = (duration.as_nanos() + 500_000) / 1_000_000;
    Duration::from_millis(millis as u64)
}

struct Elapsed(Duration);

impl Display for Elapsed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rounded = round_to_millis(self.0);
        if rounded.is_zero() {
            write!(f, "0ms")
        } else {
            write!(f, "{}", humantime::format_duration(rounded))
        }
    }
}

pub(crate) struct ConfigEcho<'a>(pub(crate) &'a Config);

impl Display for ConfigEcho<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let cfg = self.0;
        writeln!(f, "mode:           {} ({})", cfg.mode, cfg.mode.description())?;
        writeln!(f, "size:           {} MiB ({} bytes)", cfg.size_mib, cfg.size_bytes)?;
        writeln!(f, "page size:      {} bytes", cfg.page_size)?;
        writeln!(f, "pause interval: {} MiB", cfg.pause_interval / MIB)
    }
}

pub(crate) struct Checkpoint {
    pub(crate) progress: Progress,
    pub(crate) size_mib: usize,
    pub(crate) elapsed: Duration,
}

impl Display for Checkpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let processed_mib = self.progress.processed_bytes / MIB;
        let percent = processed_mib as f64 / self.size_mib as f64 * 100.0;
        writeln!(
            f,
            "processed: {} MiB of {} MiB ({:.1}%)",
            processed_mib, self.size_mib, percent
        )?;
        writeln!(f, "elapsed: {}", Elapsed(self.elapsed))
    }
}

pub(crate) struct Summary {
    pub(crate) mode: Mode,
    pub(crate) progress: Progress,
    pub(crate) elapsed: Duration,
}

impl Summary {
    /// MiB per second, `None` when the clock did not move.
    pub(crate) fn throughput(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            Some(self.progress.processed_bytes as f64 / MIB as f64 / secs)
        } else {
            None
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "done")?;
        writeln!(f, "total time:  {}", Elapsed(self.elapsed))?;
        writeln!(f, "processed:   {} MiB", self.progress.processed_bytes / MIB)?;
        writeln!(f, "pages:       {}", self.progress.pages)?;
        match self.throughput() {
            Some(throughput) => writeln!(f, "throughput:  {:.2} MiB/s", throughput)?,
            None => writeln!(f, "throughput:  n/a")?,
        }
        if self.mode == Mode::Read {
            writeln!(f, "checksum:    {}", self.progress.checksum)?;
        }
        Ok(())
    }
}
