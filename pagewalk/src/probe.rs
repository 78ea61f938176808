use std::{
    fmt::{Display, Formatter},
    fs, io, mem,
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::config::MIB;

/// Point-in-time view of the process memory footprint.
///
/// Any field a provider could not obtain is left as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MemorySnapshot {
    pub(crate) resident_bytes: Option<u64>,
    pub(crate) peak_resident_bytes: Option<u64>,
    pub(crate) virtual_bytes: Option<u64>,
    pub(crate) minor_faults: Option<u64>,
    pub(crate) major_faults: Option<u64>,
}

/// Source of memory statistics. Sampling must not have side effects on the caller.
pub(crate) trait MemoryProbe {
    fn snapshot(&self) -> Result<MemorySnapshot>;
}

/// Reads `/proc/<pid>/status` when available and complements it with `getrusage`.
#[derive(Debug)]
pub(crate) struct ProcessProbe {
    status: PathBuf,
}

impl ProcessProbe {
    pub(crate) fn new() -> Self {
        Self {
            status: PathBuf::from("/proc/self/status"),
        }
    }
}

impl MemoryProbe for ProcessProbe {
    fn snapshot(&self) -> Result<MemorySnapshot> {
        let mut snapshot = MemorySnapshot::default();
        match fs::read_to_string(&self.status) {
            Ok(status) => parse_status(&status, &mut snapshot),
            // not linux, or procfs is not mounted. rusage still works.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).with_context(|| format!("reading {}", self.status.display())),
        }
        let usage = rusage().context("getrusage")?;
        snapshot.minor_faults = Some(usage.ru_minflt as u64);
        snapshot.major_faults = Some(usage.ru_majflt as u64);
        if snapshot.peak_resident_bytes.is_none() {
            snapshot.peak_resident_bytes = Some(maxrss_bytes(usage.ru_maxrss as u64));
        }
        Ok(snapshot)
    }
}

fn rusage() -> Result<libc::rusage, io::Error> {
    let mut usage = unsafe { mem::zeroed::<libc::rusage>() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(usage)
    }
}

// ru_maxrss is kilobytes everywhere except macos
#[cfg(target_os = "macos")]
fn maxrss_bytes(maxrss: u64) -> u64 {
    maxrss
}

#[cfg(not(target_os = "macos"))]
fn maxrss_bytes(maxrss: u64) -> u64 {
    maxrss * 1024
}

// example lines
// VmPeak:	  1187836 kB
// VmSize:	  1187836 kB
// VmHWM:	     4764 kB
// VmRSS:	     4764 kB
fn parse_status(status: &str, snapshot: &mut MemorySnapshot) {
    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let field = match key {
            "VmRSS" => &mut snapshot.resident_bytes,
            "VmHWM" => &mut snapshot.peak_resident_bytes,
            "VmSize" => &mut snapshot.virtual_bytes,
            _ => continue,
        };
        *field = parse_kb(value);
    }
}

fn parse_kb(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let amount = parts.next()?.parse::<u64>().ok()?;
    match parts.next() {
        Some("kB") | None => Some(amount * 1024),
        Some(_) => None,
    }
}

struct Mib(Option<u64>);

impl Display for Mib {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(bytes) => write!(f, "{:>6} MiB", bytes / MIB as u64),
            None => write!(f, "{:>6}    ", "n/a"),
        }
    }
}

struct Count(Option<u64>);

impl Display for Count {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(count) => write!(f, "{:>6}    ", count),
            None => write!(f, "{:>6}    ", "n/a"),
        }
    }
}

impl Display for MemorySnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "memory stats:")?;
        writeln!(f, "  resident:     {} (pages backed by physical memory)", Mib(self.resident_bytes))?;
        writeln!(f, "  peak rss:     {} (high water mark of resident)", Mib(self.peak_resident_bytes))?;
        writeln!(f, "  virtual:      {} (address space reserved from the os)", Mib(self.virtual_bytes))?;
        writeln!(f, "  minor faults: {} (pages mapped without io)", Count(self.minor_faults))?;
        writeln!(f, "  major faults: {} (pages that required io)", Count(self.major_faults))
    }
}
