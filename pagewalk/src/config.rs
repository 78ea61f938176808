use std::{
    fmt::{Display, Formatter},
    num::NonZeroUsize,
    str::FromStr,
};

pub(crate) const MIB: usize = 1 << 20;

// used when the os refuses to report a page size
pub(crate) const FALLBACK_PAGE_SIZE: usize = 4096;

pub(crate) const PAUSE_INTERVAL: usize = 128 * MIB;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub(crate) enum UsageError {
    #[error("mode must be 'r' or 'w', got '{0}'")]
    InvalidMode(String),
    #[error("size must be a positive number of MiB, got '{0}'")]
    InvalidSize(String),
    #[error("{0} MiB does not fit into the address space")]
    SizeOverflow(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Read,
    Write,
}

impl Mode {
    pub(crate) fn description(&self) -> &'static str {
        match self {
            Mode::Read => "read from every page",
            Mode::Write => "write on every page",
        }
    }
}

impl FromStr for Mode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Mode::Read),
            "w" => Ok(Mode::Write),
            other => Err(UsageError::InvalidMode(other.to_string())),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Read => write!(f, "r"),
            Mode::Write => write!(f, "w"),
        }
    }
}

/// Buffer size in mebibytes. Zero is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SizeMib(NonZeroUsize);

impl SizeMib {
    pub(crate) fn get(&self) -> usize {
        self.0.get()
    }

    pub(crate) fn bytes(&self) -> Result<usize, UsageError> {
        self.get()
            .checked_mul(MIB)
            .ok_or(UsageError::SizeOverflow(self.get()))
    }
}

impl FromStr for SizeMib {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // usize parsing already rejects signs other than '+', so "-5" fails here
        s.parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .map(SizeMib)
            .ok_or_else(|| UsageError::InvalidSize(s.to_string()))
    }
}

impl Display for SizeMib {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) mode: Mode,
    pub(crate) size_mib: usize,
    pub(crate) size_bytes: usize,
    pub(crate) page_size: usize,
    pub(crate) pause_interval: usize,
}

impl Config {
    pub(crate) fn new(mode: Mode, size: SizeMib) -> Result<Self, UsageError> {
        Ok(Config {
            mode,
            size_mib: size.get(),
            size_bytes: size.bytes()?,
            page_size: page_size(),
            pause_interval: PAUSE_INTERVAL,
        })
    }
}

pub(crate) fn page_size() -> usize {
    let rst = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if rst > 0 {
        rst as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("r".parse::<Mode>(), Ok(Mode::Read));
        assert_eq!("w".parse::<Mode>(), Ok(Mode::Write));
        for invalid in ["x", "", "R", "rw", " r", "read"] {
            assert_eq!(
                invalid.parse::<Mode>(),
                Err(UsageError::InvalidMode(invalid.to_string())),
                "mode {:?} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_size_parse() {
        assert_eq!("1".parse::<SizeMib>().map(|s| s.get()), Ok(1));
        assert_eq!("2048".parse::<SizeMib>().map(|s| s.get()), Ok(2048));
        for invalid in ["0", "-1", "-0", "abc", "", "1.5", "10MiB"] {
            assert_eq!(
                invalid.parse::<SizeMib>(),
                Err(UsageError::InvalidSize(invalid.to_string())),
                "size {:?} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_size_overflow() {
        let size: SizeMib = usize::MAX.to_string().parse().expect("max usize is a valid size");
        assert_eq!(size.bytes(), Err(UsageError::SizeOverflow(usize::MAX)));
        assert!(Config::new(Mode::Read, size).is_err());
    }

    #[test]
    fn test_config() {
        let cfg = Config::new(Mode::Write, "3".parse().unwrap()).unwrap();
        assert_eq!(cfg.size_mib, 3);
        assert_eq!(cfg.size_bytes, 3 << 20);
        assert_eq!(cfg.pause_interval, 128 << 20);
        assert!(cfg.page_size > 0);
        assert!(cfg.page_size.is_power_of_two());
    }
}
