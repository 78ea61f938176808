use crate::{buffer::PageBuffer, config::Mode};

/// Value stored at the start of every page in write mode.
pub(crate) const SENTINEL: u8 = 0x42;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Progress {
    // number of pages touched so far
    pub(crate) pages: usize,
    // grows by a full page per touch, so it can exceed the buffer length on the last page
    pub(crate) processed_bytes: usize,
    // wrapping sum of every sampled byte, stays zero in write mode
    pub(crate) checksum: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Walk {
    pub(crate) mode: Mode,
    pub(crate) page_size: usize,
    pub(crate) pause_interval: usize,
}

impl Walk {
    /// Touches the first byte of every page in ascending order.
    ///
    /// `checkpoint` is called every time `processed_bytes` lands on a multiple of
    /// `pause_interval`. It only gets a copy of the progress and can't influence the walk.
    pub(crate) fn run(&self, buffer: &mut PageBuffer, mut checkpoint: impl FnMut(Progress)) -> Progress {
        assert!(self.page_size > 0, "page size must be positive");
        assert!(self.pause_interval > 0, "pause interval must be positive");
        let mut progress = Progress::default();
        for offset in (0..buffer.len()).step_by(self.page_size) {
            match self.mode {
                Mode::Write => buffer.touch_write(offset, SENTINEL),
                Mode::Read => {
                    progress.checksum = progress.checksum.wrapping_add(buffer.touch_read(offset) as u64);
                }
            }
            progress.pages += 1;
            progress.processed_bytes += self.page_size;
            if progress.processed_bytes % self.pause_interval == 0 {
                checkpoint(progress);
            }
        }
        progress
    }
}
