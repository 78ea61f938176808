use std::io::{self, BufRead};

use tracing::{debug, warn};

/// Blocks until the operator sends a line. Content is discarded.
pub(crate) struct Gate<R> {
    reader: R,
    scratch: Vec<u8>,
    closed: bool,
}

impl<R: BufRead> Gate<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: vec![],
            closed: false,
        }
    }

    /// Consumes input up to and including the next newline.
    ///
    /// Returns immediately once the input has reached eof. Read errors are logged and treated
    /// the same way, the walk is never stopped by the gate.
    pub(crate) fn wait(&mut self) {
        if self.closed {
            return;
        }
        self.scratch.clear();
        loop {
            match self.reader.read_until(b'\n', &mut self.scratch) {
                Ok(0) => {
                    debug!("operator input closed, gates will not block anymore");
                    self.closed = true;
                    return;
                }
                Ok(_) => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("reading operator input: {:?}", err);
                    self.closed = true;
                    return;
                }
            }
        }
    }
}
