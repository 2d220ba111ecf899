//! Per-object listing printed to stdout as downloads complete.

use std::{
    io::{self, Write},
    path::Path,
    sync::{Mutex, PoisonError},
};

/// Line-oriented report of processed objects.
///
/// Lines are written whole under a lock so concurrent tasks never interleave.
pub struct Listing {
    verbose: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Listing {
    pub fn new(verbose: bool, out: impl Write + Send + 'static) -> Self {
        Self {
            verbose,
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout(verbose: bool) -> Self {
        Self::new(verbose, io::stdout())
    }

    /// Record one object. `size` is the byte count written, or the declared
    /// size when nothing was downloaded.
    pub fn record(&self, name: &str, path: &Path, size: u64) -> io::Result<()> {
        let line = if self.verbose {
            format!("{} --> {} (size={})\n", name, path.display(), size)
        } else {
            format!("{}\n", name)
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}
