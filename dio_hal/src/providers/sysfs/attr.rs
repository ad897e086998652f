//! Sysfs attribute I/O.
//!
//! Control files (`export` / `unexport`) take a decimal index per write and
//! are opened in append mode so each write is one command. Attribute files
//! (`direction`, `period`, ...) are rewritten in full on every write. Nodes are
//! never created: a missing node is an error, not an empty file.
//!
//! Every write is logged at debug level with `path` and `value` (or `index`)
//! fields, one event per write, in the order the writes are issued.

use dio_common::hal::provider::HalError;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write one index to an `export` / `unexport` control file.
pub(crate) fn write_control(path: &Path, index: u32) -> Result<(), HalError> {
    debug!(path = %path.display(), index, "sysfs control write");
    OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(format!("{index}\n").as_bytes()))
        .map_err(|e| HalError::io(format!("writing {index} to {}", path.display()), e))
}

/// Replace the content of an attribute file.
pub(crate) fn write_attr(path: &Path, value: &str) -> Result<(), HalError> {
    debug!(path = %path.display(), value, "sysfs write");
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .and_then(|mut f| f.write_all(value.as_bytes()))
        .map_err(|e| HalError::io(format!("writing {value:?} to {}", path.display()), e))
}

/// Returns true if the current process may write `path`.
pub(crate) fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
}

/// Persistent read/write handle on one attribute, for repeated low-latency
/// access (`value`, `duty_cycle`).
#[derive(Debug)]
pub(crate) struct AttrFile {
    file: File,
    path: PathBuf,
}

impl AttrFile {
    /// Open an existing attribute for read/write.
    pub(crate) fn open(path: PathBuf) -> Result<Self, HalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HalError::io(format!("opening {}", path.display()), e))?;
        Ok(Self { file, path })
    }

    /// Rewrite the attribute from offset 0.
    ///
    /// The trailing `set_len` keeps regular files (fake trees) consistent when
    /// the new value is shorter than the old one; sysfs ignores it.
    pub(crate) fn write(&mut self, value: &str) -> Result<(), HalError> {
        debug!(path = %self.path.display(), value, "sysfs write");
        self.write_inner(value)
            .map_err(|e| HalError::io(format!("writing {value:?} to {}", self.path.display()), e))
    }

    fn write_inner(&mut self, value: &str) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(value.as_bytes())?;
        self.file.set_len(value.len() as u64)?;
        Ok(())
    }

    /// Read the attribute from offset 0, trimmed.
    pub(crate) fn read(&mut self) -> Result<String, HalError> {
        let mut buf = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut buf))
            .map_err(|e| HalError::io(format!("reading {}", self.path.display()), e))?;
        Ok(buf.trim().to_string())
    }

    /// Read and parse the attribute as an unsigned integer.
    ///
    /// A non-numeric value is reported as `HalError::Io` with
    /// `ErrorKind::InvalidData`.
    pub(crate) fn read_u64(&mut self) -> Result<u64, HalError> {
        let raw = self.read()?;
        raw.parse::<u64>().map_err(|e| {
            HalError::io(
                format!("parsing {:?} from {}", raw, self.path.display()),
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })
    }
}
