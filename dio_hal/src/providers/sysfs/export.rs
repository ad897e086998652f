//! Export / unexport protocol shared by GPIO lines and PWM channels.
//!
//! A `SysfsExporter` owns one class directory that has `export` and
//! `unexport` control files and `<prefix><N>` child nodes:
//! `/sys/class/gpio` (`gpio<N>`) or `/sys/class/pwm/pwmchip<C>` (`pwm<N>`).

use dio_common::consts::{EXPORT_FILE, UNEXPORT_FILE};
use dio_common::hal::provider::HalError;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::attr::{is_writable, write_control};

/// Drives `export` / `unexport` for one sysfs class directory.
#[derive(Debug, Clone)]
pub struct SysfsExporter {
    class_dir: PathBuf,
    node_prefix: &'static str,
    poll_interval: Duration,
    timeout: Duration,
}

impl SysfsExporter {
    /// Exporter for `class_dir`, whose nodes are named `<node_prefix><N>`.
    pub fn new(
        class_dir: PathBuf,
        node_prefix: &'static str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            class_dir,
            node_prefix,
            poll_interval,
            timeout,
        }
    }

    /// Class directory holding the control files.
    pub fn class_dir(&self) -> &Path {
        &self.class_dir
    }

    /// Directory of node `index`.
    pub fn node_dir(&self, index: u32) -> PathBuf {
        self.class_dir.join(format!("{}{}", self.node_prefix, index))
    }

    /// Returns true if node `index` currently exists.
    pub fn is_exported(&self, index: u32) -> bool {
        self.node_dir(index).is_dir()
    }

    /// Export node `index` and wait until its `probe` attribute is writable.
    ///
    /// The export write is skipped if the node already exists. The wait polls
    /// every `poll_interval` up to `timeout`; on timeout the node is
    /// unexported before `HalError::Timeout` is returned.
    pub fn export(&self, index: u32, probe: &str) -> Result<PathBuf, HalError> {
        let node = self.node_dir(index);
        if !node.is_dir() {
            write_control(&self.class_dir.join(EXPORT_FILE), index)?;
        } else {
            debug!("{} already exported", node.display());
        }

        let probe_path = node.join(probe);
        if let Err(e) = self.wait_writable(&probe_path) {
            self.unexport_quietly(index);
            return Err(e);
        }
        Ok(node)
    }

    fn wait_writable(&self, path: &Path) -> Result<(), HalError> {
        let start = Instant::now();
        loop {
            if is_writable(path) {
                debug!("{} writable after {:?}", path.display(), start.elapsed());
                return Ok(());
            }
            let waited = start.elapsed();
            if waited >= self.timeout {
                return Err(HalError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(self.poll_interval.min(self.timeout - waited));
        }
    }

    /// Unexport node `index` if it exists.
    pub fn unexport(&self, index: u32) -> Result<(), HalError> {
        if self.is_exported(index) {
            write_control(&self.class_dir.join(UNEXPORT_FILE), index)?;
        }
        Ok(())
    }

    /// Unexport as a cleanup step: failures are logged, never returned.
    pub fn unexport_quietly(&self, index: u32) {
        if let Err(e) = self.unexport(index) {
            warn!(
                "Failed to unexport {}: {}",
                self.node_dir(index).display(),
                e
            );
        }
    }
}
