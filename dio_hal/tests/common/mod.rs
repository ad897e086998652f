//! Fake sysfs tree for integration tests.
//!
//! `FakeSysfs` lays out `gpio/` and `pwm/pwmchip{0,1}/` under a temp dir and
//! runs a small "kernel" thread that watches the `export` / `unexport`
//! control files, creating and removing `gpio<N>` / `pwm<N>` nodes the way
//! the real kernel does.
//!
//! `FakeSysfs::record_writes` captures the attribute writes the code under
//! test issues, in order, from its `sysfs write` debug events.

#![allow(dead_code)]

use dio_common::config::SysfsConfig;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// How the fake kernel reacts to an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelMode {
    /// Create the node with all attributes.
    Normal,
    /// Create the node but never its `direction` / `period` attribute.
    NoProbe,
}

pub struct FakeSysfs {
    dir: TempDir,
    stop: Arc<AtomicBool>,
    kernel: Option<JoinHandle<()>>,
}

impl FakeSysfs {
    pub fn start() -> Self {
        Self::start_with(KernelMode::Normal)
    }

    pub fn start_with(mode: KernelMode) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        for class in ["gpio", "pwm/pwmchip0", "pwm/pwmchip1"] {
            let class_dir = root.join(class);
            fs::create_dir_all(&class_dir).unwrap();
            fs::write(class_dir.join("export"), "").unwrap();
            fs::write(class_dir.join("unexport"), "").unwrap();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let kernel = thread::Builder::new()
            .name("fake-kernel".into())
            .spawn(move || kernel_loop(&root, mode, &flag))
            .unwrap();
        Self {
            dir,
            stop,
            kernel: Some(kernel),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Sysfs config pointing at this tree with fast polling.
    pub fn config(&self) -> SysfsConfig {
        SysfsConfig {
            export_poll_interval_ms: 2,
            export_timeout_ms: 500,
            ..SysfsConfig::rooted_at(self.root())
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Attribute content, trimmed.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap().trim().to_string()
    }

    pub fn write(&self, rel: &str, content: &str) {
        fs::write(self.path(rel), content).unwrap();
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Run `f` on this thread and return the attribute writes it made, as
    /// `(path relative to the root, value)` pairs in issue order.
    pub fn record_writes<T>(&self, f: impl FnOnce() -> T) -> (T, Vec<(String, String)>) {
        let recorder = WriteRecorder {
            root: self.root().display().to_string(),
            writes: Arc::new(Mutex::new(Vec::new())),
        };
        let writes = Arc::clone(&recorder.writes);
        let subscriber = tracing_subscriber::registry().with(recorder);
        let out = tracing::subscriber::with_default(subscriber, f);
        let writes = writes.lock().unwrap().clone();
        (out, writes)
    }
}

struct WriteRecorder {
    root: String,
    writes: Arc<Mutex<Vec<(String, String)>>>,
}

impl<S: Subscriber> Layer<S> for WriteRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = WriteFields::default();
        event.record(&mut fields);
        if let (Some(path), Some(value)) = (fields.path, fields.value) {
            let rel = path
                .strip_prefix(&self.root)
                .map(|p| p.trim_start_matches('/'))
                .unwrap_or(&path)
                .to_string();
            self.writes.lock().unwrap().push((rel, value));
        }
    }
}

#[derive(Default)]
struct WriteFields {
    path: Option<String>,
    value: Option<String>,
}

impl Visit for WriteFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "path" => self.path = Some(value.to_string()),
            "value" => self.value = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "path" => self.path = Some(format!("{value:?}")),
            "value" => self.value = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl Drop for FakeSysfs {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(kernel) = self.kernel.take() {
            let _ = kernel.join();
        }
    }
}

/// Poll `cond` for up to two seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn kernel_loop(root: &Path, mode: KernelMode, stop: &AtomicBool) {
    let classes = [
        (root.join("gpio"), "gpio"),
        (root.join("pwm/pwmchip0"), "pwm"),
        (root.join("pwm/pwmchip1"), "pwm"),
    ];
    let mut consumed: HashMap<PathBuf, usize> = HashMap::new();

    while !stop.load(Ordering::SeqCst) {
        for (class_dir, prefix) in &classes {
            for (file, export) in [("export", true), ("unexport", false)] {
                let path = class_dir.join(file);
                let Ok(content) = fs::read_to_string(&path) else {
                    continue;
                };
                let offset = consumed.entry(path).or_default();
                let pending = &content[*offset..];
                // only whole lines are commands
                let Some(end) = pending.rfind('\n').map(|i| i + 1) else {
                    continue;
                };
                for line in pending[..end].lines() {
                    let Ok(index) = line.trim().parse::<u32>() else {
                        continue;
                    };
                    let node = class_dir.join(format!("{prefix}{index}"));
                    if export {
                        create_node(&node, prefix, mode);
                    } else {
                        let _ = fs::remove_dir_all(&node);
                    }
                }
                *offset += end;
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn create_node(node: &Path, prefix: &str, mode: KernelMode) {
    let _ = fs::create_dir_all(node);
    // the probe attribute appears last, like a slow udev rule
    let (attrs, probe): (&[(&str, &str)], (&str, &str)) = if prefix == "gpio" {
        (&[("value", "0"), ("edge", "none")], ("direction", "in"))
    } else {
        (
            &[("polarity", "normal"), ("duty_cycle", "0"), ("enable", "0")],
            ("period", "0"),
        )
    };
    for (name, value) in attrs {
        publish(node, name, value);
    }
    if mode == KernelMode::Normal {
        publish(node, probe.0, probe.1);
    }
}

/// Attributes appear with their content already in place.
fn publish(node: &Path, name: &str, value: &str) {
    let tmp = node.join(format!(".{name}.tmp"));
    if fs::write(&tmp, value).is_ok() {
        let _ = fs::rename(&tmp, node.join(name));
    }
}
