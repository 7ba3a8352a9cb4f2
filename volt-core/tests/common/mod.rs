//! Test helpers shared by the volt-core integration tests

#![allow(dead_code)]

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use volt_core::rebuild::Rebuilder;
use volt_core::{LockFile, LockJson, ManifestStore, VoltError, VoltPaths};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// An isolated volt installation inside a temporary directory
pub struct TestVolt {
    pub temp_dir: TempDir,
    pub paths: VoltPaths,
}

impl TestVolt {
    pub fn new() -> Self {
        init_test_logging();
        let temp_dir = TempDir::new().expect("create temp dir");
        let paths = VoltPaths::with_vim_dir(
            temp_dir.path().join("volt"),
            temp_dir.path().join("vim"),
        );
        fs::create_dir_all(&paths.root).expect("create volt root");
        Self { temp_dir, paths }
    }

    /// A plugin directory outside the volt root
    pub fn plugin_source(&self, name: &str, with_git: bool) -> PathBuf {
        let dir = self.temp_dir.path().join("src").join(name);
        write_plugin(&dir, name, with_git).expect("write plugin");
        dir
    }

    pub fn lock(&self) -> LockJson {
        LockJson::load_from_path(&self.paths.lock_json()).expect("load lock.json")
    }

    /// Raw bytes of lock.json, or None if it was never written
    pub fn lock_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.paths.lock_json()).ok()
    }

    /// Simulate another process holding the transaction
    pub fn hold_transaction(&self) {
        fs::write(
            self.paths.trx_lock(),
            format!(
                r#"{{"pid": {}, "started_at": "{}"}}"#,
                std::process::id(),
                chrono::Utc::now().to_rfc3339()
            ),
        )
        .expect("write marker");
    }

    /// Snapshot of every file path under the temp dir, for "nothing changed" checks
    pub fn tree(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(self.temp_dir.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .collect();
        entries.sort();
        entries
    }
}

pub fn write_plugin(dir: &Path, name: &str, with_git: bool) -> Result<()> {
    fs::create_dir_all(dir.join("plugin"))?;
    fs::create_dir_all(dir.join("autoload"))?;
    fs::write(
        dir.join("plugin").join(format!("{name}.vim")),
        format!("\" {name}\nlet g:loaded_{} = 1\n", name.replace(['-', '.'], "_")),
    )?;
    fs::write(dir.join("autoload").join(format!("{name}.vim")), "")?;
    if with_git {
        fs::create_dir_all(dir.join(".git").join("refs"))?;
        fs::write(dir.join(".git").join("HEAD"), "ref: refs/heads/master\n")?;
    }
    Ok(())
}

/// Rebuilder that records calls instead of touching the vim directory
#[derive(Default)]
pub struct RecordingRebuilder {
    pub calls: Cell<usize>,
    pub last: RefCell<Option<LockJson>>,
}

impl Rebuilder for RecordingRebuilder {
    fn rebuild(&self, paths: &VoltPaths, lock: &LockJson) -> Result<()> {
        // The transaction must still be held while rebuilding
        assert!(paths.trx_lock().exists(), "rebuild ran outside the transaction");
        // lock.json must already be on disk when the rebuild starts
        let on_disk = LockJson::load_from_path(&paths.lock_json())?;
        assert_eq!(&on_disk, lock, "rebuild ran before lock.json was saved");

        self.calls.set(self.calls.get() + 1);
        *self.last.borrow_mut() = Some(lock.clone());
        Ok(())
    }
}

/// Rebuilder that always fails
pub struct FailingRebuilder;

impl Rebuilder for FailingRebuilder {
    fn rebuild(&self, _paths: &VoltPaths, _lock: &LockJson) -> Result<()> {
        anyhow::bail!("vim directory is read-only")
    }
}

/// Manifest store that reads lock.json but refuses every write
pub struct ReadOnlyStore(pub LockFile);

impl ManifestStore for ReadOnlyStore {
    fn load(&self) -> volt_core::Result<LockJson> {
        self.0.load()
    }

    fn save(&self, _lock: &LockJson) -> volt_core::Result<()> {
        Err(VoltError::PersistFailed {
            path: self.0.path().to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "disk is read-only"),
        })
    }
}
