//! Crash-consistent result persistence
//!
//! An entry lives at `<root>/<name>/<key segments...>/` with two sibling
//! artifacts: `result.data` (the serialized value) and `result.success` (the
//! completion marker). The marker is renamed into place only after the data
//! file is durable, so a crash at any point leaves the entry recomputable,
//! never silently wrong:
//!
//! | data | marker | state        | action                          |
//! |------|--------|--------------|---------------------------------|
//! | no   | no     | Empty        | compute and persist             |
//! | yes  | no     | Partial      | log a notice, recompute         |
//! | yes  | yes    | Complete     | deserialize; failure is corrupt |
//! | no   | yes    | Inconsistent | corrupt, never auto-healed      |
//!
//! Both artifacts are written through uniquely named temp files in the entry
//! directory, fsynced, then atomically renamed. Two writers racing on one
//! entry each rename whole files, so any reader observes a consistent pair
//! (or none) — duplicate computation is the only cost of a race.

use crate::config::CacheConfig;
use crate::encode::encode_key;
use crate::key::CacheKey;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Serialized result file name.
pub const DATA_FILE: &str = "result.data";

/// Completion marker file name. Existence is the only signal.
pub const MARKER_FILE: &str = "result.success";

/// Marker content, a constant for human debuggability.
const MARKER_CONTENT: &[u8] = b"SUCCESS\n";

/// Observed state of one cache entry directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Neither artifact present; nothing cached yet.
    Empty,
    /// Data without marker: an interrupted prior write, safe to redo.
    Partial,
    /// Data and marker both present.
    Complete,
    /// Marker without data: never valid.
    Inconsistent,
}

impl EntryState {
    /// Classify a directory by the presence of its two artifacts.
    #[must_use]
    pub fn of(dir: &Path) -> Self {
        let data = dir.join(DATA_FILE).is_file();
        let marker = dir.join(MARKER_FILE).is_file();
        match (data, marker) {
            (false, false) => Self::Empty,
            (true, false) => Self::Partial,
            (true, true) => Self::Complete,
            (false, true) => Self::Inconsistent,
        }
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Partial => write!(f, "partial"),
            Self::Complete => write!(f, "complete"),
            Self::Inconsistent => write!(f, "inconsistent"),
        }
    }
}

/// Disk-backed store of computation results, keyed by computation name and
/// encoded cache key.
#[derive(Debug, Clone)]
pub struct ResultStore {
    config: CacheConfig,
}

impl ResultStore {
    /// Create a store over the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// The store's configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Directory holding the entry for `name` + `key` under the active
    /// encoding. Deterministic; derived fresh on every call.
    #[must_use]
    pub fn entry_dir(&self, name: &str, key: &CacheKey) -> PathBuf {
        let mut dir = self.config.root().join(name);
        for segment in encode_key(key, self.config.encoding()) {
            dir.push(segment);
        }
        dir
    }

    /// Observed state of the entry for `name` + `key`.
    #[must_use]
    pub fn entry_state(&self, name: &str, key: &CacheKey) -> EntryState {
        EntryState::of(&self.entry_dir(name, key))
    }

    /// Return the persisted result for the entry, or run `compute` and
    /// persist its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] when the completion marker is present but
    /// the data file is missing or does not deserialize (never silently
    /// recomputed), [`Error::Serialization`] when a fresh result cannot be
    /// serialized, [`Error::Io`] on filesystem failures, and whatever
    /// `compute` itself returns.
    pub fn get_or_compute<T, F>(&self, name: &str, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let dir = self.entry_dir(name, key);
        match EntryState::of(&dir) {
            EntryState::Complete => {
                tracing::debug!(
                    target: "memo::cache",
                    computation = %name,
                    path = %dir.display(),
                    "cache hit"
                );
                read_entry(&dir)
            }
            EntryState::Inconsistent => Err(Error::corrupt(
                &dir,
                "completion marker present but data file is missing",
            )),
            EntryState::Partial => {
                tracing::warn!(
                    target: "memo::cache",
                    computation = %name,
                    path = %dir.display(),
                    "data file present without completion marker; \
                     a prior write was interrupted, recomputing"
                );
                self.compute_and_persist(name, &dir, compute)
            }
            EntryState::Empty => {
                tracing::debug!(target: "memo::cache", computation = %name, "cache miss");
                self.compute_and_persist(name, &dir, compute)
            }
        }
    }

    fn compute_and_persist<T, F>(&self, name: &str, dir: &Path, compute: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Result<T>,
    {
        // No file is touched until the computation has returned; an
        // interrupted computation leaves the entry Empty.
        let value = compute()?;
        let bytes = serde_json::to_vec(&value).map_err(|e| {
            Error::serialization(format!("failed to serialize result of `{name}`: {e}"))
        })?;
        fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))?;
        write_atomic(dir, DATA_FILE, &bytes)?;
        write_atomic(dir, MARKER_FILE, MARKER_CONTENT)?;
        tracing::debug!(
            target: "memo::cache",
            computation = %name,
            path = %dir.display(),
            bytes = bytes.len(),
            "persisted result"
        );
        Ok(value)
    }
}

fn read_entry<T: DeserializeOwned>(dir: &Path) -> Result<T> {
    let path = dir.join(DATA_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // The data file vanished between the state check and the read.
            return Err(Error::corrupt(
                dir,
                "completion marker present but data file is missing",
            ));
        }
        Err(e) => return Err(Error::io(e, &path, "read")),
    };
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::corrupt(
            dir,
            format!("completion marker present but data does not deserialize: {e}"),
        )
    })
}

/// Write `bytes` to `dir/file_name` through a uniquely named temp file in
/// the same directory, fsynced before the atomic rename into place.
fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(e, dir, "create temp file"))?;
    tmp.write_all(bytes)
        .map_err(|e| Error::io(e, tmp.path(), "write"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(e, tmp.path(), "sync"))?;
    let target = dir.join(file_name);
    tmp.persist(&target)
        .map_err(|e| Error::io(e.error, &target, "rename"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::KeyEncoding;
    use crate::key::{CallArgs, KeyPolicy, Parameter, Signature};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn xy_key(x: i64, y: i64) -> CacheKey {
        let sig = Signature::new(vec![Parameter::required("x"), Parameter::required("y")])
            .expect("signature");
        let binding = sig
            .bind(&CallArgs::new().arg(x).arg(y))
            .expect("binding");
        KeyPolicy::new().derive_key(&binding, &sig)
    }

    fn store_in(tmp: &TempDir) -> ResultStore {
        ResultStore::new(CacheConfig::new(tmp.path()))
    }

    // ==========================================================================
    // Layout tests
    // ==========================================================================

    #[test]
    fn test_entry_dir_literal_layout() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let dir = store.entry_dir("add", &xy_key(1, 2));
        assert_eq!(dir, tmp.path().join("add").join("x_1").join("y_2"));
    }

    #[test]
    fn test_entry_dir_digest_layout() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ResultStore::new(
            CacheConfig::new(tmp.path()).with_encoding(KeyEncoding::Digest),
        );
        let dir = store.entry_dir("add", &xy_key(1, 2));
        let segment = dir
            .file_name()
            .and_then(|s| s.to_str())
            .expect("digest segment");
        assert_eq!(segment.len(), 128);
        assert_eq!(dir.parent(), Some(tmp.path().join("add").as_path()));
    }

    // ==========================================================================
    // Round-trip and idempotence tests
    // ==========================================================================

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);

        let written: Vec<String> = store
            .get_or_compute("names", &key, || Ok(vec!["a".into(), "b".into()]))
            .expect("first call computes");
        let read: Vec<String> = store
            .get_or_compute("names", &key, || {
                Err(Error::configuration("must not recompute"))
            })
            .expect("second call reads");
        assert_eq!(written, read);
    }

    #[test]
    fn test_computes_exactly_once() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);
        let calls = AtomicUsize::new(0);

        for _ in 0..5 {
            let result: i64 = store
                .get_or_compute("add", &key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(3)
                })
                .expect("call succeeds");
            assert_eq!(result, 3);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.entry_state("add", &key), EntryState::Complete);
    }

    #[test]
    fn test_marker_content_is_constant() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);
        let _: i64 = store
            .get_or_compute("add", &key, || Ok(3))
            .expect("call succeeds");
        let marker = store.entry_dir("add", &key).join(MARKER_FILE);
        assert_eq!(fs::read(marker).expect("marker readable"), b"SUCCESS\n");
    }

    #[test]
    fn test_computation_error_leaves_entry_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);
        let result: Result<i64> = store.get_or_compute("add", &key, || {
            Err(Error::configuration("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.entry_state("add", &key), EntryState::Empty);
    }

    // ==========================================================================
    // Crash recovery tests
    // ==========================================================================

    #[test]
    fn test_partial_entry_triggers_one_recomputation() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);

        // Simulate a crash after the data write, before the marker.
        let dir = store.entry_dir("add", &key);
        fs::create_dir_all(&dir).expect("create entry dir");
        fs::write(dir.join(DATA_FILE), b"17").expect("write data");
        assert_eq!(store.entry_state("add", &key), EntryState::Partial);

        let calls = AtomicUsize::new(0);
        let result: i64 = store
            .get_or_compute("add", &key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(3)
            })
            .expect("recovery succeeds");
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.entry_state("add", &key), EntryState::Complete);

        // A further call reads the healed entry.
        let again: i64 = store
            .get_or_compute("add", &key, || {
                Err(Error::configuration("must not recompute"))
            })
            .expect("read after recovery");
        assert_eq!(again, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ==========================================================================
    // Corruption detection tests
    // ==========================================================================

    #[test]
    fn test_marker_without_data_is_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);

        let dir = store.entry_dir("add", &key);
        fs::create_dir_all(&dir).expect("create entry dir");
        fs::write(dir.join(MARKER_FILE), MARKER_CONTENT).expect("write marker");
        assert_eq!(store.entry_state("add", &key), EntryState::Inconsistent);

        let result: Result<i64> = store.get_or_compute("add", &key, || {
            Err(Error::configuration("must not recompute"))
        });
        assert!(matches!(result, Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_undeserializable_data_under_marker_is_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let key = xy_key(1, 2);

        let dir = store.entry_dir("add", &key);
        fs::create_dir_all(&dir).expect("create entry dir");
        fs::write(dir.join(DATA_FILE), b"not json at all").expect("write data");
        fs::write(dir.join(MARKER_FILE), MARKER_CONTENT).expect("write marker");

        let result: Result<i64> = store.get_or_compute("add", &key, || {
            Err(Error::configuration("must not recompute"))
        });
        assert!(matches!(result, Err(Error::Corrupt { .. })));
    }

    // ==========================================================================
    // Empty-key tests
    // ==========================================================================

    #[test]
    fn test_zero_argument_computation_caches_under_name() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store_in(&tmp);
        let sig = Signature::new(vec![]).expect("signature");
        let binding = sig.bind(&CallArgs::new()).expect("binding");
        let key = KeyPolicy::new().derive_key(&binding, &sig);

        assert_eq!(store.entry_dir("tick", &key), tmp.path().join("tick"));
        let value: u32 = store
            .get_or_compute("tick", &key, || Ok(7))
            .expect("call succeeds");
        assert_eq!(value, 7);
        assert!(tmp.path().join("tick").join(DATA_FILE).is_file());
    }
}
