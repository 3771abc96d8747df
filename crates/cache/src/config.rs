//! Store configuration and cache-root discovery
//!
//! Configuration is an explicit value handed to
//! [`ResultStore::new`](crate::store::ResultStore::new); there is no
//! process-wide state. Construct it with a known root, or let
//! [`CacheConfig::discover`] resolve a platform-appropriate default.

use crate::encode::KeyEncoding;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Configuration for one result store: where entries live and how keys are
/// encoded into paths.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    root: PathBuf,
    encoding: KeyEncoding,
}

impl CacheConfig {
    /// Configuration rooted at an explicit directory, with literal key
    /// encoding.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            encoding: KeyEncoding::default(),
        }
    }

    /// Resolve a default cache root.
    ///
    /// Resolution order (first writable wins):
    /// 1. `MEMO_CACHE_DIR` (explicit override)
    /// 2. `$XDG_CACHE_HOME/memo`
    /// 3. OS cache dir + `/memo`
    /// 4. `~/.memo/cache`
    /// 5. temp dir + `/memo` (fallback)
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no candidate is writable.
    pub fn discover() -> Result<Self> {
        default_root().map(Self::new)
    }

    /// Switch the key encoding mode.
    #[must_use]
    pub fn with_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active key encoding mode.
    #[must_use]
    pub fn encoding(&self) -> KeyEncoding {
        self.encoding
    }
}

/// Candidate directories for default-root resolution, separated from the
/// environment so the resolution logic is testable.
#[derive(Debug, Clone)]
struct RootCandidates {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

impl RootCandidates {
    fn from_environment() -> Self {
        let env_path = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        };
        Self {
            override_dir: env_path("MEMO_CACHE_DIR"),
            xdg_cache_home: env_path("XDG_CACHE_HOME"),
            os_cache_dir: dirs::cache_dir(),
            home_dir: dirs::home_dir(),
            temp_dir: std::env::temp_dir(),
        }
    }

    fn in_order(self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = self.override_dir.filter(|p| !p.as_os_str().is_empty()) {
            candidates.push(dir);
        }
        if let Some(xdg) = self.xdg_cache_home {
            candidates.push(xdg.join("memo"));
        }
        if let Some(os_cache) = self.os_cache_dir {
            candidates.push(os_cache.join("memo"));
        }
        if let Some(home) = self.home_dir {
            candidates.push(home.join(".memo/cache"));
        }
        candidates.push(self.temp_dir.join("memo"));
        candidates
    }
}

fn default_root() -> Result<PathBuf> {
    root_from_candidates(RootCandidates::from_environment())
}

fn root_from_candidates(candidates: RootCandidates) -> Result<PathBuf> {
    for path in candidates.in_order() {
        // An existing directory may still be read-only; some CI environments
        // mount cache directories under $HOME that way.
        if path.exists() {
            if is_writable(&path) {
                return Ok(path);
            }
            continue;
        }
        if std::fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(Error::configuration(
        "failed to determine a writable cache directory",
    ))
}

fn is_writable(path: &Path) -> bool {
    let probe = path.join(".write_probe");
    let opened = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&probe);
    match opened {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
