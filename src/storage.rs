//! Target Persistence
//!
//! The registry treats durability as a pluggable backend keyed by target;
//! the shipped implementation is a JSON snapshot file. Per-dimension check
//! state is deliberately not persisted: it is rebuilt lazily from the first
//! sweep after a restart.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::types::Target;

pub trait TargetStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<Target>>;
    fn persist(&self, targets: &[Target]) -> anyhow::Result<()>;
}

/// JSON snapshot of all registered targets, rewritten on every mutation.
/// Writes go through a temp file and a rename so a crash mid-write cannot
/// truncate the previous snapshot.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TargetStore for JsonFileStore {
    fn load(&self) -> anyhow::Result<Vec<Target>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let targets: Vec<Target> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;

        Ok(targets)
    }

    fn persist(&self, targets: &[Target]) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(targets).context("failed to serialize targets")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

/// Store that keeps nothing. Used in tests and wherever durability is
/// provided by an outer layer.
pub struct NullStore;

impl TargetStore for NullStore {
    fn load(&self) -> anyhow::Result<Vec<Target>> {
        Ok(Vec::new())
    }

    fn persist(&self, _targets: &[Target]) -> anyhow::Result<()> {
        Ok(())
    }
}
