//! Target Registry
//!
//! Authoritative in-memory list of monitored targets, backed by a
//! [`TargetStore`](crate::storage::TargetStore). Mutations are serialized
//! behind one write lock; the sweep reads point-in-time copies so it never
//! observes a half-mutated list and never holds the lock for a whole sweep.

use std::{collections::HashMap, sync::RwLock};

use crate::{
    error::RegistryError,
    storage::TargetStore,
    types::{OwnerId, Target, TargetId},
    util::normalize_hostname,
};

pub struct TargetRegistry {
    targets: RwLock<HashMap<TargetId, Target>>,
    store: Box<dyn TargetStore>,
}

impl TargetRegistry {
    pub fn new(store: Box<dyn TargetStore>) -> anyhow::Result<Self> {
        let loaded = store.load()?;
        let mut targets = HashMap::with_capacity(loaded.len());
        for target in loaded {
            targets.insert(target.id, target);
        }

        Ok(Self {
            targets: RwLock::new(targets),
            store,
        })
    }

    /// Point-in-time copy of all targets, ordered by registration time then
    /// hostname. Safe to iterate while mutations happen concurrently;
    /// mutations after the copy are only visible to the next sweep.
    pub fn snapshot(&self) -> Vec<Target> {
        let mut snapshot: Vec<Target> = {
            let targets = self.targets.read().unwrap();
            targets.values().cloned().collect()
        };
        snapshot.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });
        snapshot
    }

    /// Register a hostname for an owner. The raw input is normalized first,
    /// so `https://Example.COM/` and `example.com` are the same target.
    pub fn add(&self, owner_id: OwnerId, hostname: &str) -> Result<Target, RegistryError> {
        let hostname = normalize_hostname(hostname)?;

        let mut targets = self.targets.write().unwrap();
        if targets
            .values()
            .any(|t| t.owner_id == owner_id && t.hostname == hostname)
        {
            return Err(RegistryError::DuplicateTarget);
        }

        let target = Target::new(owner_id, hostname);
        targets.insert(target.id, target.clone());
        self.persist_locked(&targets);

        Ok(target)
    }

    pub fn remove(&self, owner_id: OwnerId, hostname: &str) -> Result<Target, RegistryError> {
        let hostname = normalize_hostname(hostname)?;

        let mut targets = self.targets.write().unwrap();
        let id = targets
            .values()
            .find(|t| t.owner_id == owner_id && t.hostname == hostname)
            .map(|t| t.id)
            .ok_or(RegistryError::NotFound)?;

        let removed = targets.remove(&id).expect("id was just found");
        self.persist_locked(&targets);

        Ok(removed)
    }

    pub fn list(&self, owner_id: OwnerId) -> Vec<Target> {
        let mut owned: Vec<Target> = {
            let targets = self.targets.read().unwrap();
            targets
                .values()
                .filter(|t| t.owner_id == owner_id)
                .cloned()
                .collect()
        };
        owned.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        owned
    }

    /// Membership check used by the transition engine to suppress outcomes
    /// for targets deleted mid-sweep.
    pub fn exists(&self, target_id: TargetId) -> bool {
        self.targets.read().unwrap().contains_key(&target_id)
    }

    pub fn get(&self, target_id: TargetId) -> Option<Target> {
        self.targets.read().unwrap().get(&target_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.targets.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().unwrap().is_empty()
    }

    /// Persistence is best-effort: a failed write keeps the in-memory
    /// mutation so monitoring continues, and the failure is logged for the
    /// operator.
    fn persist_locked(&self, targets: &HashMap<TargetId, Target>) {
        let all: Vec<Target> = targets.values().cloned().collect();
        if let Err(e) = self.store.persist(&all) {
            tracing::error!("Failed to persist target registry: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, NullStore};

    fn registry() -> TargetRegistry {
        TargetRegistry::new(Box::new(NullStore)).unwrap()
    }

    #[test]
    fn test_add_and_list() {
        let reg = registry();
        reg.add(1, "example.com").unwrap();
        reg.add(1, "example.org").unwrap();
        reg.add(2, "example.com").unwrap();

        let owned = reg.list(1);
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0].hostname, "example.com");
        assert_eq!(owned[1].hostname, "example.org");
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let reg = registry();
        reg.add(1, "example.com").unwrap();

        // Same target under a different spelling is still a duplicate
        assert_eq!(
            reg.add(1, "https://Example.COM/"),
            Err(RegistryError::DuplicateTarget)
        );

        // A different owner may register the same hostname
        assert!(reg.add(2, "example.com").is_ok());
    }

    #[test]
    fn test_remove_missing_rejected() {
        let reg = registry();
        assert_eq!(reg.remove(1, "example.com"), Err(RegistryError::NotFound));

        reg.add(1, "example.com").unwrap();
        assert_eq!(reg.remove(2, "example.com"), Err(RegistryError::NotFound));
        assert!(reg.remove(1, "example.com").is_ok());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_invalid_hostname_rejected() {
        let reg = registry();
        assert!(matches!(
            reg.add(1, "not a hostname"),
            Err(RegistryError::InvalidHostname(_))
        ));
    }

    #[test]
    fn test_snapshot_is_isolated_from_mutation() {
        let reg = registry();
        reg.add(1, "example.com").unwrap();

        let snapshot = reg.snapshot();
        reg.add(1, "example.org").unwrap();
        reg.remove(1, "example.com").unwrap();

        // The copy taken before the mutations is unchanged
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].hostname, "example.com");
        assert_eq!(reg.snapshot().len(), 1);
        assert_eq!(reg.snapshot()[0].hostname, "example.org");
    }

    #[test]
    fn test_exists_and_get() {
        let reg = registry();
        let target = reg.add(1, "example.com").unwrap();

        assert!(reg.exists(target.id));
        assert_eq!(reg.get(target.id).unwrap().hostname, "example.com");

        reg.remove(1, "example.com").unwrap();
        assert!(!reg.exists(target.id));
        assert!(reg.get(target.id).is_none());
    }

    #[test]
    fn test_registry_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");

        let target = {
            let reg = TargetRegistry::new(Box::new(JsonFileStore::new(&path))).unwrap();
            reg.add(7, "example.com").unwrap()
        };

        let reg = TargetRegistry::new(Box::new(JsonFileStore::new(&path))).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.exists(target.id));
    }
}
