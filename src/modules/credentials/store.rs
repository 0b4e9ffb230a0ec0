use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::modules::config::policy::Policy;

/// A single username and the secret stored for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub stored_secret: String, // Plaintext, digest or digest+salt depending on the policy
}

/// Username to record mapping, built once and then only read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialTable {
    records: HashMap<String, CredentialRecord>,
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning the previous one for this username
    pub fn insert(&mut self, username: String, stored_secret: String) -> Option<CredentialRecord> {
        let record = CredentialRecord {
            username: username.clone(),
            stored_secret,
        };
        self.records.insert(username, record)
    }

    pub fn get(&self, username: &str) -> Option<&CredentialRecord> {
        self.records.get(username)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.records.values()
    }
}

impl<U: Into<String>, S: Into<String>> FromIterator<(U, S)> for CredentialTable {
    fn from_iter<I: IntoIterator<Item = (U, S)>>(iter: I) -> Self {
        let mut table = CredentialTable::new();
        for (username, secret) in iter {
            table.insert(username.into(), secret.into());
        }
        table
    }
}

/// Policy and credential table that were loaded together
#[derive(Debug)]
pub struct Snapshot {
    pub policy: Policy,
    pub table: CredentialTable,
    pub generation: u64,
}

/// Holds the active snapshot and swaps it atomically on reload.
///
/// Readers load the current `Arc<Snapshot>` without taking a lock and keep
/// seeing that generation even if a reload lands while they use it.
pub struct CredentialStore {
    current: ArcSwap<Snapshot>,
    generation: AtomicU64,
}

impl CredentialStore {
    pub fn new(table: CredentialTable, policy: Policy) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot {
                policy,
                table,
                generation: 0,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Look up a username in the current table
    pub fn lookup(&self, username: &str) -> Option<CredentialRecord> {
        self.current.load().table.get(username).cloned()
    }

    /// Replace table and policy in one swap
    pub fn reload(&self, table: CredentialTable, policy: Policy) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.current.store(Arc::new(Snapshot {
            policy,
            table,
            generation,
        }));
    }

    pub fn current_policy(&self) -> Policy {
        self.current.load().policy.clone()
    }

    /// The snapshot in effect right now; policy and table always match
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
