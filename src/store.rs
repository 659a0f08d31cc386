//! Challenge state store: the durability and consistency boundary.
//!
//! Every lifecycle transition is a read-modify-write cycle against this
//! trait: fetch a versioned user record, apply the transition in memory, and
//! commit with the expected version. A version mismatch means another writer
//! won the race; the controller retries a bounded number of times. No
//! in-process per-user locking exists anywhere else, so the same controller
//! code is correct in a stateless multi-instance deployment as long as the
//! backing store honors this contract.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::UserRecord;
use crate::error::StoreError;

#[async_trait]
pub trait ChallengeStore: Send + Sync {
  /// Current version and record for a user. Absent users report version 0.
  async fn fetch(&self, user_id: &str) -> Result<(u64, Option<UserRecord>), StoreError>;

  /// Replace the record iff the stored version still equals `expected_version`.
  /// Expected version 0 creates the record; the user must still be absent.
  async fn commit(&self, user_id: &str, expected_version: u64, record: UserRecord) -> Result<(), StoreError>;
}

/// In-memory store used for local deployment and tests. It implements the
/// same optimistic-commit contract a remote document store would provide.
#[derive(Default)]
pub struct MemoryStore {
  users: RwLock<HashMap<String, (u64, UserRecord)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
  async fn fetch(&self, user_id: &str) -> Result<(u64, Option<UserRecord>), StoreError> {
    let users = self.users.read().await;
    Ok(match users.get(user_id) {
      Some((version, record)) => (*version, Some(record.clone())),
      None => (0, None),
    })
  }

  async fn commit(&self, user_id: &str, expected_version: u64, record: UserRecord) -> Result<(), StoreError> {
    let mut users = self.users.write().await;
    let current = users.get(user_id).map(|(v, _)| *v).unwrap_or(0);
    if current != expected_version {
      return Err(StoreError::Conflict);
    }
    users.insert(user_id.to_string(), (expected_version + 1, record));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn absent_user_reports_version_zero() {
    let store = MemoryStore::new();
    let (version, record) = store.fetch("u1").await.expect("fetch");
    assert_eq!(version, 0);
    assert!(record.is_none());
  }

  #[tokio::test]
  async fn commit_bumps_version_and_roundtrips() {
    let store = MemoryStore::new();
    let mut record = UserRecord::default();
    record.balance = 500;
    store.commit("u1", 0, record.clone()).await.expect("create");

    let (version, fetched) = store.fetch("u1").await.expect("fetch");
    assert_eq!(version, 1);
    assert_eq!(fetched.expect("record").balance, 500);

    record.balance = 450;
    store.commit("u1", 1, record).await.expect("update");
    let (version, fetched) = store.fetch("u1").await.expect("fetch");
    assert_eq!(version, 2);
    assert_eq!(fetched.expect("record").balance, 450);
  }

  #[tokio::test]
  async fn stale_commit_conflicts() {
    let store = MemoryStore::new();
    store.commit("u1", 0, UserRecord::default()).await.expect("create");

    // A second writer based on the pre-create snapshot must lose.
    let err = store.commit("u1", 0, UserRecord::default()).await.expect_err("conflict");
    assert!(matches!(err, StoreError::Conflict));

    // And a writer with the current version wins.
    store.commit("u1", 1, UserRecord::default()).await.expect("update");
  }
}
