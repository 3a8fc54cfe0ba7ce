//! Record stores for the non-relay features.
//!
//! Two small persistence seams live behind traits here: an arbitrary
//! JSON blob ("site data") with get/put access, and group-invite records
//! with create/query/update. The relay core never touches either; a
//! durable backend only needs to implement these traits.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Key under which the site-data blob is stored.
pub const SITE_DATA_KEY: &str = "site_data";

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Keyed JSON blob storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the value stored under a key, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store a value under a key, replacing any previous value.
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Status of a group invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

/// A group-invite record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInvite {
    /// Store-assigned identifier.
    pub id: u64,
    /// Group the invite is for.
    pub group: String,
    /// Identity of the inviter.
    pub from: String,
    /// Identity of the invitee.
    pub to: String,
    /// Current status.
    pub status: InviteStatus,
}

/// Fields a client supplies when creating an invite.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvite {
    pub group: String,
    pub from: String,
    pub to: String,
}

/// Group-invite storage.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Create a pending invite and assign it an id.
    async fn create(&self, invite: NewInvite) -> Result<GroupInvite, StoreError>;

    /// List invites, optionally filtered by invitee.
    async fn query(&self, to: Option<&str>) -> Result<Vec<GroupInvite>, StoreError>;

    /// Update an invite's status. Returns the updated record, or `None`
    /// if the id is unknown.
    async fn update(&self, id: u64, status: InviteStatus)
        -> Result<Option<GroupInvite>, StoreError>;
}

/// In-memory store backing both traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Value>,
    invites: DashMap<u64, GroupInvite>,
    next_invite_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create(&self, invite: NewInvite) -> Result<GroupInvite, StoreError> {
        let id = self.next_invite_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = GroupInvite {
            id,
            group: invite.group,
            from: invite.from,
            to: invite.to,
            status: InviteStatus::Pending,
        };
        self.invites.insert(id, record.clone());
        Ok(record)
    }

    async fn query(&self, to: Option<&str>) -> Result<Vec<GroupInvite>, StoreError> {
        let mut results: Vec<GroupInvite> = self
            .invites
            .iter()
            .filter(|entry| to.map_or(true, |t| entry.value().to == t))
            .map(|entry| entry.value().clone())
            .collect();
        results.sort_by_key(|invite| invite.id);
        Ok(results)
    }

    async fn update(
        &self,
        id: u64,
        status: InviteStatus,
    ) -> Result<Option<GroupInvite>, StoreError> {
        match self.invites.get_mut(&id) {
            Some(mut entry) => {
                entry.status = status;
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_store_get_put() {
        let store = MemoryStore::new();

        assert!(store.get(SITE_DATA_KEY).await.unwrap().is_none());

        store
            .put(SITE_DATA_KEY, json!([{ "page": "home" }]))
            .await
            .unwrap();
        assert_eq!(
            store.get(SITE_DATA_KEY).await.unwrap(),
            Some(json!([{ "page": "home" }]))
        );

        // Put replaces, not merges
        store.put(SITE_DATA_KEY, json!([])).await.unwrap();
        assert_eq!(store.get(SITE_DATA_KEY).await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_group_store_crud() {
        let store = MemoryStore::new();

        let invite = store
            .create(NewInvite {
                group: "book-club".into(),
                from: "a@x.com".into(),
                to: "b@x.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(invite.status, InviteStatus::Pending);

        store
            .create(NewInvite {
                group: "book-club".into(),
                from: "a@x.com".into(),
                to: "c@x.com".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.query(None).await.unwrap().len(), 2);
        let for_b = store.query(Some("b@x.com")).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].id, invite.id);

        let updated = store
            .update(invite.id, InviteStatus::Accepted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, InviteStatus::Accepted);

        assert!(store.update(999, InviteStatus::Declined).await.unwrap().is_none());
    }
}
