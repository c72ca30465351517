//! Storage seams for the legacy tables.
//!
//! One async repository trait per sub-entity table, aggregated in
//! [`Repositories`]. The Postgres implementations live in [`pg`] behind the
//! `database` feature; tests wire in-memory implementations through the same
//! traits. Every write commits independently; there is no cross-repository
//! transaction.

#[cfg(feature = "database")]
pub mod pg;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ClientContact, ClientLocation, ClientRecord, DoingBusinessAs, ReasonAuditRecord,
    RelatedClientRelationship,
};

/// Core client identity rows. This engine only updates them; creation belongs
/// to the intake pipeline.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find(&self, client_number: &str) -> Result<Option<ClientRecord>>;

    /// Persist the full record (keyed by `client_number`).
    async fn update(&self, record: &ClientRecord) -> Result<()>;
}

/// Client location rows, keyed by (client number, location code).
#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn find(&self, client_number: &str, locn_code: &str) -> Result<Option<ClientLocation>>;

    /// Field-level partial update. `changes` maps legacy column names to new
    /// values (`None` clears the column). Implementations also stamp
    /// `updated_by`/`updated_at` and bump `revision` in the same write.
    async fn update_fields(
        &self,
        client_number: &str,
        locn_code: &str,
        changes: &[(String, Option<String>)],
        actor: &str,
    ) -> Result<()>;
}

/// Contact rows. A logical contact is one row per associated location, the
/// sibling group sharing the uppercased contact name.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find_by_id(&self, client_number: &str, contact_id: i64)
        -> Result<Option<ClientContact>>;

    /// Every sibling row of the named contact.
    async fn find_by_name(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<ClientContact>>;

    /// Location codes currently associated with the named contact, in the
    /// authoritative stored order (ascending location code).
    async fn location_codes(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<String>>;

    async fn exists(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<bool>;

    /// Allocate the next contact row identifier.
    async fn next_contact_id(&self) -> Result<i64>;

    async fn insert(&self, contact: &ClientContact) -> Result<()>;

    /// Persist a row (keyed by `contact_id`). May move the row to a new
    /// location code.
    async fn update(&self, contact: &ClientContact) -> Result<()>;

    /// Delete one (contact name, location) row.
    async fn delete(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<()>;

    /// Delete every sibling row of the named contact.
    async fn delete_by_name(&self, client_number: &str, contact_name: &str) -> Result<()>;
}

/// The single trade-name alias row per client.
#[async_trait]
pub trait AliasRepository: Send + Sync {
    async fn find(&self, client_number: &str) -> Result<Option<DoingBusinessAs>>;

    async fn update(&self, alias: &DoingBusinessAs) -> Result<()>;

    /// Insert unless an identical (client, name) pair already exists.
    /// Returns whether a row was inserted.
    async fn insert_if_absent(&self, alias: &DoingBusinessAs) -> Result<bool>;
}

/// Related-client relationship edges.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Relationships anchored at (client, location), authoritative stored
    /// order (by related client number, then related location code).
    async fn list(
        &self,
        client_number: &str,
        locn_code: &str,
    ) -> Result<Vec<RelatedClientRelationship>>;

    /// Whether a row with the same identity tuple already exists.
    async fn exists(&self, rel: &RelatedClientRelationship) -> Result<bool>;

    async fn insert(&self, rel: &RelatedClientRelationship) -> Result<()>;

    /// Replace `old` (matched by identity tuple) with `new`, bumping the
    /// row's revision.
    async fn update(
        &self,
        old: &RelatedClientRelationship,
        new: &RelatedClientRelationship,
    ) -> Result<()>;

    /// Delete the row matching the identity tuple.
    async fn delete(&self, rel: &RelatedClientRelationship) -> Result<()>;
}

/// Reason audit rows. Created only by database triggers; this engine updates
/// them, never inserts.
#[async_trait]
pub trait ReasonAuditRepository: Send + Sync {
    /// Oldest row still carrying the undefined sentinel for the client,
    /// optionally filtered by action code.
    async fn find_undefined(
        &self,
        client_number: &str,
        action_filter: Option<&str>,
    ) -> Result<Option<ReasonAuditRecord>>;

    async fn update_reason(&self, audit_id: i64, reason_code: &str, actor: &str) -> Result<()>;

    /// Location-scoped sentinel update keyed by (client, location code).
    /// Returns the number of rows updated.
    async fn update_location_reason(
        &self,
        client_number: &str,
        locn_code: &str,
        reason_code: &str,
        actor: &str,
    ) -> Result<u64>;

    /// Rewrite the delete-trigger actor placeholder on the client's audit
    /// rows to the real acting user.
    async fn rewrite_delete_actor(&self, client_number: &str, actor: &str) -> Result<()>;
}

/// Aggregate handed to the dispatcher at construction.
#[derive(Clone)]
pub struct Repositories {
    pub client: Arc<dyn ClientRepository>,
    pub location: Arc<dyn LocationRepository>,
    pub contact: Arc<dyn ContactRepository>,
    pub alias: Arc<dyn AliasRepository>,
    pub relationship: Arc<dyn RelationshipRepository>,
    pub reason_audit: Arc<dyn ReasonAuditRepository>,
}

impl Repositories {
    /// Wire the sqlx implementations over one shared pool.
    #[cfg(feature = "database")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            client: Arc::new(pg::PgClientRepository::new(pool.clone())),
            location: Arc::new(pg::PgLocationRepository::new(pool.clone())),
            contact: Arc::new(pg::PgContactRepository::new(pool.clone())),
            alias: Arc::new(pg::PgAliasRepository::new(pool.clone())),
            relationship: Arc::new(pg::PgRelationshipRepository::new(pool.clone())),
            reason_audit: Arc::new(pg::PgReasonAuditRepository::new(pool)),
        }
    }
}
