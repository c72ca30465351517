//! Related-client relationship handler.
//!
//! Paths encode `/relatedClients/{locationCode}/{index|-}`; the index is
//! positional within the relationships anchored at that location, resolved
//! against a snapshot of the stored order taken once per location. Phases
//! run remove, then replace, then add; every insert or update skips when an
//! identical relationship tuple already exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::PatchError;
use crate::models::{
    PatchOp, PatchOperation, RelatedClientRelationship, RelationshipPayload,
};
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::store::{ReasonAuditRepository, RelationshipRepository};

pub struct RelatedClientHandler {
    relationship: Arc<dyn RelationshipRepository>,
    audit: Arc<dyn ReasonAuditRepository>,
}

impl RelatedClientHandler {
    pub fn new(
        relationship: Arc<dyn RelationshipRepository>,
        audit: Arc<dyn ReasonAuditRepository>,
    ) -> Self {
        Self { relationship, audit }
    }

    fn payload(op: &PatchOperation) -> Result<RelationshipPayload, PatchError> {
        op.value
            .clone()
            .ok_or_else(|| PatchError::malformed("relationship operation without payload"))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| {
                    PatchError::malformed(format!("invalid relationship payload: {e}"))
                })
            })
    }

    fn resolve<'a>(
        anchored: &'a [RelatedClientRelationship],
        path: &str,
    ) -> Result<&'a RelatedClientRelationship, PatchError> {
        let idx = ops::path_index(path, 1)?;
        anchored.get(idx).ok_or_else(|| {
            PatchError::malformed(format!(
                "relationship index {idx} out of range ({} anchored)",
                anchored.len()
            ))
        })
    }

    fn build(
        &self,
        client_number: &str,
        locn_code: &str,
        payload: RelationshipPayload,
        revision: i64,
        created_by: &str,
        created_at: chrono::DateTime<Utc>,
        actor: &str,
    ) -> RelatedClientRelationship {
        RelatedClientRelationship {
            client_number: client_number.to_string(),
            client_locn_code: locn_code.to_string(),
            related_client_number: payload.related_client_number,
            related_client_locn_code: payload.related_client_locn_code,
            relationship_code: payload.relationship_code,
            percentage_ownership: payload.percentage_ownership,
            signing_auth_ind: payload.signing_auth_ind,
            revision,
            created_by: created_by.to_string(),
            created_at,
            updated_by: actor.to_string(),
            updated_at: Utc::now(),
        }
    }

    async fn patch_location(
        &self,
        client_number: &str,
        locn_code: &str,
        location_ops: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        // Snapshot of the stored order; every index below resolves against it.
        let anchored = self.relationship.list(client_number, locn_code).await?;

        // Phase 1: removes.
        let mut removed = 0u32;
        for op in location_ops.iter().filter(|o| o.op == PatchOp::Remove) {
            let rel = Self::resolve(&anchored, &op.path)?;
            self.relationship.delete(rel).await?;
            removed += 1;
        }
        if removed > 0 {
            self.audit
                .rewrite_delete_actor(client_number, actor)
                .await?;
            info!(client_number, locn_code, removed, "relationships removed");
        }

        // Phase 2: replaces.
        for op in location_ops.iter().filter(|o| o.op == PatchOp::Replace) {
            let old = Self::resolve(&anchored, &op.path)?;
            let payload = Self::payload(op)?;
            let new = self.build(
                client_number,
                locn_code,
                payload,
                old.revision + 1,
                &old.created_by,
                old.created_at,
                actor,
            );
            if new.tuple() != old.tuple() && self.relationship.exists(&new).await? {
                debug!(client_number, locn_code, "identical relationship exists; skipping replace");
                continue;
            }
            self.relationship.update(old, &new).await?;
        }

        // Phase 3: adds.
        for op in location_ops.iter().filter(|o| o.op == PatchOp::Add) {
            let payload = Self::payload(op)?;
            let now = Utc::now();
            let new = self.build(client_number, locn_code, payload, 1, actor, now, actor);
            if self.relationship.exists(&new).await? {
                debug!(client_number, locn_code, "identical relationship exists; skipping add");
                continue;
            }
            self.relationship.insert(&new).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PatchHandler for RelatedClientHandler {
    fn prefix(&self) -> &'static str {
        "relatedClients"
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, self.prefix());
        if scoped.is_empty() {
            return Ok(());
        }

        let mut by_location: BTreeMap<String, Vec<PatchOperation>> = BTreeMap::new();
        for op in &scoped {
            let code = ops::path_segment(&op.path, 0)?.to_string();
            by_location.entry(code).or_default().push(op.clone());
        }

        for (locn_code, location_ops) in by_location {
            self.patch_location(client_number, &locn_code, &location_ops, actor)
                .await?;
        }
        Ok(())
    }
}
