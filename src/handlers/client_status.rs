//! Status-code handler.
//!
//! Runs the same template as the other scalar handlers but reconciles its
//! reason annotations through the shared reconciler with the `STAT` action
//! filter, matching the trigger's action code for status changes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::PatchError;
use crate::models::{PatchOp, PatchOperation};
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::reconcile::ReasonReconciler;
use crate::store::ClientRepository;

const STATUS_PATHS: &[&str] = &["/clientStatusCode"];

/// Action code the audit trigger records for status changes.
pub const STATUS_ACTION: &str = "STAT";

pub struct ClientStatusHandler {
    client: Arc<dyn ClientRepository>,
    reconciler: ReasonReconciler,
}

impl ClientStatusHandler {
    pub fn new(client: Arc<dyn ClientRepository>, reconciler: ReasonReconciler) -> Self {
        Self { client, reconciler }
    }
}

#[async_trait]
impl PatchHandler for ClientStatusHandler {
    fn prefix(&self) -> &'static str {
        "client"
    }

    fn restricted_paths(&self) -> &'static [&'static str] {
        STATUS_PATHS
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, self.prefix());
        let replaces = ops::filter_op(&scoped, PatchOp::Replace);
        let (kept, _) = ops::restrict_paths(&replaces, STATUS_PATHS);
        if kept.is_empty() {
            return Ok(());
        }

        let current = self
            .client
            .find(client_number)
            .await?
            .ok_or_else(|| PatchError::malformed(format!("client {client_number} not found")))?;

        let candidate = ops::apply_replace(&current, &kept)?;
        if candidate == current {
            debug!(client_number, "status unchanged; suppressing write");
            return Ok(());
        }

        let mut next = candidate;
        next.updated_by = actor.to_string();
        next.updated_at = Utc::now();
        next.revision = current.revision + 1;
        self.client.update(&next).await?;
        info!(
            client_number,
            status = %next.client_status_code,
            "client status updated"
        );

        for entry in ops::reasons_for_field(patch, "/client/status") {
            self.reconciler
                .reconcile(client_number, &entry.reason, Some(STATUS_ACTION), actor)
                .await?;
        }

        Ok(())
    }
}
