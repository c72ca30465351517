//! Location-scoped reason annotations.
//!
//! Handles `reasons` entries whose `field` encodes a location code
//! (`/addresses/{locationCode}`). The location write runs earlier in the
//! handler order, so the trigger-created sentinel row is assumed to exist
//! already; the update is single-shot, no retry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::PatchError;
use crate::models::PatchOperation;
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::store::ReasonAuditRepository;

pub struct LocationReasonHandler {
    audit: Arc<dyn ReasonAuditRepository>,
}

impl LocationReasonHandler {
    pub fn new(audit: Arc<dyn ReasonAuditRepository>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl PatchHandler for LocationReasonHandler {
    fn prefix(&self) -> &'static str {
        "addresses"
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        for entry in ops::reason_entries(patch) {
            let Some(rest) = entry.field.strip_prefix("/addresses/") else {
                continue;
            };
            // Field is exactly "/addresses/{code}"; deeper paths belong to
            // no location audit.
            if rest.is_empty() || rest.contains('/') {
                continue;
            }

            let updated = self
                .audit
                .update_location_reason(client_number, rest, &entry.reason, actor)
                .await?;
            if updated == 0 {
                warn!(
                    client_number,
                    locn_code = rest,
                    "no undefined audit row for location reason"
                );
            } else {
                info!(
                    client_number,
                    locn_code = rest,
                    reason = %entry.reason,
                    "location reason recorded"
                );
            }
        }
        Ok(())
    }
}
