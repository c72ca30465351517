//! Scalar field handlers over the core client record.
//!
//! Identity, type and external-id share one template: filter the patch to
//! allow-listed `replace` operations under `client`, compute the candidate
//! next-state, suppress the write when nothing actually changes, otherwise
//! stamp audit columns, bump the revision and persist, then reconcile any
//! reason annotations declared for this handler's field path.

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

const IDENTITY_PATHS: &[&str] = &[
    "/clientAcronym",
    "/clientComment",
    "/birthdate",
    "/corpRegnNmbr",
    "/registryCompanyTypeCode",
    "/wcbFirmNumber",
    // Also allow-listed by the type handler; the overlap is deliberate and
    // harmless because both run the same equality-suppressed template.
    "/clientTypeCode",
];
const TYPE_PATHS: &[&str] = &["/clientTypeCode"];
const EXTERNAL_ID_PATHS: &[&str] = &["/clientIdentification", "/clientIdTypeCode"];

/// One scalar-field concern over the client record.
pub struct ScalarFieldHandler {
    name: &'static str,
    restricted: &'static [&'static str],
    /// `field` value that selects this handler's reason annotations.
    reason_field: &'static str,
    client: Arc<dyn ClientRepository>,
    reconciler: ReasonReconciler,
}

pub fn identity_handler(
    client: Arc<dyn ClientRepository>,
    reconciler: ReasonReconciler,
) -> ScalarFieldHandler {
    ScalarFieldHandler {
        name: "client-identity",
        restricted: IDENTITY_PATHS,
        reason_field: "/client/information",
        client,
        reconciler,
    }
}

pub fn type_handler(
    client: Arc<dyn ClientRepository>,
    reconciler: ReasonReconciler,
) -> ScalarFieldHandler {
    ScalarFieldHandler {
        name: "client-type",
        restricted: TYPE_PATHS,
        reason_field: "/client/clientTypeCode",
        client,
        reconciler,
    }
}

pub fn external_id_handler(
    client: Arc<dyn ClientRepository>,
    reconciler: ReasonReconciler,
) -> ScalarFieldHandler {
    ScalarFieldHandler {
        name: "client-external-id",
        restricted: EXTERNAL_ID_PATHS,
        reason_field: "/client/id",
        client,
        reconciler,
    }
}

#[async_trait]
impl PatchHandler for ScalarFieldHandler {
    fn prefix(&self) -> &'static str {
        "client"
    }

    fn restricted_paths(&self) -> &'static [&'static str] {
        self.restricted
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, self.prefix());
        let replaces = ops::filter_op(&scoped, PatchOp::Replace);
        let (kept, _) = ops::restrict_paths(&replaces, self.restricted);
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
            debug!(
                client_number,
                handler = self.name,
                "candidate state equals current; suppressing write"
            );
            return Ok(());
        }

        let mut next = candidate;
        next.updated_by = actor.to_string();
        next.updated_at = Utc::now();
        next.revision = current.revision + 1;
        self.client.update(&next).await?;
        info!(
            client_number,
            handler = self.name,
            revision = next.revision,
            "client record updated"
        );

        for entry in ops::reasons_for_field(patch, self.reason_field) {
            self.reconciler
                .reconcile(client_number, &entry.reason, None, actor)
                .await?;
        }

        Ok(())
    }
}
