//! Handler contract and the priority-ordered dispatcher.

pub mod ops;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::PatchEngineConfig;
use crate::error::PatchError;
use crate::handlers;
use crate::models::PatchOperation;
use crate::reconcile::ReasonReconciler;
use crate::store::Repositories;

/// One sub-entity concern of the patch document.
///
/// A handler owns a path prefix and an allow-list of mutable field paths
/// under it (empty for handlers whose operations are structural add/remove
/// rather than field replace). A handler that finds nothing under its prefix
/// is a no-op.
#[async_trait]
pub trait PatchHandler: Send + Sync {
    /// First path segment this handler owns (`client`, `addresses`, ...).
    fn prefix(&self) -> &'static str;

    /// Allow-listed mutable field paths under the prefix.
    fn restricted_paths(&self) -> &'static [&'static str] {
        &[]
    }

    /// Apply the operations this handler owns from `patch` against the
    /// client's stored state.
    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError>;
}

/// Sole entry point for applying a patch document.
///
/// Holds the statically ordered handler list and runs each one to completion
/// before starting the next; later handlers read state earlier handlers may
/// have just written. Stops at the first handler error. There is no
/// cross-handler transaction: writes committed by earlier handlers stand even
/// when a later handler fails, so callers must treat a failed patch as
/// possibly partially applied.
pub struct PatchDispatcher {
    handlers: Vec<Arc<dyn PatchHandler>>,
}

impl PatchDispatcher {
    /// Build the dispatcher with the fixed handler order: client identity,
    /// type, external id, status, locations, location reasons, contact
    /// add/edit/remove/associate, doing-business-as, related clients.
    pub fn new(repos: Repositories, config: PatchEngineConfig) -> Self {
        let reconciler = ReasonReconciler::new(repos.reason_audit.clone(), config);

        let handlers: Vec<Arc<dyn PatchHandler>> = vec![
            Arc::new(handlers::client_fields::identity_handler(
                repos.client.clone(),
                reconciler.clone(),
            )),
            Arc::new(handlers::client_fields::type_handler(
                repos.client.clone(),
                reconciler.clone(),
            )),
            Arc::new(handlers::client_fields::external_id_handler(
                repos.client.clone(),
                reconciler.clone(),
            )),
            Arc::new(handlers::client_status::ClientStatusHandler::new(
                repos.client.clone(),
                reconciler.clone(),
            )),
            Arc::new(handlers::locations::LocationHandler::new(
                repos.location.clone(),
            )),
            Arc::new(handlers::location_reasons::LocationReasonHandler::new(
                repos.reason_audit.clone(),
            )),
            Arc::new(handlers::contacts::ContactAddHandler::new(
                repos.contact.clone(),
            )),
            Arc::new(handlers::contacts::ContactEditHandler::new(
                repos.contact.clone(),
            )),
            Arc::new(handlers::contacts::ContactRemoveHandler::new(
                repos.contact.clone(),
            )),
            Arc::new(handlers::contacts::ContactAssociateHandler::new(
                repos.contact.clone(),
                repos.reason_audit.clone(),
            )),
            Arc::new(handlers::doing_business_as::DoingBusinessAsHandler::new(
                repos.alias.clone(),
            )),
            Arc::new(handlers::related_clients::RelatedClientHandler::new(
                repos.relationship.clone(),
                repos.reason_audit.clone(),
            )),
        ];

        Self { handlers }
    }

    /// Run every handler, in order, against the same patch document.
    pub async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        debug!(
            client_number,
            operations = patch.len(),
            "applying patch document"
        );
        self.warn_unowned_client_paths(client_number, patch);

        for handler in &self.handlers {
            if let Err(e) = handler.apply(client_number, patch, actor).await {
                warn!(
                    client_number,
                    prefix = handler.prefix(),
                    error = %e,
                    "patch handler failed; aborting remaining handlers"
                );
                return Err(e);
            }
        }

        debug!(client_number, "patch document applied");
        Ok(())
    }

    /// A `client` replace outside every handler's allow-list is dropped
    /// best-effort; make the drop visible instead of silent.
    fn warn_unowned_client_paths(&self, client_number: &str, patch: &[PatchOperation]) {
        let client_ops = ops::filter_by_prefix(patch, "client");
        for op in client_ops {
            let owned = self
                .handlers
                .iter()
                .filter(|h| h.prefix() == "client")
                .any(|h| h.restricted_paths().contains(&op.path.as_str()));
            if !owned {
                warn!(
                    client_number,
                    path = %op.path,
                    "dropping patch operation outside every allow-list"
                );
            }
        }
    }
}
