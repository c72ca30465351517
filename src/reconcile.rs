//! Reason reconciliation: the awaited-side-effect bridge.
//!
//! A trigger on the legacy tables creates a reason audit row as a side effect
//! of a mutation this engine has already committed, stamped with the
//! [`UNDEFINED_REASON`](crate::models::UNDEFINED_REASON) sentinel. Because
//! that creation is asynchronous relative to our own write, the reconciler
//! polls for the sentinel row with bounded exponential backoff and overwrites
//! its reason code with the caller-supplied one.
//!
//! One shared component serves every handler; the status handler passes an
//! action filter instead of carrying its own polling loop.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::PatchEngineConfig;
use crate::error::PatchError;
use crate::store::ReasonAuditRepository;

#[derive(Clone)]
pub struct ReasonReconciler {
    audit: Arc<dyn ReasonAuditRepository>,
    max_attempts: u32,
    base_backoff: Duration,
}

impl ReasonReconciler {
    pub fn new(audit: Arc<dyn ReasonAuditRepository>, config: PatchEngineConfig) -> Self {
        Self {
            audit,
            max_attempts: config.reconcile_max_attempts.max(1),
            base_backoff: config.reconcile_base_backoff,
        }
    }

    /// Find the client's sentinel audit row (optionally filtered by the
    /// action code the trigger recorded) and overwrite its reason code.
    ///
    /// Fails with [`PatchError::ReasonReconciliationExhausted`] if no row
    /// appears within the retry budget. The field mutation the reason was
    /// meant to annotate is not rolled back.
    pub async fn reconcile(
        &self,
        client_number: &str,
        reason_code: &str,
        action_filter: Option<&str>,
        actor: &str,
    ) -> Result<(), PatchError> {
        for attempt in 1..=self.max_attempts {
            if let Some(record) = self
                .audit
                .find_undefined(client_number, action_filter)
                .await?
            {
                debug!(
                    client_number,
                    audit_id = record.audit_id,
                    reason_code,
                    attempt,
                    "resolving undefined reason audit row"
                );
                self.audit
                    .update_reason(record.audit_id, reason_code, actor)
                    .await?;
                return Ok(());
            }

            if attempt < self.max_attempts {
                let delay = self.backoff(attempt);
                debug!(
                    client_number,
                    ?action_filter,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "audit row not yet visible; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            client_number,
            ?action_filter,
            attempts = self.max_attempts,
            "reason reconciliation exhausted; audit row stays undefined"
        );
        Err(PatchError::ReasonReconciliationExhausted {
            client_number: client_number.to_string(),
            action_filter: action_filter.map(str::to_string),
            attempts: self.max_attempts,
        })
    }

    /// `base * 2^(attempt-1)` plus uniform jitter in `[0, base/2)`.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff * 2u32.saturating_pow(attempt - 1);
        let jitter_cap = (self.base_backoff.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_cap);
        exp + Duration::from_millis(jitter)
    }
}
