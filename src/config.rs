//! Engine configuration.
//!
//! The only tunable behavior is the reason-reconciliation poll: the audit row
//! this engine must annotate is created by a database trigger after our own
//! write commits, so the wait for it is bounded by these knobs.

use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_BACKOFF_MS: u64 = 200;

/// Retry/backoff parameters for the awaited-side-effect poll in
/// [`crate::reconcile::ReasonReconciler`].
#[derive(Debug, Clone)]
pub struct PatchEngineConfig {
    /// Maximum lookup attempts before reconciliation fails.
    pub reconcile_max_attempts: u32,
    /// Base delay; attempt `n` sleeps `base * 2^(n-1)` plus jitter.
    pub reconcile_base_backoff: Duration,
}

impl Default for PatchEngineConfig {
    fn default() -> Self {
        Self {
            reconcile_max_attempts: DEFAULT_MAX_ATTEMPTS,
            reconcile_base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
        }
    }
}

impl PatchEngineConfig {
    /// Load from the environment, falling back to defaults.
    ///
    /// Recognized variables: `PATCH_RECON_MAX_ATTEMPTS`,
    /// `PATCH_RECON_BASE_BACKOFF_MS`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Some(attempts) = env_parse::<u32>("PATCH_RECON_MAX_ATTEMPTS") {
            config.reconcile_max_attempts = attempts.max(1);
        }
        if let Some(ms) = env_parse::<u64>("PATCH_RECON_BASE_BACKOFF_MS") {
            config.reconcile_base_backoff = Duration::from_millis(ms);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config variable");
            None
        }
    }
}
