//! Partial-update (JSON-Patch) engine for the legacy client registry tables.
//!
//! The registry stores one logical client denormalized across several legacy
//! tables: core identity, locations, contacts (one row per contact/location
//! association), a trade-name alias and related-client relationships. This
//! crate applies an externally authored JSON-Patch-shaped change set against
//! those tables, guaranteeing that every business-meaningful field change is
//! annotated with an auditable reason code — a code that lands in an audit
//! row created asynchronously by a database trigger, which the engine
//! reconciles with bounded polling.
//!
//! The sole entry point is [`PatchDispatcher::apply`]. Handlers run in a
//! fixed priority order; there is no cross-handler transaction, so a failed
//! patch may be partially applied.
//!
//! ```no_run
//! use client_registry_patch::{PatchDispatcher, PatchEngineConfig, Repositories};
//!
//! # async fn example(pool: sqlx::PgPool, patch: Vec<client_registry_patch::PatchOperation>) -> Result<(), client_registry_patch::PatchError> {
//! let repos = Repositories::postgres(pool);
//! let dispatcher = PatchDispatcher::new(repos, PatchEngineConfig::from_env());
//! dispatcher.apply("00000001", &patch, "idir\\jdoe").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod patch;
pub mod reconcile;
pub mod store;

pub use config::PatchEngineConfig;
pub use error::PatchError;
pub use models::{PatchOp, PatchOperation, ReasonEntry};
pub use patch::{PatchDispatcher, PatchHandler};
pub use reconcile::ReasonReconciler;
pub use store::Repositories;
