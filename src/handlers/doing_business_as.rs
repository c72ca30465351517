//! Trade-name alias handler.
//!
//! At most one active alias row per client in this engine's view. An
//! `add`/`replace` of the alias name updates the existing row or inserts a
//! new one through a uniqueness-checked insert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::PatchError;
use crate::models::{DoingBusinessAs, PatchOp, PatchOperation};
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::store::AliasRepository;

pub struct DoingBusinessAsHandler {
    alias: Arc<dyn AliasRepository>,
}

impl DoingBusinessAsHandler {
    pub fn new(alias: Arc<dyn AliasRepository>) -> Self {
        Self { alias }
    }

    async fn set_alias(
        &self,
        client_number: &str,
        name: &str,
        actor: &str,
    ) -> Result<(), PatchError> {
        match self.alias.find(client_number).await? {
            Some(existing) => {
                let mut next = existing.clone();
                next.doing_business_as_name = name.to_string();
                next.updated_by = actor.to_string();
                next.updated_at = Utc::now();
                next.revision = existing.revision + 1;
                self.alias.update(&next).await?;
                info!(client_number, alias = name, "doing-business-as updated");
            }
            None => {
                let now = Utc::now();
                let inserted = self
                    .alias
                    .insert_if_absent(&DoingBusinessAs {
                        client_number: client_number.to_string(),
                        doing_business_as_name: name.to_string(),
                        revision: 1,
                        created_by: actor.to_string(),
                        created_at: now,
                        updated_by: actor.to_string(),
                        updated_at: now,
                    })
                    .await?;
                if inserted {
                    info!(client_number, alias = name, "doing-business-as created");
                } else {
                    debug!(client_number, alias = name, "identical alias already present; skipping insert");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PatchHandler for DoingBusinessAsHandler {
    fn prefix(&self) -> &'static str {
        "doingBusinessAs"
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, self.prefix());
        for op in scoped
            .iter()
            .filter(|o| matches!(o.op, PatchOp::Add | PatchOp::Replace))
        {
            let name = match &op.value {
                Some(Value::String(s)) => s.clone(),
                other => {
                    return Err(PatchError::malformed(format!(
                        "doingBusinessAs expects a string name, got {other:?}"
                    )))
                }
            };
            self.set_alias(client_number, &name, actor).await?;
        }
        Ok(())
    }
}
