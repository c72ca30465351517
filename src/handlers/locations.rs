//! Location field handler.
//!
//! Paths are `/addresses/{locationCode}/{field}`. For each touched location
//! the allow-listed fields are mapped to legacy columns and applied as one
//! field-level partial update; changes whose value equals the stored one are
//! dropped so a same-value patch never bumps revision or audit columns. The
//! repository stamps audit columns and bumps the revision as part of the
//! same update. Reason annotations for locations are handled separately by
//! [`super::location_reasons`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::PatchError;
use crate::models::{PatchOp, PatchOperation};
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::store::LocationRepository;

/// Mutable location fields, patch segment → legacy column.
const FIELD_COLUMNS: &[(&str, &str)] = &[
    ("clientLocnName", "client_locn_name"),
    ("emailAddress", "email_address"),
    ("faxNumber", "fax_number"),
    ("businessPhone", "business_phone"),
    ("cellPhone", "cell_phone"),
    ("homePhone", "home_phone"),
    ("cliLocnComment", "cli_locn_comment"),
];

const RESTRICTED: &[&str] = &[
    "clientLocnName",
    "emailAddress",
    "faxNumber",
    "businessPhone",
    "cellPhone",
    "homePhone",
    "cliLocnComment",
];

pub struct LocationHandler {
    location: Arc<dyn LocationRepository>,
}

impl LocationHandler {
    pub fn new(location: Arc<dyn LocationRepository>) -> Self {
        Self { location }
    }

    fn column_for(field: &str) -> Option<&'static str> {
        FIELD_COLUMNS
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| *c)
    }

    fn current_value(location: &crate::models::ClientLocation, column: &str) -> Option<String> {
        match column {
            "client_locn_name" => location.client_locn_name.clone(),
            "email_address" => location.email_address.clone(),
            "fax_number" => location.fax_number.clone(),
            "business_phone" => location.business_phone.clone(),
            "cell_phone" => location.cell_phone.clone(),
            "home_phone" => location.home_phone.clone(),
            "cli_locn_comment" => location.cli_locn_comment.clone(),
            _ => None,
        }
    }

    async fn patch_location(
        &self,
        client_number: &str,
        locn_code: &str,
        location_ops: &[&PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let current = self
            .location
            .find(client_number, locn_code)
            .await?
            .ok_or_else(|| {
                PatchError::malformed(format!(
                    "client {client_number} has no location {locn_code}"
                ))
            })?;

        let mut changes: Vec<(String, Option<String>)> = Vec::new();
        for op in location_ops {
            let field = ops::path_segment(&op.path, 1)?;
            let Some(column) = Self::column_for(field) else {
                debug!(client_number, locn_code, field, "dropping non-mutable location field");
                continue;
            };
            let value = match &op.value {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(PatchError::malformed(format!(
                        "location field {field} expects a string, got {other}"
                    )))
                }
            };
            if value == Self::current_value(&current, column) {
                debug!(client_number, locn_code, field, "value unchanged; dropping");
                continue;
            }
            changes.push((column.to_string(), value));
        }

        if changes.is_empty() {
            return Ok(());
        }

        self.location
            .update_fields(client_number, locn_code, &changes, actor)
            .await?;
        info!(
            client_number,
            locn_code,
            fields = changes.len(),
            "location partially updated"
        );
        Ok(())
    }
}

#[async_trait]
impl PatchHandler for LocationHandler {
    fn prefix(&self) -> &'static str {
        "addresses"
    }

    fn restricted_paths(&self) -> &'static [&'static str] {
        RESTRICTED
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, self.prefix());
        let replaces = ops::filter_op(&scoped, PatchOp::Replace);
        if replaces.is_empty() {
            return Ok(());
        }

        // Group by location code, preserving document order within a group.
        let mut by_location: BTreeMap<String, Vec<&PatchOperation>> = BTreeMap::new();
        for op in &replaces {
            let code = ops::path_segment(&op.path, 0)?.to_string();
            by_location.entry(code).or_default().push(op);
        }

        try_join_all(by_location.iter().map(|(code, location_ops)| {
            self.patch_location(client_number, code, location_ops, actor)
        }))
        .await?;

        Ok(())
    }
}
