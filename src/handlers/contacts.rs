//! Contact handlers.
//!
//! Contacts are denormalized: a logical contact (a person) is one row per
//! associated location, the sibling group keyed by the uppercased contact
//! name. Four handlers cooperate over the `contacts` prefix, each scoped to
//! one operation shape:
//!
//! - add: whole-contact `add` with a payload carrying `locationCodes`
//! - edit: `replace` on `/contacts/{id}/{field}`, fanned out to siblings
//! - remove: `remove` at `/contacts/{id}`, deleting the whole sibling group
//! - associate: ops under `/contacts/{id}/locationCodes/{index|-}`
//!
//! Positional indexes in association paths are resolved against a snapshot
//! of the stored location-code order taken once per invocation; callers are
//! assumed to be the single writer for the client while the patch runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::PatchError;
use crate::models::{ClientContact, ContactPayload, PatchOp, PatchOperation};
use crate::patch::ops;
use crate::patch::PatchHandler;
use crate::store::{ContactRepository, ReasonAuditRepository};

const PREFIX: &str = "contacts";

const EDIT_FIELDS: &[&str] = &[
    "/contactName",
    "/contactTypeCode",
    "/businessPhone",
    "/secondaryPhone",
    "/faxNumber",
    "/emailAddress",
];

fn parse_contact_id(path: &str) -> Result<i64, PatchError> {
    let seg = ops::path_segment(path, 0)?;
    seg.parse()
        .map_err(|_| PatchError::malformed(format!("path {path}: {seg:?} is not a contact id")))
}

fn string_value(op: &PatchOperation) -> Result<String, PatchError> {
    match &op.value {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(PatchError::malformed(format!(
            "operation at {} expects a string value, got {other:?}",
            op.path
        ))),
    }
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

/// Inserts a whole new contact: one row per location code in the payload,
/// each with a freshly allocated identifier.
pub struct ContactAddHandler {
    contact: Arc<dyn ContactRepository>,
}

impl ContactAddHandler {
    pub fn new(contact: Arc<dyn ContactRepository>) -> Self {
        Self { contact }
    }

    async fn add_contact(
        &self,
        client_number: &str,
        payload: ContactPayload,
        actor: &str,
    ) -> Result<(), PatchError> {
        let name = payload.contact_name.to_uppercase();
        for code in &payload.location_codes {
            if self.contact.exists(client_number, &name, code).await? {
                debug!(client_number, contact_name = %name, locn_code = %code, "contact row already present; skipping");
                continue;
            }
            let now = Utc::now();
            let row = ClientContact {
                contact_id: self.contact.next_contact_id().await?,
                client_number: client_number.to_string(),
                client_locn_code: code.clone(),
                contact_type_code: payload.contact_type_code.clone(),
                contact_name: name.clone(),
                business_phone: payload.business_phone.clone(),
                secondary_phone: payload.secondary_phone.clone(),
                fax_number: payload.fax_number.clone(),
                email_address: payload.email_address.clone(),
                revision: 1,
                created_by: actor.to_string(),
                created_at: now,
                updated_by: actor.to_string(),
                updated_at: now,
            };
            self.contact.insert(&row).await?;
        }
        info!(client_number, contact_name = %name, locations = payload.location_codes.len(), "contact added");
        Ok(())
    }
}

#[async_trait]
impl PatchHandler for ContactAddHandler {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, PREFIX);
        for op in scoped
            .iter()
            .filter(|o| o.op == PatchOp::Add && ops::segment_count(&o.path) == 1)
        {
            let payload: ContactPayload = op
                .value
                .clone()
                .ok_or_else(|| PatchError::malformed("contact add without payload"))
                .and_then(|v| {
                    serde_json::from_value(v)
                        .map_err(|e| PatchError::malformed(format!("invalid contact payload: {e}")))
                })?;
            self.add_contact(client_number, payload, actor).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// Applies scalar field changes to a contact. The target row is resolved by
/// identifier; the same changes are fanned out to every sibling row sharing
/// the contact name, each row's revision and audit columns bumped
/// independently.
pub struct ContactEditHandler {
    contact: Arc<dyn ContactRepository>,
}

impl ContactEditHandler {
    pub fn new(contact: Arc<dyn ContactRepository>) -> Self {
        Self { contact }
    }
}

#[async_trait]
impl PatchHandler for ContactEditHandler {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    fn restricted_paths(&self) -> &'static [&'static str] {
        EDIT_FIELDS
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, PREFIX);

        // Field replaces grouped by target contact id, paths re-rooted at
        // the field so they resolve against a serialized contact row.
        let mut by_contact: BTreeMap<i64, Vec<PatchOperation>> = BTreeMap::new();
        for op in scoped
            .iter()
            .filter(|o| o.op == PatchOp::Replace && ops::segment_count(&o.path) == 2)
        {
            let field_path = format!("/{}", ops::path_segment(&op.path, 1)?);
            if !EDIT_FIELDS.contains(&field_path.as_str()) {
                debug!(client_number, path = %op.path, "dropping non-mutable contact field");
                continue;
            }
            by_contact
                .entry(parse_contact_id(&op.path)?)
                .or_default()
                .push(PatchOperation::new(op.op, field_path, op.value.clone()));
        }

        for (contact_id, field_ops) in by_contact {
            let target = self
                .contact
                .find_by_id(client_number, contact_id)
                .await?
                .ok_or_else(|| {
                    PatchError::malformed(format!(
                        "client {client_number} has no contact {contact_id}"
                    ))
                })?;

            let siblings = self
                .contact
                .find_by_name(client_number, &target.contact_name)
                .await?;

            for sibling in siblings {
                let candidate = ops::apply_replace(&sibling, &field_ops)?;
                if candidate == sibling {
                    continue;
                }
                let mut next = candidate;
                next.contact_name = next.contact_name.to_uppercase();
                next.updated_by = actor.to_string();
                next.updated_at = Utc::now();
                next.revision = sibling.revision + 1;
                self.contact.update(&next).await?;
            }
            info!(client_number, contact_id, "contact edited across sibling rows");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Removes a contact from every location it is associated with: deletes all
/// rows sharing the target's contact name.
pub struct ContactRemoveHandler {
    contact: Arc<dyn ContactRepository>,
}

impl ContactRemoveHandler {
    pub fn new(contact: Arc<dyn ContactRepository>) -> Self {
        Self { contact }
    }
}

#[async_trait]
impl PatchHandler for ContactRemoveHandler {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        _actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, PREFIX);
        for op in scoped
            .iter()
            .filter(|o| o.op == PatchOp::Remove && ops::segment_count(&o.path) == 1)
        {
            let contact_id = parse_contact_id(&op.path)?;
            let target = self
                .contact
                .find_by_id(client_number, contact_id)
                .await?
                .ok_or_else(|| {
                    PatchError::malformed(format!(
                        "client {client_number} has no contact {contact_id}"
                    ))
                })?;
            self.contact
                .delete_by_name(client_number, &target.contact_name)
                .await?;
            info!(client_number, contact_id, contact_name = %target.contact_name, "contact removed from all locations");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Associate
// ---------------------------------------------------------------------------

/// Manages which locations a contact is linked to, independent of its scalar
/// fields. Runs in fixed phase order: removes, then adds, then replaces.
/// Indexes are resolved against the stored order snapshotted at entry.
pub struct ContactAssociateHandler {
    contact: Arc<dyn ContactRepository>,
    audit: Arc<dyn ReasonAuditRepository>,
}

impl ContactAssociateHandler {
    pub fn new(contact: Arc<dyn ContactRepository>, audit: Arc<dyn ReasonAuditRepository>) -> Self {
        Self { contact, audit }
    }

    fn resolve_code<'a>(
        codes: &'a [String],
        path: &str,
    ) -> Result<&'a str, PatchError> {
        let idx = ops::path_index(path, 2)?;
        codes.get(idx).map(String::as_str).ok_or_else(|| {
            PatchError::malformed(format!(
                "association index {idx} out of range ({} locations)",
                codes.len()
            ))
        })
    }

    async fn associate(
        &self,
        client_number: &str,
        contact_id: i64,
        assoc_ops: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let reference = self
            .contact
            .find_by_id(client_number, contact_id)
            .await?
            .ok_or_else(|| {
                PatchError::malformed(format!(
                    "client {client_number} has no contact {contact_id}"
                ))
            })?;
        let name = reference.contact_name.clone();

        // Freshest authoritative order; every positional index below
        // resolves against this snapshot.
        let codes = self.contact.location_codes(client_number, &name).await?;

        // Phase 1: removes.
        let removes: Vec<&str> = assoc_ops
            .iter()
            .filter(|o| o.op == PatchOp::Remove)
            .map(|o| Self::resolve_code(&codes, &o.path))
            .collect::<Result<_, _>>()?;
        try_join_all(
            removes
                .iter()
                .map(|code| self.contact.delete(client_number, &name, code)),
        )
        .await?;
        if !removes.is_empty() {
            // The delete trigger cannot know the calling user; rewrite its
            // placeholder actor on the audit rows it just created.
            self.audit
                .rewrite_delete_actor(client_number, actor)
                .await?;
        }

        // Phase 2: adds, skipping existing (contact, location) pairs.
        for op in assoc_ops.iter().filter(|o| o.op == PatchOp::Add) {
            let new_code = string_value(op)?;
            if self.contact.exists(client_number, &name, &new_code).await? {
                debug!(client_number, contact_name = %name, locn_code = %new_code, "association already present; skipping add");
                continue;
            }
            let now = Utc::now();
            let row = ClientContact {
                contact_id: self.contact.next_contact_id().await?,
                client_locn_code: new_code,
                revision: 1,
                created_by: actor.to_string(),
                created_at: now,
                updated_by: actor.to_string(),
                updated_at: now,
                ..reference.clone()
            };
            self.contact.insert(&row).await?;
        }

        // Phase 3: replaces, moving an existing association to a new code.
        for op in assoc_ops.iter().filter(|o| o.op == PatchOp::Replace) {
            let old_code = Self::resolve_code(&codes, &op.path)?;
            let new_code = string_value(op)?;
            if self.contact.exists(client_number, &name, &new_code).await? {
                debug!(client_number, contact_name = %name, locn_code = %new_code, "association already present; skipping replace");
                continue;
            }
            let rows = self.contact.find_by_name(client_number, &name).await?;
            let Some(row) = rows.into_iter().find(|r| r.client_locn_code == old_code) else {
                debug!(client_number, contact_name = %name, locn_code = %old_code, "association gone before replace; skipping");
                continue;
            };
            let mut next = row.clone();
            next.client_locn_code = new_code;
            next.updated_by = actor.to_string();
            next.updated_at = Utc::now();
            next.revision = row.revision + 1;
            self.contact.update(&next).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PatchHandler for ContactAssociateHandler {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    async fn apply(
        &self,
        client_number: &str,
        patch: &[PatchOperation],
        actor: &str,
    ) -> Result<(), PatchError> {
        let scoped = ops::filter_by_prefix(patch, PREFIX);

        let mut by_contact: BTreeMap<i64, Vec<PatchOperation>> = BTreeMap::new();
        for op in scoped.iter().filter(|o| {
            ops::segment_count(&o.path) == 3
                && ops::path_segment(&o.path, 1).is_ok_and(|s| s == "locationCodes")
        }) {
            by_contact
                .entry(parse_contact_id(&op.path)?)
                .or_default()
                .push(op.clone());
        }

        for (contact_id, assoc_ops) in by_contact {
            self.associate(client_number, contact_id, &assoc_ops, actor)
                .await?;
        }
        Ok(())
    }
}
