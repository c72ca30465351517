//! Record types for the denormalized legacy client tables, plus the
//! patch-operation types the engine consumes.
//!
//! Serde names follow the patch vocabulary (camelCase JSON pointer segments);
//! struct fields follow the legacy column names. `sqlx::FromRow` derives are
//! gated behind the `database` feature so the in-memory test store can share
//! the same types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reason code the audit trigger writes before the engine supplies a real one.
pub const UNDEFINED_REASON: &str = "UND";

/// Actor value the legacy delete trigger stamps on audit rows it creates.
/// Rewritten to the real acting user after structural removes.
pub const TRIGGER_ACTOR_PLACEHOLDER: &str = "TRIGGERAUDIT";

/// Location code of the default/primary location by registry convention.
pub const DEFAULT_LOCATION_CODE: &str = "00";

// ---------------------------------------------------------------------------
// Patch input
// ---------------------------------------------------------------------------

/// RFC 6902 operation kind (the subset the registry accepts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One JSON-Patch operation. Paths are namespaced by a first segment naming
/// the sub-entity (`client`, `addresses`, `contacts`, `doingBusinessAs`,
/// `relatedClients`, `reasons`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl PatchOperation {
    pub fn new(op: PatchOp, path: impl Into<String>, value: Option<serde_json::Value>) -> Self {
        Self {
            op,
            path: path.into(),
            value,
        }
    }
}

/// Payload of a `/reasons/-` add operation: annotates a field change with the
/// business reason code the audit trail requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonEntry {
    pub field: String,
    pub reason: String,
}

/// Payload of a whole-contact `add` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    pub contact_type_code: String,
    pub contact_name: String,
    #[serde(default)]
    pub business_phone: Option<String>,
    #[serde(default)]
    pub secondary_phone: Option<String>,
    #[serde(default)]
    pub fax_number: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    /// Locations the contact is filed under; one row is stored per code.
    pub location_codes: Vec<String>,
}

/// Payload of a related-client `add`/`replace` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPayload {
    pub related_client_number: String,
    pub related_client_locn_code: String,
    pub relationship_code: String,
    #[serde(default)]
    pub percentage_ownership: Option<Decimal>,
    #[serde(default)]
    pub signing_auth_ind: Option<bool>,
}

// ---------------------------------------------------------------------------
// Legacy records
// ---------------------------------------------------------------------------

/// Core client identity row. Owned by the identity/type/external-id/status
/// handlers; pre-exists before any patch reaches this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ClientRecord {
    pub client_number: String,
    pub client_name: String,
    pub legal_first_name: Option<String>,
    pub legal_middle_name: Option<String>,
    pub client_type_code: String,
    pub client_status_code: String,
    pub client_id_type_code: Option<String>,
    pub client_identification: Option<String>,
    pub registry_company_type_code: Option<String>,
    pub corp_regn_nmbr: Option<String>,
    pub client_acronym: Option<String>,
    pub wcb_firm_number: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub client_comment: Option<String>,
    pub revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// One physical location of a client, keyed by (client number, location code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ClientLocation {
    pub client_number: String,
    pub client_locn_code: String,
    pub client_locn_name: Option<String>,
    pub address_one: Option<String>,
    pub address_two: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub business_phone: Option<String>,
    pub cell_phone: Option<String>,
    pub home_phone: Option<String>,
    pub fax_number: Option<String>,
    pub email_address: Option<String>,
    pub cli_locn_comment: Option<String>,
    pub expired_ind: bool,
    pub revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// One contact row. A logical contact (a person) is stored denormalized as
/// one row per associated location; rows for the same person share the
/// uppercased `contact_name` and form a sibling group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ClientContact {
    pub contact_id: i64,
    pub client_number: String,
    pub client_locn_code: String,
    pub contact_type_code: String,
    pub contact_name: String,
    pub business_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub fax_number: Option<String>,
    pub email_address: Option<String>,
    pub revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Trade-name alias. At most one active row per client in this engine's view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct DoingBusinessAs {
    pub client_number: String,
    pub doing_business_as_name: String,
    pub revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Edge between (client, location) and (related client, related location).
/// Which side is primary is implicit from which client number anchors the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct RelatedClientRelationship {
    pub client_number: String,
    pub client_locn_code: String,
    pub related_client_number: String,
    pub related_client_locn_code: String,
    pub relationship_code: String,
    pub percentage_ownership: Option<Decimal>,
    pub signing_auth_ind: Option<bool>,
    pub revision: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl RelatedClientRelationship {
    /// Identity tuple used for dedup on add/replace.
    pub fn tuple(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.client_number,
            &self.client_locn_code,
            &self.related_client_number,
            &self.related_client_locn_code,
            &self.relationship_code,
        )
    }
}

/// Audit row created asynchronously by a database trigger with the
/// [`UNDEFINED_REASON`] sentinel, later overwritten by reason reconciliation.
/// This engine updates these rows but never creates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ReasonAuditRecord {
    pub audit_id: i64,
    pub client_number: String,
    /// What kind of change the trigger recorded ("NAME", "ID", "STAT", "ADDR", ...).
    pub action_code: String,
    /// Set for location-scoped audits.
    pub client_locn_code: Option<String>,
    pub reason_code: String,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}
