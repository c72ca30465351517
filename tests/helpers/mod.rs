//! In-memory repositories for exercising the patch engine without Postgres,
//! plus fixture builders.
//!
//! The legacy audit triggers are simulated synchronously: mutations through
//! the repositories create undefined-reason audit rows the same way the
//! database triggers would. `suppress_trigger` turns that off to exercise
//! the reconciliation retry budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use client_registry_patch::models::{
    ClientContact, ClientLocation, ClientRecord, DoingBusinessAs, ReasonAuditRecord,
    RelatedClientRelationship, TRIGGER_ACTOR_PLACEHOLDER, UNDEFINED_REASON,
};
use client_registry_patch::store::{
    AliasRepository, ClientRepository, ContactRepository, LocationRepository,
    ReasonAuditRepository, RelationshipRepository, Repositories,
};

pub const ACTOR: &str = "idir\\jdoe";

#[derive(Default)]
pub struct MemoryState {
    pub clients: Vec<ClientRecord>,
    pub locations: Vec<ClientLocation>,
    pub contacts: Vec<ClientContact>,
    pub aliases: Vec<DoingBusinessAs>,
    pub relationships: Vec<RelatedClientRelationship>,
    pub audits: Vec<ReasonAuditRecord>,
    next_contact_id: i64,
    next_audit_id: i64,
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    suppress_trigger: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MemoryState {
                next_contact_id: 1,
                next_audit_id: 1,
                ..MemoryState::default()
            }),
            suppress_trigger: AtomicBool::new(false),
        })
    }

    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            client: self.clone(),
            location: self.clone(),
            contact: self.clone(),
            alias: self.clone(),
            relationship: self.clone(),
            reason_audit: self.clone(),
        }
    }

    /// Stop simulating the audit triggers.
    pub fn suppress_trigger(&self) {
        self.suppress_trigger.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn seed_client(&self, record: ClientRecord) {
        self.state().clients.push(record);
    }

    pub fn seed_location(&self, location: ClientLocation) {
        self.state().locations.push(location);
    }

    pub fn seed_contact(&self, contact: ClientContact) -> i64 {
        let mut state = self.state();
        let id = state.next_contact_id;
        state.next_contact_id += 1;
        let mut contact = contact;
        contact.contact_id = id;
        state.contacts.push(contact);
        id
    }

    pub fn seed_relationship(&self, rel: RelatedClientRelationship) {
        self.state().relationships.push(rel);
    }

    fn trigger_audit(
        state: &mut MemoryState,
        suppressed: bool,
        client_number: &str,
        action_code: &str,
        locn_code: Option<&str>,
        actor: &str,
    ) {
        if suppressed {
            return;
        }
        let audit_id = state.next_audit_id;
        state.next_audit_id += 1;
        state.audits.push(ReasonAuditRecord {
            audit_id,
            client_number: client_number.to_string(),
            action_code: action_code.to_string(),
            client_locn_code: locn_code.map(str::to_string),
            reason_code: UNDEFINED_REASON.to_string(),
            updated_by: actor.to_string(),
            updated_at: Utc::now(),
        });
    }

    fn suppressed(&self) -> bool {
        self.suppress_trigger.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Repository implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn find(&self, client_number: &str) -> Result<Option<ClientRecord>> {
        Ok(self
            .state()
            .clients
            .iter()
            .find(|c| c.client_number == client_number)
            .cloned())
    }

    async fn update(&self, record: &ClientRecord) -> Result<()> {
        let suppressed = self.suppressed();
        let mut state = self.state();
        let Some(idx) = state
            .clients
            .iter()
            .position(|c| c.client_number == record.client_number)
        else {
            bail!("client {} not found", record.client_number);
        };
        let old = state.clients[idx].clone();

        // What the column-level update triggers would record.
        let mut actions = Vec::new();
        if old.client_status_code != record.client_status_code {
            actions.push("STAT");
        }
        if old.client_identification != record.client_identification
            || old.client_id_type_code != record.client_id_type_code
        {
            actions.push("ID");
        }
        if old.client_name != record.client_name
            || old.legal_first_name != record.legal_first_name
            || old.legal_middle_name != record.legal_middle_name
        {
            actions.push("NAME");
        }
        if actions.is_empty() {
            actions.push("INFO");
        }
        for action in actions {
            Self::trigger_audit(
                &mut state,
                suppressed,
                &record.client_number,
                action,
                None,
                &record.updated_by,
            );
        }

        state.clients[idx] = record.clone();
        Ok(())
    }
}

#[async_trait]
impl LocationRepository for MemoryStore {
    async fn find(&self, client_number: &str, locn_code: &str) -> Result<Option<ClientLocation>> {
        Ok(self
            .state()
            .locations
            .iter()
            .find(|l| l.client_number == client_number && l.client_locn_code == locn_code)
            .cloned())
    }

    async fn update_fields(
        &self,
        client_number: &str,
        locn_code: &str,
        changes: &[(String, Option<String>)],
        actor: &str,
    ) -> Result<()> {
        let suppressed = self.suppressed();
        let mut state = self.state();
        let Some(location) = state
            .locations
            .iter_mut()
            .find(|l| l.client_number == client_number && l.client_locn_code == locn_code)
        else {
            bail!("location {client_number}/{locn_code} not found");
        };

        for (column, value) in changes {
            let slot = match column.as_str() {
                "client_locn_name" => &mut location.client_locn_name,
                "email_address" => &mut location.email_address,
                "fax_number" => &mut location.fax_number,
                "business_phone" => &mut location.business_phone,
                "cell_phone" => &mut location.cell_phone,
                "home_phone" => &mut location.home_phone,
                "cli_locn_comment" => &mut location.cli_locn_comment,
                other => bail!("unexpected location column {other}"),
            };
            *slot = value.clone();
        }
        location.revision += 1;
        location.updated_by = actor.to_string();
        location.updated_at = Utc::now();

        Self::trigger_audit(
            &mut state,
            suppressed,
            client_number,
            "ADDR",
            Some(locn_code),
            actor,
        );
        Ok(())
    }
}

#[async_trait]
impl ContactRepository for MemoryStore {
    async fn find_by_id(
        &self,
        client_number: &str,
        contact_id: i64,
    ) -> Result<Option<ClientContact>> {
        Ok(self
            .state()
            .contacts
            .iter()
            .find(|c| c.client_number == client_number && c.contact_id == contact_id)
            .cloned())
    }

    async fn find_by_name(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<ClientContact>> {
        let mut rows: Vec<ClientContact> = self
            .state()
            .contacts
            .iter()
            .filter(|c| c.client_number == client_number && c.contact_name == contact_name)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.client_locn_code.cmp(&b.client_locn_code));
        Ok(rows)
    }

    async fn location_codes(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .find_by_name(client_number, contact_name)
            .await?
            .into_iter()
            .map(|c| c.client_locn_code)
            .collect())
    }

    async fn exists(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<bool> {
        Ok(self.state().contacts.iter().any(|c| {
            c.client_number == client_number
                && c.contact_name == contact_name
                && c.client_locn_code == locn_code
        }))
    }

    async fn next_contact_id(&self) -> Result<i64> {
        let mut state = self.state();
        let id = state.next_contact_id;
        state.next_contact_id += 1;
        Ok(id)
    }

    async fn insert(&self, contact: &ClientContact) -> Result<()> {
        self.state().contacts.push(contact.clone());
        Ok(())
    }

    async fn update(&self, contact: &ClientContact) -> Result<()> {
        let mut state = self.state();
        let Some(row) = state
            .contacts
            .iter_mut()
            .find(|c| c.contact_id == contact.contact_id)
        else {
            bail!("contact {} not found", contact.contact_id);
        };
        *row = contact.clone();
        Ok(())
    }

    async fn delete(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<()> {
        let suppressed = self.suppressed();
        let mut state = self.state();
        state.contacts.retain(|c| {
            !(c.client_number == client_number
                && c.contact_name == contact_name
                && c.client_locn_code == locn_code)
        });
        Self::trigger_audit(
            &mut state,
            suppressed,
            client_number,
            "CONT",
            Some(locn_code),
            TRIGGER_ACTOR_PLACEHOLDER,
        );
        Ok(())
    }

    async fn delete_by_name(&self, client_number: &str, contact_name: &str) -> Result<()> {
        let suppressed = self.suppressed();
        let mut state = self.state();
        state
            .contacts
            .retain(|c| !(c.client_number == client_number && c.contact_name == contact_name));
        Self::trigger_audit(
            &mut state,
            suppressed,
            client_number,
            "CONT",
            None,
            TRIGGER_ACTOR_PLACEHOLDER,
        );
        Ok(())
    }
}

#[async_trait]
impl AliasRepository for MemoryStore {
    async fn find(&self, client_number: &str) -> Result<Option<DoingBusinessAs>> {
        Ok(self
            .state()
            .aliases
            .iter()
            .find(|a| a.client_number == client_number)
            .cloned())
    }

    async fn update(&self, alias: &DoingBusinessAs) -> Result<()> {
        let mut state = self.state();
        let Some(row) = state
            .aliases
            .iter_mut()
            .find(|a| a.client_number == alias.client_number)
        else {
            bail!("alias for {} not found", alias.client_number);
        };
        *row = alias.clone();
        Ok(())
    }

    async fn insert_if_absent(&self, alias: &DoingBusinessAs) -> Result<bool> {
        let mut state = self.state();
        let exists = state.aliases.iter().any(|a| {
            a.client_number == alias.client_number
                && a.doing_business_as_name == alias.doing_business_as_name
        });
        if exists {
            return Ok(false);
        }
        state.aliases.push(alias.clone());
        Ok(true)
    }
}

#[async_trait]
impl RelationshipRepository for MemoryStore {
    async fn list(
        &self,
        client_number: &str,
        locn_code: &str,
    ) -> Result<Vec<RelatedClientRelationship>> {
        let mut rows: Vec<RelatedClientRelationship> = self
            .state()
            .relationships
            .iter()
            .filter(|r| r.client_number == client_number && r.client_locn_code == locn_code)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.related_client_number, &a.related_client_locn_code)
                .cmp(&(&b.related_client_number, &b.related_client_locn_code))
        });
        Ok(rows)
    }

    async fn exists(&self, rel: &RelatedClientRelationship) -> Result<bool> {
        Ok(self
            .state()
            .relationships
            .iter()
            .any(|r| r.tuple() == rel.tuple()))
    }

    async fn insert(&self, rel: &RelatedClientRelationship) -> Result<()> {
        self.state().relationships.push(rel.clone());
        Ok(())
    }

    async fn update(
        &self,
        old: &RelatedClientRelationship,
        new: &RelatedClientRelationship,
    ) -> Result<()> {
        let mut state = self.state();
        let Some(row) = state
            .relationships
            .iter_mut()
            .find(|r| r.tuple() == old.tuple())
        else {
            bail!("relationship not found");
        };
        *row = new.clone();
        Ok(())
    }

    async fn delete(&self, rel: &RelatedClientRelationship) -> Result<()> {
        let suppressed = self.suppressed();
        let mut state = self.state();
        state.relationships.retain(|r| r.tuple() != rel.tuple());
        Self::trigger_audit(
            &mut state,
            suppressed,
            &rel.client_number,
            "REL",
            Some(&rel.client_locn_code),
            TRIGGER_ACTOR_PLACEHOLDER,
        );
        Ok(())
    }
}

#[async_trait]
impl ReasonAuditRepository for MemoryStore {
    async fn find_undefined(
        &self,
        client_number: &str,
        action_filter: Option<&str>,
    ) -> Result<Option<ReasonAuditRecord>> {
        Ok(self
            .state()
            .audits
            .iter()
            .filter(|a| {
                a.client_number == client_number
                    && a.reason_code == UNDEFINED_REASON
                    && action_filter.map_or(true, |f| a.action_code == f)
            })
            .min_by_key(|a| (a.updated_at, a.audit_id))
            .cloned())
    }

    async fn update_reason(&self, audit_id: i64, reason_code: &str, actor: &str) -> Result<()> {
        let mut state = self.state();
        let Some(row) = state.audits.iter_mut().find(|a| a.audit_id == audit_id) else {
            bail!("audit row {audit_id} not found");
        };
        row.reason_code = reason_code.to_string();
        row.updated_by = actor.to_string();
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_location_reason(
        &self,
        client_number: &str,
        locn_code: &str,
        reason_code: &str,
        actor: &str,
    ) -> Result<u64> {
        let mut state = self.state();
        let mut updated = 0;
        for row in state.audits.iter_mut().filter(|a| {
            a.client_number == client_number
                && a.client_locn_code.as_deref() == Some(locn_code)
                && a.reason_code == UNDEFINED_REASON
        }) {
            row.reason_code = reason_code.to_string();
            row.updated_by = actor.to_string();
            updated += 1;
        }
        Ok(updated)
    }

    async fn rewrite_delete_actor(&self, client_number: &str, actor: &str) -> Result<()> {
        let mut state = self.state();
        for row in state.audits.iter_mut().filter(|a| {
            a.client_number == client_number && a.updated_by == TRIGGER_ACTOR_PLACEHOLDER
        }) {
            row.updated_by = actor.to_string();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn client_fixture(client_number: &str) -> ClientRecord {
    let seeded = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    ClientRecord {
        client_number: client_number.to_string(),
        client_name: "EVERGREEN TIMBER LTD".to_string(),
        legal_first_name: None,
        legal_middle_name: None,
        client_type_code: "C".to_string(),
        client_status_code: "ACT".to_string(),
        client_id_type_code: None,
        client_identification: None,
        registry_company_type_code: Some("BC".to_string()),
        corp_regn_nmbr: Some("0712345".to_string()),
        client_acronym: None,
        wcb_firm_number: None,
        birthdate: None,
        client_comment: None,
        revision: 1,
        created_by: "intake".to_string(),
        created_at: seeded,
        updated_by: "intake".to_string(),
        updated_at: seeded,
    }
}

pub fn location_fixture(client_number: &str, locn_code: &str) -> ClientLocation {
    let seeded = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    ClientLocation {
        client_number: client_number.to_string(),
        client_locn_code: locn_code.to_string(),
        client_locn_name: Some("HEAD OFFICE".to_string()),
        address_one: Some("1234 FOREST RD".to_string()),
        address_two: None,
        city: Some("VICTORIA".to_string()),
        province: Some("BC".to_string()),
        postal_code: Some("V8V1V1".to_string()),
        business_phone: Some("2505551234".to_string()),
        cell_phone: None,
        home_phone: None,
        fax_number: None,
        email_address: Some("office@evergreen.example".to_string()),
        cli_locn_comment: None,
        expired_ind: false,
        revision: 1,
        created_by: "intake".to_string(),
        created_at: seeded,
        updated_by: "intake".to_string(),
        updated_at: seeded,
    }
}

pub fn contact_fixture(client_number: &str, locn_code: &str, name: &str) -> ClientContact {
    let seeded = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    ClientContact {
        contact_id: 0, // assigned by seed_contact
        client_number: client_number.to_string(),
        client_locn_code: locn_code.to_string(),
        contact_type_code: "BL".to_string(),
        contact_name: name.to_string(),
        business_phone: Some("2505559876".to_string()),
        secondary_phone: None,
        fax_number: None,
        email_address: Some("contact@evergreen.example".to_string()),
        revision: 1,
        created_by: "intake".to_string(),
        created_at: seeded,
        updated_by: "intake".to_string(),
        updated_at: seeded,
    }
}

pub fn relationship_fixture(
    client_number: &str,
    locn_code: &str,
    related: &str,
) -> RelatedClientRelationship {
    let seeded = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    RelatedClientRelationship {
        client_number: client_number.to_string(),
        client_locn_code: locn_code.to_string(),
        related_client_number: related.to_string(),
        related_client_locn_code: "00".to_string(),
        relationship_code: "SH".to_string(),
        percentage_ownership: None,
        signing_auth_ind: Some(false),
        revision: 1,
        created_by: "intake".to_string(),
        created_at: seeded,
        updated_by: "intake".to_string(),
        updated_at: seeded,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("client_registry_patch=debug")
        .with_test_writer()
        .try_init();
}
