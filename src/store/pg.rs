//! sqlx implementations of the repository traits over the legacy schema.
//!
//! Every write commits independently; the engine deliberately has no
//! cross-table transaction. Reason audit rows are only ever updated here;
//! their creation belongs to the database triggers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    ClientContact, ClientLocation, ClientRecord, DoingBusinessAs, ReasonAuditRecord,
    RelatedClientRelationship, TRIGGER_ACTOR_PLACEHOLDER, UNDEFINED_REASON,
};
use crate::store::{
    AliasRepository, ClientRepository, ContactRepository, LocationRepository,
    ReasonAuditRepository, RelationshipRepository,
};

const CLIENT_COLUMNS: &str = "client_number, client_name, legal_first_name, legal_middle_name, \
     client_type_code, client_status_code, client_id_type_code, client_identification, \
     registry_company_type_code, corp_regn_nmbr, client_acronym, wcb_firm_number, birthdate, \
     client_comment, revision, created_by, created_at, updated_by, updated_at";

const LOCATION_COLUMNS: &str = "client_number, client_locn_code, client_locn_name, address_one, \
     address_two, city, province, postal_code, business_phone, cell_phone, home_phone, \
     fax_number, email_address, cli_locn_comment, expired_ind, revision, created_by, created_at, \
     updated_by, updated_at";

const CONTACT_COLUMNS: &str = "contact_id, client_number, client_locn_code, contact_type_code, \
     contact_name, business_phone, secondary_phone, fax_number, email_address, revision, \
     created_by, created_at, updated_by, updated_at";

const RELATIONSHIP_COLUMNS: &str = "client_number, client_locn_code, related_client_number, \
     related_client_locn_code, relationship_code, percentage_ownership, signing_auth_ind, \
     revision, created_by, created_at, updated_by, updated_at";

pub struct PgClientRepository {
    pool: PgPool,
}

impl PgClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn find(&self, client_number: &str) -> Result<Option<ClientRecord>> {
        sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM registry.client WHERE client_number = $1"
        ))
        .bind(client_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch client record")
    }

    async fn update(&self, record: &ClientRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE registry.client
            SET client_name = $2,
                legal_first_name = $3,
                legal_middle_name = $4,
                client_type_code = $5,
                client_status_code = $6,
                client_id_type_code = $7,
                client_identification = $8,
                registry_company_type_code = $9,
                corp_regn_nmbr = $10,
                client_acronym = $11,
                wcb_firm_number = $12,
                birthdate = $13,
                client_comment = $14,
                revision = $15,
                updated_by = $16,
                updated_at = $17
            WHERE client_number = $1
            "#,
        )
        .bind(&record.client_number)
        .bind(&record.client_name)
        .bind(&record.legal_first_name)
        .bind(&record.legal_middle_name)
        .bind(&record.client_type_code)
        .bind(&record.client_status_code)
        .bind(&record.client_id_type_code)
        .bind(&record.client_identification)
        .bind(&record.registry_company_type_code)
        .bind(&record.corp_regn_nmbr)
        .bind(&record.client_acronym)
        .bind(&record.wcb_firm_number)
        .bind(record.birthdate)
        .bind(&record.client_comment)
        .bind(record.revision)
        .bind(&record.updated_by)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update client record")?;
        Ok(())
    }
}

pub struct PgLocationRepository {
    pool: PgPool,
}

impl PgLocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationRepository for PgLocationRepository {
    async fn find(&self, client_number: &str, locn_code: &str) -> Result<Option<ClientLocation>> {
        sqlx::query_as::<_, ClientLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM registry.client_location \
             WHERE client_number = $1 AND client_locn_code = $2"
        ))
        .bind(client_number)
        .bind(locn_code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch client location")
    }

    async fn update_fields(
        &self,
        client_number: &str,
        locn_code: &str,
        changes: &[(String, Option<String>)],
        actor: &str,
    ) -> Result<()> {
        // Column names come from the handler's static field map, never from
        // patch input.
        let mut builder = sqlx::QueryBuilder::new(
            "UPDATE registry.client_location SET revision = revision + 1, updated_by = ",
        );
        builder.push_bind(actor);
        builder.push(", updated_at = NOW()");
        for (column, value) in changes {
            builder.push(format!(", {column} = "));
            builder.push_bind(value.clone());
        }
        builder.push(" WHERE client_number = ");
        builder.push_bind(client_number);
        builder.push(" AND client_locn_code = ");
        builder.push_bind(locn_code);

        builder
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to patch client location")?;
        Ok(())
    }
}

pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn find_by_id(
        &self,
        client_number: &str,
        contact_id: i64,
    ) -> Result<Option<ClientContact>> {
        sqlx::query_as::<_, ClientContact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM registry.client_contact \
             WHERE client_number = $1 AND contact_id = $2"
        ))
        .bind(client_number)
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch contact by id")
    }

    async fn find_by_name(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<ClientContact>> {
        sqlx::query_as::<_, ClientContact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM registry.client_contact \
             WHERE client_number = $1 AND contact_name = $2 \
             ORDER BY client_locn_code"
        ))
        .bind(client_number)
        .bind(contact_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch contact sibling rows")
    }

    async fn location_codes(
        &self,
        client_number: &str,
        contact_name: &str,
    ) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT client_locn_code FROM registry.client_contact \
             WHERE client_number = $1 AND contact_name = $2 \
             ORDER BY client_locn_code",
        )
        .bind(client_number)
        .bind(contact_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch contact location codes")
    }

    async fn exists(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM registry.client_contact \
             WHERE client_number = $1 AND contact_name = $2 AND client_locn_code = $3)",
        )
        .bind(client_number)
        .bind(contact_name)
        .bind(locn_code)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check contact association existence")
    }

    async fn next_contact_id(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT nextval('registry.client_contact_seq')")
            .fetch_one(&self.pool)
            .await
            .context("Failed to allocate contact id")
    }

    async fn insert(&self, contact: &ClientContact) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO registry.client_contact ({CONTACT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(contact.contact_id)
        .bind(&contact.client_number)
        .bind(&contact.client_locn_code)
        .bind(&contact.contact_type_code)
        .bind(&contact.contact_name)
        .bind(&contact.business_phone)
        .bind(&contact.secondary_phone)
        .bind(&contact.fax_number)
        .bind(&contact.email_address)
        .bind(contact.revision)
        .bind(&contact.created_by)
        .bind(contact.created_at)
        .bind(&contact.updated_by)
        .bind(contact.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert contact row")?;
        Ok(())
    }

    async fn update(&self, contact: &ClientContact) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE registry.client_contact
            SET client_locn_code = $2,
                contact_type_code = $3,
                contact_name = $4,
                business_phone = $5,
                secondary_phone = $6,
                fax_number = $7,
                email_address = $8,
                revision = $9,
                updated_by = $10,
                updated_at = $11
            WHERE contact_id = $1
            "#,
        )
        .bind(contact.contact_id)
        .bind(&contact.client_locn_code)
        .bind(&contact.contact_type_code)
        .bind(&contact.contact_name)
        .bind(&contact.business_phone)
        .bind(&contact.secondary_phone)
        .bind(&contact.fax_number)
        .bind(&contact.email_address)
        .bind(contact.revision)
        .bind(&contact.updated_by)
        .bind(contact.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update contact row")?;
        Ok(())
    }

    async fn delete(
        &self,
        client_number: &str,
        contact_name: &str,
        locn_code: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM registry.client_contact \
             WHERE client_number = $1 AND contact_name = $2 AND client_locn_code = $3",
        )
        .bind(client_number)
        .bind(contact_name)
        .bind(locn_code)
        .execute(&self.pool)
        .await
        .context("Failed to delete contact association")?;
        Ok(())
    }

    async fn delete_by_name(&self, client_number: &str, contact_name: &str) -> Result<()> {
        sqlx::query(
            "DELETE FROM registry.client_contact \
             WHERE client_number = $1 AND contact_name = $2",
        )
        .bind(client_number)
        .bind(contact_name)
        .execute(&self.pool)
        .await
        .context("Failed to delete contact rows")?;
        Ok(())
    }
}

pub struct PgAliasRepository {
    pool: PgPool,
}

impl PgAliasRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AliasRepository for PgAliasRepository {
    async fn find(&self, client_number: &str) -> Result<Option<DoingBusinessAs>> {
        sqlx::query_as::<_, DoingBusinessAs>(
            "SELECT client_number, doing_business_as_name, revision, created_by, created_at, \
             updated_by, updated_at \
             FROM registry.client_doing_business_as WHERE client_number = $1",
        )
        .bind(client_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch doing-business-as row")
    }

    async fn update(&self, alias: &DoingBusinessAs) -> Result<()> {
        sqlx::query(
            "UPDATE registry.client_doing_business_as \
             SET doing_business_as_name = $2, revision = $3, updated_by = $4, updated_at = $5 \
             WHERE client_number = $1",
        )
        .bind(&alias.client_number)
        .bind(&alias.doing_business_as_name)
        .bind(alias.revision)
        .bind(&alias.updated_by)
        .bind(alias.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update doing-business-as row")?;
        Ok(())
    }

    async fn insert_if_absent(&self, alias: &DoingBusinessAs) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO registry.client_doing_business_as
                (client_number, doing_business_as_name, revision, created_by, created_at,
                 updated_by, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (
                SELECT 1 FROM registry.client_doing_business_as
                WHERE client_number = $1 AND doing_business_as_name = $2
            )
            "#,
        )
        .bind(&alias.client_number)
        .bind(&alias.doing_business_as_name)
        .bind(alias.revision)
        .bind(&alias.created_by)
        .bind(alias.created_at)
        .bind(&alias.updated_by)
        .bind(alias.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert doing-business-as row")?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct PgRelationshipRepository {
    pool: PgPool,
}

impl PgRelationshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipRepository for PgRelationshipRepository {
    async fn list(
        &self,
        client_number: &str,
        locn_code: &str,
    ) -> Result<Vec<RelatedClientRelationship>> {
        sqlx::query_as::<_, RelatedClientRelationship>(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM registry.related_client \
             WHERE client_number = $1 AND client_locn_code = $2 \
             ORDER BY related_client_number, related_client_locn_code"
        ))
        .bind(client_number)
        .bind(locn_code)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list related-client relationships")
    }

    async fn exists(&self, rel: &RelatedClientRelationship) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM registry.related_client \
             WHERE client_number = $1 AND client_locn_code = $2 \
               AND related_client_number = $3 AND related_client_locn_code = $4 \
               AND relationship_code = $5)",
        )
        .bind(&rel.client_number)
        .bind(&rel.client_locn_code)
        .bind(&rel.related_client_number)
        .bind(&rel.related_client_locn_code)
        .bind(&rel.relationship_code)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check relationship existence")
    }

    async fn insert(&self, rel: &RelatedClientRelationship) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO registry.related_client ({RELATIONSHIP_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(&rel.client_number)
        .bind(&rel.client_locn_code)
        .bind(&rel.related_client_number)
        .bind(&rel.related_client_locn_code)
        .bind(&rel.relationship_code)
        .bind(rel.percentage_ownership)
        .bind(rel.signing_auth_ind)
        .bind(rel.revision)
        .bind(&rel.created_by)
        .bind(rel.created_at)
        .bind(&rel.updated_by)
        .bind(rel.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert relationship")?;
        Ok(())
    }

    async fn update(
        &self,
        old: &RelatedClientRelationship,
        new: &RelatedClientRelationship,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE registry.related_client
            SET related_client_number = $6,
                related_client_locn_code = $7,
                relationship_code = $8,
                percentage_ownership = $9,
                signing_auth_ind = $10,
                revision = $11,
                updated_by = $12,
                updated_at = $13
            WHERE client_number = $1 AND client_locn_code = $2
              AND related_client_number = $3 AND related_client_locn_code = $4
              AND relationship_code = $5
            "#,
        )
        .bind(&old.client_number)
        .bind(&old.client_locn_code)
        .bind(&old.related_client_number)
        .bind(&old.related_client_locn_code)
        .bind(&old.relationship_code)
        .bind(&new.related_client_number)
        .bind(&new.related_client_locn_code)
        .bind(&new.relationship_code)
        .bind(new.percentage_ownership)
        .bind(new.signing_auth_ind)
        .bind(new.revision)
        .bind(&new.updated_by)
        .bind(new.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update relationship")?;
        Ok(())
    }

    async fn delete(&self, rel: &RelatedClientRelationship) -> Result<()> {
        sqlx::query(
            "DELETE FROM registry.related_client \
             WHERE client_number = $1 AND client_locn_code = $2 \
               AND related_client_number = $3 AND related_client_locn_code = $4 \
               AND relationship_code = $5",
        )
        .bind(&rel.client_number)
        .bind(&rel.client_locn_code)
        .bind(&rel.related_client_number)
        .bind(&rel.related_client_locn_code)
        .bind(&rel.relationship_code)
        .execute(&self.pool)
        .await
        .context("Failed to delete relationship")?;
        Ok(())
    }
}

pub struct PgReasonAuditRepository {
    pool: PgPool,
}

impl PgReasonAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReasonAuditRepository for PgReasonAuditRepository {
    async fn find_undefined(
        &self,
        client_number: &str,
        action_filter: Option<&str>,
    ) -> Result<Option<ReasonAuditRecord>> {
        sqlx::query_as::<_, ReasonAuditRecord>(
            r#"
            SELECT audit_id, client_number, action_code, client_locn_code, reason_code,
                   updated_by, updated_at
            FROM registry.client_update_reason_audit
            WHERE client_number = $1
              AND reason_code = $2
              AND ($3::text IS NULL OR action_code = $3)
            ORDER BY updated_at
            LIMIT 1
            "#,
        )
        .bind(client_number)
        .bind(UNDEFINED_REASON)
        .bind(action_filter)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up undefined reason audit row")
    }

    async fn update_reason(&self, audit_id: i64, reason_code: &str, actor: &str) -> Result<()> {
        sqlx::query(
            "UPDATE registry.client_update_reason_audit \
             SET reason_code = $2, updated_by = $3, updated_at = NOW() \
             WHERE audit_id = $1",
        )
        .bind(audit_id)
        .bind(reason_code)
        .bind(actor)
        .execute(&self.pool)
        .await
        .context("Failed to update reason audit row")?;
        Ok(())
    }

    async fn update_location_reason(
        &self,
        client_number: &str,
        locn_code: &str,
        reason_code: &str,
        actor: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE registry.client_update_reason_audit \
             SET reason_code = $3, updated_by = $4, updated_at = NOW() \
             WHERE client_number = $1 AND client_locn_code = $2 AND reason_code = $5",
        )
        .bind(client_number)
        .bind(locn_code)
        .bind(reason_code)
        .bind(actor)
        .bind(UNDEFINED_REASON)
        .execute(&self.pool)
        .await
        .context("Failed to update location reason audit row")?;
        Ok(result.rows_affected())
    }

    async fn rewrite_delete_actor(&self, client_number: &str, actor: &str) -> Result<()> {
        sqlx::query(
            "UPDATE registry.client_update_reason_audit \
             SET updated_by = $2 \
             WHERE client_number = $1 AND updated_by = $3",
        )
        .bind(client_number)
        .bind(actor)
        .bind(TRIGGER_ACTOR_PLACEHOLDER)
        .execute(&self.pool)
        .await
        .context("Failed to rewrite delete-trigger actor")?;
        Ok(())
    }
}
