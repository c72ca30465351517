//! Patch handlers, one module per sub-entity concern.

pub mod client_fields;
pub mod client_status;
pub mod contacts;
pub mod doing_business_as;
pub mod location_reasons;
pub mod locations;
pub mod related_clients;
