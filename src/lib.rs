//! MEWAYZ Platform API Library
//!
//! Multi-tenant REST backend: a uniform CRUD surface over workspace-scoped
//! JSON documents, with JWT auth, encrypted secrets and a few
//! resource-specific operations.
//!
//! # Modules
//!
//! - `auth`: JWT issuing/verification and the `AuthUser` extractor.
//! - `config`: Configuration management.
//! - `crypto`: AES-256-GCM field cipher and fingerprints.
//! - `db`: PostgreSQL pool setup and store selection.
//! - `errors`: Error handling types.
//! - `handlers`: Application state and the generic CRUD handlers.
//! - `integration_probe`: Outbound connection tests for integrations.
//! - `memory_store`: In-memory document store.
//! - `models`: Resource documents.
//! - `notification_handler`: Recipient notification endpoints.
//! - `pg_store`: PostgreSQL JSONB document store.
//! - `platform_handler`: White-label resolution, secrets, integration tests.
//! - `query`: List query parsing (filters, sort, paging).
//! - `resource`: The `Resource` trait.
//! - `response`: Response envelopes.
//! - `routes`: Router assembly.
//! - `store`: The `DocumentStore` trait.
//! - `validation`: Field validators.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod integration_probe;
pub mod memory_store;
pub mod models;
pub mod notification_handler;
pub mod pg_store;
pub mod platform_handler;
pub mod query;
pub mod resource;
pub mod response;
pub mod routes;
pub mod store;
pub mod validation;
