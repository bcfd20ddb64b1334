//! Carelink Core - Configuration, domain types and ports
//!
//! This crate holds everything the HTTP layer needs that is not HTTP:
//! - **Configuration** - `ClientConfig` loading/validation and the base URL validator
//! - **Domain types** - `Credential`, `Account`, the `ApiError` taxonomy, `ConfigError`
//! - **Port definitions** - `IIdentityProvider`, `ICsrfTokenSource`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The `carelink-http` adapter crate implements the request pipeline on top
//! of these types; the identity provider is supplied by the host.

pub mod config;
pub mod domain;
pub mod ports;
