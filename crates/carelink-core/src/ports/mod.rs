//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces the request pipeline depends on but whose
//! implementations are supplied by the host application.
//!
//! ## Ports Overview
//!
//! - [`IIdentityProvider`] - Silent and interactive credential acquisition
//! - [`ICsrfTokenSource`] - Where the current anti-forgery token is read from

pub mod csrf;
pub mod identity_provider;

pub use csrf::{CsrfStore, ICsrfTokenSource, StaticCsrfToken};
pub use identity_provider::{IIdentityProvider, IdentityError};
