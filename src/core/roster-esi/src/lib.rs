//! # Roster ESI
//!
//! Client for the EVE Swagger Interface endpoints the synchronizer needs:
//!
//! - `GET /characters/{id}/` - public character document (affiliation)
//! - `GET /characters/{id}/roles/` - corporation roles (authenticated)
//! - `GET /characters/{id}/titles/` - corporation titles (authenticated)
//!
//! Malformed bodies degrade to empty results; transport failures are errors.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
mod parse;

pub use client::{EsiClient, EsiConfig};
pub use error::EsiError;
