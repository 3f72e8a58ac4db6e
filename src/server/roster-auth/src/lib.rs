//! # Roster Auth
//!
//! Turns an access token freshly issued by EVE SSO into the [`Identity`]
//! the synchronizer works with.
//!
//! The OAuth2 authorization-code exchange itself happens upstream; this
//! crate only reads the token it produced.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod context;
pub mod error;
pub mod eve_sso;

pub use backend::AuthBackend;
pub use context::Identity;
pub use error::AuthError;
pub use eve_sso::EveSsoBackend;
