//! # Roster Sync
//!
//! Keeps a user's host groups in line with what EVE Online says about the
//! character on every login.
//!
//! ## Pipeline
//!
//! 1. [`entitlement::fetch_snapshot`] fetches affiliation, roles and titles
//!    concurrently and normalizes the labels ([`normalize`]).
//! 2. [`membership::evaluate`] decides corporation/alliance membership.
//! 3. [`reconcile::reconcile`] computes the add/remove plan, applying the
//!    keyword blacklist to removals.
//! 4. [`mutate::GroupMutator`] applies the plan concurrently, isolating
//!    failures per operation.
//!
//! [`GroupSynchronizer`] wires the steps together for one authentication
//! event.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod membership;
pub mod mutate;
pub mod normalize;
pub mod reconcile;
pub mod synchronizer;

pub use catalog::GroupCatalog;
pub use config::SyncConfig;
pub use entitlement::{AffiliationFacts, EntitlementSnapshot, EntitlementSource};
pub use error::SyncError;
pub use membership::Membership;
pub use mutate::{GroupMutator, MutationFailure, MutationOperation, MutationReport, MutationStatus};
pub use normalize::normalize_label;
pub use reconcile::{reconcile, ReconcileInput, ReconciliationPlan};
pub use synchronizer::{GroupSynchronizer, SyncOutcome, SyncReport};
