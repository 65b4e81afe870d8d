//! # IdeaVault Testkit
//!
//! Testing utilities for IdeaVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a vault with four registered users, over memory or SQLite
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,no_run
//! use ideavault_testkit::fixtures::VaultFixture;
//! use ideavault::perms::{CollaboratorRequest, Grant};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let fx = VaultFixture::new().await?;
//!     let shared = [CollaboratorRequest::new(&fx.bob.email, [Grant::view()])];
//!     let receipt = fx.upload(&fx.alice, b"hello", &shared).await?;
//!
//!     let outcome = fx.vault.view_document(&fx.bob.subject, receipt.idea_id).await?;
//!     assert!(outcome.can_view);
//!     Ok(())
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ideavault_testkit::generators::{grants, payload};
//!
//! proptest! {
//!     #[test]
//!     fn only_view_grants_carry_keys(grants in grants()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{TestUser, VaultFixture, MASTER_SECRET, PASSWORD};
