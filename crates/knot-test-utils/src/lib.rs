// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Knot integration tests.
//!
//! Provides a throwaway-database harness and deterministic collaborators so
//! service and gateway tests run fast without any external setup.
//!
//! # Components
//!
//! - [`TestHarness`] - migrated temp database, pool, services, and token authority
//! - [`ScriptedIds`] - id generator with predictable ids and scripted link codes

pub mod harness;
pub mod mock_ids;

pub use harness::{TestHarness, TestHarnessBuilder, TEST_PASSWORD, TEST_TOKEN_SECRET};
pub use mock_ids::ScriptedIds;
