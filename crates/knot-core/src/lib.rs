// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Knot social backend.
//!
//! This crate provides the error taxonomy, the domain types passed between
//! storage, services, and the gateway, and the collaborator traits (password
//! hashing, tokens, id generation) that services consume.

pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KnotError;
pub use ids::RandomIdGenerator;
pub use traits::{IdGenerator, PasswordHasher, TokenAuthority};
pub use types::{
    Comment, HealthStatus, InteractionKind, InteractionResult, Page, PageRequest, Post, PostId,
    Share, ShareLink, User, UserId, UserStats, UsernameCheck, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _hasher(_: &dyn PasswordHasher) {}
        fn _tokens(_: &dyn TokenAuthority) {}
        fn _ids(_: &dyn IdGenerator) {}
    }

    #[test]
    fn random_id_generator_is_usable_as_trait_object() {
        let generator: Box<dyn IdGenerator> = Box::new(RandomIdGenerator);
        assert!(generator.next_id("shr").starts_with("shr_"));
    }
}
