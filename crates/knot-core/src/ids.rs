// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random identifier generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use uuid::Uuid;

use crate::traits::IdGenerator;

/// Length of share-link codes.
pub const SHORT_CODE_LEN: usize = 8;

/// Default [`IdGenerator`]: uuid v4 for ids, base62 for short codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", Uuid::new_v4().simple())
    }

    fn short_code(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_CODE_LEN)
            .map(char::from)
            .collect()
    }
}
