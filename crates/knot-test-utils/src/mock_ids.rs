// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic [`IdGenerator`] for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use knot_core::IdGenerator;

/// Hands out `prefix_1`, `prefix_2`, ... and link codes from a script.
///
/// Once the script runs dry, codes fall back to `code0001`, `code0002`, ...
#[derive(Debug, Default)]
pub struct ScriptedIds {
    next: AtomicU64,
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues link codes to return, in order.
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            next: AtomicU64::new(0),
            codes: Mutex::new(codes.into_iter().map(Into::into).collect()),
        }
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdGenerator for ScriptedIds {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.bump())
    }

    fn short_code(&self) -> String {
        let scripted = self
            .codes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| format!("code{:04}", self.bump()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let ids = ScriptedIds::new();
        assert_eq!(ids.next_id("cmt"), "cmt_1");
        assert_eq!(ids.next_id("shr"), "shr_2");
    }

    #[test]
    fn scripted_codes_come_first() {
        let ids = ScriptedIds::with_codes(["aaaa1111", "aaaa1111"]);
        assert_eq!(ids.short_code(), "aaaa1111");
        assert_eq!(ids.short_code(), "aaaa1111");
        assert_eq!(ids.short_code(), "code0001");
    }
}
