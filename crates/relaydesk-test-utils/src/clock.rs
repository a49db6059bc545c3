// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manually advanced clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use relaydesk_core::Clock;

/// Starts at a fixed instant and moves only through [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

/// 2026-01-01T00:00:00Z
pub const DEFAULT_START_MILLIS: i64 = 1_767_225_600_000;

impl ManualClock {
    pub fn new() -> Self {
        Self::at_millis(DEFAULT_START_MILLIS)
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
