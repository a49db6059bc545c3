// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder can collect these.

use metrics::describe_counter;

/// Register metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!("relaydesk_relayed_total", "Messages copied into user threads");
    describe_counter!(
        "relaydesk_blocked_total",
        "Users blocked by keyword moderation"
    );
    describe_counter!("relaydesk_threads_created_total", "User threads created");
    describe_counter!("relaydesk_alerts_total", "Unread-message alerts posted");
}

pub(crate) fn record_relayed() {
    metrics::counter!("relaydesk_relayed_total").increment(1);
}

pub(crate) fn record_blocked() {
    metrics::counter!("relaydesk_blocked_total").increment(1);
}

pub(crate) fn record_thread_created() {
    metrics::counter!("relaydesk_threads_created_total").increment(1);
}

pub(crate) fn record_alert() {
    metrics::counter!("relaydesk_alerts_total").increment(1);
}
