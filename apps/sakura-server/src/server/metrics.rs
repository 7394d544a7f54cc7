use std::{collections::HashMap, fmt::Write as _};

use super::core::{MetricsState, METRICS_STATE};

pub(crate) fn metrics_state() -> &'static MetricsState {
    METRICS_STATE.get_or_init(MetricsState::default)
}

pub(crate) fn render_metrics() -> String {
    let auth_failures = metrics_state()
        .auth_failures
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());
    let directory_lookups = metrics_state()
        .directory_lookups
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());

    let mut output = String::new();
    output.push_str("# HELP sakura_auth_failures_total Count of auth-related failures by reason\n");
    output.push_str("# TYPE sakura_auth_failures_total counter\n");
    let mut auth_entries: Vec<_> = auth_failures.into_iter().collect();
    auth_entries.sort_by_key(|(reason, _)| *reason);
    for (reason, value) in auth_entries {
        let _ = writeln!(
            output,
            "sakura_auth_failures_total{{reason=\"{reason}\"}} {value}"
        );
    }

    output.push_str(
        "# HELP sakura_directory_lookups_total Count of guild directory lookups by outcome\n",
    );
    output.push_str("# TYPE sakura_directory_lookups_total counter\n");
    let mut lookup_entries: Vec<_> = directory_lookups.into_iter().collect();
    lookup_entries.sort_by_key(|(outcome, _)| *outcome);
    for (outcome, value) in lookup_entries {
        let _ = writeln!(
            output,
            "sakura_directory_lookups_total{{outcome=\"{outcome}\"}} {value}"
        );
    }

    output
}

pub(crate) fn record_auth_failure(reason: &'static str) {
    if let Ok(mut counters) = metrics_state().auth_failures.lock() {
        let entry = counters.entry(reason).or_insert(0);
        *entry += 1;
    }
}

pub(crate) fn record_directory_lookup(outcome: &'static str) {
    if let Ok(mut counters) = metrics_state().directory_lookups.lock() {
        let entry = counters.entry(outcome).or_insert(0);
        *entry += 1;
    }
}
