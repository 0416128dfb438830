//! Counters and usage reporting.

use crate::ObjectStore;

/// Dispatch statistics for one isolate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub messages_handled: u64,
    pub oob_messages_handled: u64,
    pub messages_dropped: u64,
    pub interrupts_delivered: u64,
    pub failures_escalated: u64,
    pub failures_recovered: u64,
    /// Reports logged because of `report_counters_every`.
    pub periodic_reports: u64,
}

impl Counters {
    pub fn report(&self, name: &str) {
        log::info!(
            "{name}: {} messages ({} oob, {} dropped), {} interrupts, {} failures ({} recovered)",
            self.messages_handled,
            self.oob_messages_handled,
            self.messages_dropped,
            self.interrupts_delivered,
            self.failures_escalated,
            self.failures_recovered,
        );
    }

    /// Report when `messages_handled` is a multiple of `every`. Zero never
    /// reports.
    pub fn report_periodically(&self, name: &str, every: u64) -> bool {
        if every == 0 || self.messages_handled % every != 0 {
            return false;
        }
        self.report(name);
        true
    }
}

/// Every function invoked at least once as `(count, "library::function")`,
/// busiest first. Ties keep library then definition order.
pub fn invoked_functions(store: &ObjectStore) -> Vec<(u64, String)> {
    let mut invoked: Vec<_> = store
        .libraries()
        .iter()
        .flat_map(|lib| {
            lib.functions()
                .iter()
                .filter(|f| f.usage_count() > 0)
                .map(move |f| (f.usage_count(), format!("{}::{}", lib.url(), f.name())))
        })
        .collect();
    invoked.sort_by(|a, b| b.0.cmp(&a.0));
    invoked
}

pub fn print_invoked_functions(name: &str, store: &ObjectStore) {
    log::info!("{name}: invoked functions");
    for (count, function) in invoked_functions(store) {
        log::info!("{count:>10} x {function}");
    }
}
