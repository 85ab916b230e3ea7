use crate::api::rpc::{StaleRoute, UpdateEntry};
use crate::reconcile::{StaleEntry, UpdateRecord};
use crate::utils::format_age;

pub fn record_to_entry(record: UpdateRecord) -> UpdateEntry {
    UpdateEntry {
        received_at: record.received.timestamp(),
        age: format_age(record.received),
        action: record.action.to_string(),
        protocol: record.protocol.to_string(),
        rd: record.rd,
        prefix: record.prefix,
        next_hop: record.next_hop,
        label: record.label,
        mac: record.mac,
    }
}

pub fn stale_to_route(entry: StaleEntry) -> StaleRoute {
    StaleRoute {
        rd: entry.rd,
        prefix: entry.path.prefix.to_string(),
        next_hop: entry.path.next_hop,
        label: entry.label,
    }
}
