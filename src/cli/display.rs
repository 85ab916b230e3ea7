use chrono::{TimeZone, Utc};
use prettytable::{cell, row, Row};

use bgp_reconciler::api::{ReplaySummary, StaleRoute, UpdateEntry};

use super::table::ToRow;

pub const EMPTY_VALUE: &str = "";

pub fn maybe_string<T: ToString>(item: Option<&T>) -> String {
    item.map(|i| i.to_string())
        .unwrap_or_else(|| String::from(EMPTY_VALUE))
}

fn format_timestamp(timestamp: i64) -> String {
    Utc.timestamp(timestamp, 0)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub struct ReplaySummaryRow(pub ReplaySummary);

impl ToRow for ReplaySummaryRow {
    fn columns() -> Row {
        row!["Started", "Duration", "State", "Succeeded", "Stale", "Cleared"]
    }

    fn to_row(&self) -> Row {
        let replay = &self.0;
        row![
            format_timestamp(replay.started),
            replay.duration,
            replay.state,
            if replay.succeeded { "yes" } else { "no" },
            replay.stale_count,
            maybe_string(replay.cleared_count.as_ref()),
        ]
    }
}

pub struct UpdateEntryRow(pub UpdateEntry);

impl ToRow for UpdateEntryRow {
    fn columns() -> Row {
        row!["Age", "Action", "Protocol", "Prefix", "Next Hop", "Label", "MAC"]
    }

    fn to_row(&self) -> Row {
        let update = &self.0;
        row![
            update.age,
            update.action,
            update.protocol,
            update.prefix,
            maybe_string(update.next_hop.as_ref()),
            update.label,
            maybe_string(update.mac.as_ref()),
        ]
    }
}

pub struct StaleRouteRow(pub StaleRoute);

impl ToRow for StaleRouteRow {
    fn columns() -> Row {
        row!["Prefix", "Next Hop", "Label"]
    }

    fn to_row(&self) -> Row {
        let route = &self.0;
        row![route.prefix, route.next_hop, route.label]
    }
}
