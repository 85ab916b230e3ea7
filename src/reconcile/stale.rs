use std::collections::HashMap;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::models::{PrefixNextHop, RouteOrigin, RouteRecord};

/// How an inbound advertisement relates to the stale snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleMatch {
    /// No snapshot entry, this is a new route
    Absent,
    /// Same label as before the restart
    Unchanged,
    /// Label changed while the session was down
    Changed { previous: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleEntry {
    pub rd: String,
    pub path: PrefixNextHop,
    pub label: u32,
}

/// Routes known before a replay started, pending reconfirmation.
/// rd -> prefix/len:nextHop -> label. Empty in steady state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleRouteTable {
    vrfs: HashMap<String, HashMap<PrefixNextHop, u32>>,
}

impl StaleRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every BGP-originated route in a forwarding database snapshot
    pub fn from_routes(routes: &[RouteRecord]) -> Self {
        let mut table = Self::new();
        routes
            .iter()
            .filter(|r| r.origin == RouteOrigin::Bgp)
            .for_each(|r| table.insert(r.key.rd(), r.key.path(), r.label));
        table
    }

    pub fn insert(&mut self, rd: &str, path: PrefixNextHop, label: u32) {
        self.vrfs
            .entry(rd.to_owned())
            .or_insert_with(HashMap::new)
            .insert(path, label);
    }

    pub fn get(&self, rd: &str, path: &PrefixNextHop) -> Option<u32> {
        self.vrfs.get(rd).and_then(|paths| paths.get(path)).copied()
    }

    /// Match an advertisement, removing the entry when present
    pub fn reconcile(&mut self, rd: &str, path: &PrefixNextHop, label: u32) -> StaleMatch {
        match self.remove(rd, path) {
            None => StaleMatch::Absent,
            Some(previous) if previous == label => StaleMatch::Unchanged,
            Some(previous) => StaleMatch::Changed { previous },
        }
    }

    pub fn remove(&mut self, rd: &str, path: &PrefixNextHop) -> Option<u32> {
        let paths = self.vrfs.get_mut(rd)?;
        let label = paths.remove(path);
        if paths.is_empty() {
            self.vrfs.remove(rd);
        }
        label
    }

    /// Drop every path for `prefix`, returns how many were dropped
    pub fn remove_prefix(&mut self, rd: &str, prefix: &IpNetwork) -> usize {
        let paths = match self.vrfs.get_mut(rd) {
            Some(paths) => paths,
            None => return 0,
        };
        let before = paths.len();
        paths.retain(|path, _| path.prefix != *prefix);
        let removed = before - paths.len();
        if paths.is_empty() {
            self.vrfs.remove(rd);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.vrfs.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vrfs.is_empty()
    }

    pub fn clear(&mut self) {
        self.vrfs.clear();
    }

    /// Remove and return up to `limit` entries, in no particular order
    pub fn pop_batch(&mut self, limit: usize) -> Vec<StaleEntry> {
        let mut batch = Vec::with_capacity(limit.min(self.len()));
        while batch.len() < limit {
            let rd = match self.vrfs.keys().next() {
                Some(rd) => rd.clone(),
                None => break,
            };
            if let Some(paths) = self.vrfs.get_mut(&rd) {
                let picked: Vec<PrefixNextHop> =
                    paths.keys().take(limit - batch.len()).copied().collect();
                for path in picked {
                    if let Some(label) = paths.remove(&path) {
                        batch.push(StaleEntry {
                            rd: rd.clone(),
                            path,
                            label,
                        });
                    }
                }
                if paths.is_empty() {
                    self.vrfs.remove(&rd);
                }
            }
        }
        batch
    }

    /// Sorted by rd, then path
    pub fn entries(&self) -> Vec<StaleEntry> {
        let mut entries: Vec<StaleEntry> = self
            .vrfs
            .iter()
            .flat_map(|(rd, paths)| {
                paths.iter().map(move |(path, label)| StaleEntry {
                    rd: rd.clone(),
                    path: *path,
                    label: *label,
                })
            })
            .collect();
        entries.sort_by(|a, b| (&a.rd, a.path).cmp(&(&b.rd, b.path)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteKey;

    fn path(prefix: &str, nh: &str) -> PrefixNextHop {
        PrefixNextHop::new(prefix.parse().unwrap(), nh.parse().unwrap())
    }

    fn table() -> StaleRouteTable {
        let mut table = StaleRouteTable::new();
        table.insert("100:1", path("10.0.0.0/24", "1.1.1.1"), 5);
        table.insert("100:1", path("10.0.1.0/24", "1.1.1.1"), 6);
        table.insert("100:2", path("10.0.0.0/24", "2.2.2.2"), 9);
        table
    }

    #[test]
    fn test_from_routes_only_bgp() {
        let mut local = RouteRecord::bgp(
            RouteKey::new("100:1", "10.9.0.0/16".parse().unwrap(), "1.1.1.1".parse().unwrap()),
            1,
        );
        local.origin = RouteOrigin::Local;
        let learned = RouteRecord::bgp(
            RouteKey::new("100:1", "10.0.0.0/24".parse().unwrap(), "1.1.1.1".parse().unwrap()),
            5,
        );
        let table = StaleRouteTable::from_routes(&[local, learned]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("100:1", &path("10.0.0.0/24", "1.1.1.1")), Some(5));
    }

    #[test]
    fn test_reconcile() {
        let mut table = table();
        let key = path("10.0.0.0/24", "1.1.1.1");
        assert_eq!(table.reconcile("100:1", &key, 5), StaleMatch::Unchanged);
        // entry is consumed by the first match
        assert_eq!(table.reconcile("100:1", &key, 5), StaleMatch::Absent);
        assert_eq!(
            table.reconcile("100:1", &path("10.0.1.0/24", "1.1.1.1"), 7),
            StaleMatch::Changed { previous: 6 }
        );
        assert_eq!(
            table.reconcile("100:9", &path("10.0.0.0/24", "2.2.2.2"), 9),
            StaleMatch::Absent
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_prefix_drops_empty_vrf() {
        let mut table = table();
        assert_eq!(table.remove_prefix("100:2", &"10.0.0.0/24".parse().unwrap()), 1);
        assert_eq!(table.remove_prefix("100:2", &"10.0.0.0/24".parse().unwrap()), 0);
        assert_eq!(table.entries().iter().filter(|e| e.rd == "100:2").count(), 0);
    }

    #[test]
    fn test_pop_batch_drains_across_vrfs() {
        let mut table = table();
        let first = table.pop_batch(2);
        assert_eq!(first.len(), 2);
        assert_eq!(table.len(), 1);
        for entry in first.iter() {
            assert_eq!(table.get(&entry.rd, &entry.path), None);
        }
        let rest = table.pop_batch(2);
        assert_eq!(rest.len(), 1);
        assert!(table.is_empty());
        assert!(table.pop_batch(2).is_empty());
    }
}
