//! Operational counters reported by the `stats` command.

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the engine's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Whole seconds since the engine was constructed.
    pub uptime_secs: u64,
    pub version: String,
    /// Accepted `update` commands, coalesced ones included.
    pub updates: u64,
    /// Pending items.
    pub items: u64,
    /// Live pools.
    pub pools: u64,
    /// Pools destroyed after losing their last member.
    pub pools_gc: u64,
    /// Items reclaimed by dequeue.
    pub items_gc: u64,
}

impl Stats {
    /// `(name, value)` pairs in wire order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("uptime", self.uptime_secs.to_string()),
            ("version", self.version.clone()),
            ("updates", self.updates.to_string()),
            ("items", self.items.to_string()),
            ("pools", self.pools.to_string()),
            ("pools_gc", self.pools_gc.to_string()),
            ("items_gc", self.items_gc.to_string()),
        ]
    }

    /// Rebuild a snapshot from `STAT` pairs, as read back by a client.
    ///
    /// Unknown names are ignored; missing counters read as zero.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut stats = Stats {
            uptime_secs: 0,
            version: String::new(),
            updates: 0,
            items: 0,
            pools: 0,
            pools_gc: 0,
            items_gc: 0,
        };
        for (name, value) in entries {
            let counter = match name {
                "version" => {
                    stats.version = value.to_string();
                    continue;
                }
                "uptime" => &mut stats.uptime_secs,
                "updates" => &mut stats.updates,
                "items" => &mut stats.items,
                "pools" => &mut stats.pools,
                "pools_gc" => &mut stats.pools_gc,
                "items_gc" => &mut stats.items_gc,
                _ => continue,
            };
            *counter = value.parse().unwrap_or(0);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_follow_wire_order() {
        let stats = Stats {
            uptime_secs: 3,
            version: "0.1.0".to_string(),
            updates: 4,
            items: 2,
            pools: 1,
            pools_gc: 5,
            items_gc: 6,
        };
        let names: Vec<_> = stats.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["uptime", "version", "updates", "items", "pools", "pools_gc", "items_gc"]
        );
    }

    #[test]
    fn from_entries_reads_known_counters() {
        let stats = Stats::from_entries([
            ("version", "9.9.9"),
            ("items", "12"),
            ("pools_gc", "3"),
            ("bogus", "1"),
        ]);
        assert_eq!(stats.version, "9.9.9");
        assert_eq!(stats.items, 12);
        assert_eq!(stats.pools_gc, 3);
        assert_eq!(stats.updates, 0);
    }
}
