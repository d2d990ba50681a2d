// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// One routing rule: deliver `stream_id` from `port_name` to `connection_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    pub port_name: String,
    pub stream_id: String,
    pub connection_id: String,
}

/// Stream-to-connection routing table for output ports.
///
/// A port not named by any entry routes every stream to every connection.
/// Once a port appears in the table, each of its streams only goes to the
/// connections listed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFilter {
    entries: Vec<FilterEntry>,
}

impl ConnectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FilterEntry>) -> Self {
        Self { entries }
    }

    pub fn add(
        &mut self,
        port_name: impl Into<String>,
        stream_id: impl Into<String>,
        connection_id: impl Into<String>,
    ) {
        self.entries.push(FilterEntry {
            port_name: port_name.into(),
            stream_id: stream_id.into(),
            connection_id: connection_id.into(),
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn is_routed(&self, port_name: &str, stream_id: &str, connection_id: &str) -> bool {
        let mut port_listed = false;
        for entry in self.entries.iter().filter(|e| e.port_name == port_name) {
            port_listed = true;
            if entry.stream_id == stream_id && entry.connection_id == connection_id {
                return true;
            }
        }
        !port_listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_routes_everything() {
        let filter = ConnectionFilter::new();
        assert!(filter.is_routed("out", "s1", "c1"));
    }

    #[test]
    fn listed_port_routes_only_listed_pairs() {
        let mut filter = ConnectionFilter::new();
        filter.add("out", "s1", "c1");
        filter.add("out", "s2", "c2");
        assert!(filter.is_routed("out", "s1", "c1"));
        assert!(!filter.is_routed("out", "s1", "c2"));
        assert!(!filter.is_routed("out", "s3", "c1"));
        // Other ports are unaffected.
        assert!(filter.is_routed("other", "s1", "c2"));
        filter.clear();
        assert!(filter.is_routed("out", "s1", "c2"));
    }
}
