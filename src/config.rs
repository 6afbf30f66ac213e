//! Resource-level configuration shared by every page belonging to a
//! resource: the back-reference a key-value page holds from
//! construction onward.
//!
//! A `Default` impl, fluent `with_*` setters, and an `from_env()`
//! constructor that best-effort parses overrides and falls back to the
//! default on malformed input.

use std::fmt;

use crate::consts::{MAX_RECORD_SIZE, NODE_PAGE_NODE_COUNT};

/// Immutable, resource-wide configuration consumed by the key-value
/// page and the record codec.
#[derive(Clone, Debug)]
pub struct ResourceConfiguration {
    /// Whether this resource stores Dewey-IDs on its nodes at all.
    /// Dewey-ID handling is also gated on the codec in use advertising
    /// `supports_dewey()`.
    pub stores_dewey_ids: bool,

    /// The per-build slot count `N`. Defaults to `NODE_PAGE_NODE_COUNT`;
    /// carried on the config so tests can exercise other slot counts.
    pub node_page_node_count: usize,

    /// The per-build overflow threshold. Defaults to `MAX_RECORD_SIZE`.
    pub max_record_size: usize,
}

impl Default for ResourceConfiguration {
    fn default() -> Self {
        Self {
            stores_dewey_ids: false,
            node_page_node_count: NODE_PAGE_NODE_COUNT,
            max_record_size: MAX_RECORD_SIZE,
        }
    }
}

impl ResourceConfiguration {
    /// Load configuration from environment variables, overriding
    /// defaults where present and parseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SIRIX_STORES_DEWEY_IDS") {
            let s = v.trim().to_ascii_lowercase();
            cfg.stores_dewey_ids = matches!(s.as_str(), "1" | "true" | "on" | "yes");
        }

        if let Ok(v) = std::env::var("SIRIX_NODE_PAGE_NODE_COUNT") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.node_page_node_count = n;
                }
            }
        }

        if let Ok(v) = std::env::var("SIRIX_MAX_RECORD_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.max_record_size = n;
                }
            }
        }

        cfg
    }

    pub fn with_dewey_ids(mut self, on: bool) -> Self {
        self.stores_dewey_ids = on;
        self
    }

    pub fn with_node_page_node_count(mut self, n: usize) -> Self {
        self.node_page_node_count = n;
        self
    }

    pub fn with_max_record_size(mut self, n: usize) -> Self {
        self.max_record_size = n;
        self
    }

    /// True when a record assigned to `node_key` belongs to
    /// `page_key`'s page given this configuration's slot count.
    pub fn page_key_of(&self, node_key: u64) -> u64 {
        node_key / self.node_page_node_count as u64
    }

    pub fn offset_of(&self, node_key: u64) -> usize {
        (node_key % self.node_page_node_count as u64) as usize
    }
}

impl fmt::Display for ResourceConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceConfiguration {{ stores_dewey_ids: {}, node_page_node_count: {}, max_record_size: {} }}",
            self.stores_dewey_ids, self.node_page_node_count, self.max_record_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_key_and_offset_decompose_node_key() {
        let cfg = ResourceConfiguration::default().with_node_page_node_count(512);
        assert_eq!(cfg.page_key_of(1025), 2);
        assert_eq!(cfg.offset_of(1025), 1);
    }
}
