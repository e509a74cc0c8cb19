//! Cached relay-side option values.
//!
//! Options arrive as an infolist of `(full_name, value)` string pairs
//! and are stored verbatim. Typed accessors parse on read so a value
//! the relay formats unexpectedly degrades to `None` instead of
//! poisoning the cache.

use std::collections::HashMap;

use weerelay_proto::Infolist;

/// Name-to-value cache of relay options.
#[derive(Clone, Debug, Default)]
pub struct OptionCache {
    values: HashMap<String, String>,
}

impl OptionCache {
    /// Replace the cache contents from an `option` infolist.
    ///
    /// Returns the number of options stored.
    pub fn replace_from_infolist(&mut self, infolist: &Infolist) -> usize {
        self.values.clear();
        for index in 0..infolist.items.len() {
            let Some(name) = infolist.item_field(index, "full_name").and_then(|o| o.as_str())
            else {
                continue;
            };
            let value = infolist
                .item_field(index, "value")
                .and_then(|o| o.as_str())
                .unwrap_or_default();
            self.values.insert(name.to_string(), value.to_string());
        }
        self.values.len()
    }

    /// Raw string value of an option.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Option parsed as an integer.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)?.parse().ok()
    }

    /// Option parsed as a boolean (`on`/`off`).
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            "on" => Some(true),
            "off" => Some(false),
            _ => None,
        }
    }

    /// Number of cached options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
