//! Nicklist entries and diff application.
//!
//! Entries are identified by name within their owning buffer. Full
//! pushes rebuild a buffer's list; diff pushes apply `+`/`-`/`*` entries
//! in place. Unknown names on remove/update are silently ignored: diffs
//! race against buffer removal and must never fail the session.

use weerelay_proto::HdataEntry;

/// Prefix characters in descending rank order: founder, admin, op,
/// half-op, voice.
pub const PREFIX_RANKS: &str = "~&@%+";

/// Diff action characters from `_nicklist_diff` pushes.
pub const DIFF_ADD: u8 = b'+';
/// Remove action.
pub const DIFF_REMOVE: u8 = b'-';
/// In-place update action.
pub const DIFF_UPDATE: u8 = b'*';

/// One visible nick (or group) in a buffer's nicklist.
#[derive(Clone, Debug, PartialEq)]
pub struct NicklistEntry {
    /// Nick or group name; the identity within the buffer.
    pub name: String,
    /// Whether this entry is a group rather than a nick.
    pub group: bool,
    /// Whether the entry is visible.
    pub visible: bool,
    /// Nesting level.
    pub level: i32,
    /// Status prefix characters (`@`, `+`, ...).
    pub prefix: String,
    /// Prefix color name.
    pub prefix_color: String,
    /// Nick color name.
    pub color: String,
    /// Sort index derived from the first prefix character's rank;
    /// unprefixed nicks sort last.
    pub rank: usize,
}

impl NicklistEntry {
    /// Build an entry from a nicklist hdata entry.
    pub fn from_entry(entry: &HdataEntry) -> Option<Self> {
        let name = entry.str_field("name")?.to_string();
        let prefix = entry.str_field("prefix").unwrap_or_default().to_string();
        Some(Self {
            rank: rank_of(&prefix),
            name,
            group: entry.char_field("group").unwrap_or(0) != 0,
            visible: entry.char_field("visible").unwrap_or(1) != 0,
            level: entry.int_field("level").unwrap_or(0),
            prefix_color: entry
                .str_field("prefix_color")
                .unwrap_or_default()
                .to_string(),
            color: entry.str_field("color").unwrap_or_default().to_string(),
            prefix,
        })
    }

    /// Copy every field from `other`, recomputing the sort index.
    pub fn update_from(&mut self, other: &NicklistEntry) {
        *self = other.clone();
    }
}

/// Sort index for a prefix string.
pub fn rank_of(prefix: &str) -> usize {
    prefix
        .chars()
        .next()
        .and_then(|c| PREFIX_RANKS.find(c))
        .unwrap_or(PREFIX_RANKS.len())
}

/// Add an entry unless one with the same name exists. No-op on
/// duplicates.
pub fn apply_add(list: &mut Vec<NicklistEntry>, entry: NicklistEntry) -> bool {
    if list.iter().any(|e| e.name == entry.name) {
        return false;
    }
    list.push(entry);
    true
}

/// Remove the entry with the given name. No-op if absent.
pub fn apply_remove(list: &mut Vec<NicklistEntry>, name: &str) -> bool {
    let before = list.len();
    list.retain(|e| e.name != name);
    list.len() != before
}

/// Update an entry in place by name. No-op if absent.
pub fn apply_update(list: &mut [NicklistEntry], entry: &NicklistEntry) -> bool {
    match list.iter_mut().find(|e| e.name == entry.name) {
        Some(existing) => {
            existing.update_from(entry);
            true
        }
        None => false,
    }
}

/// Sort by (rank ascending, name ascending, case-insensitive).
pub fn sort_entries(list: &mut [NicklistEntry]) {
    list.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nick(name: &str, prefix: &str) -> NicklistEntry {
        NicklistEntry {
            name: name.into(),
            group: false,
            visible: true,
            level: 0,
            prefix: prefix.into(),
            prefix_color: String::new(),
            color: String::new(),
            rank: rank_of(prefix),
        }
    }

    #[test]
    fn test_rank_of() {
        assert_eq!(rank_of("~"), 0);
        assert_eq!(rank_of("@"), 2);
        assert_eq!(rank_of("+"), 4);
        assert_eq!(rank_of(""), PREFIX_RANKS.len());
        assert_eq!(rank_of(" "), PREFIX_RANKS.len());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut list = vec![nick("alice", "@")];
        assert!(!apply_add(&mut list, nick("alice", "+")));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].prefix, "@");
        assert!(apply_add(&mut list, nick("bob", "")));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list = vec![nick("alice", "")];
        assert!(!apply_remove(&mut list, "carol"));
        assert_eq!(list.len(), 1);
        assert!(apply_remove(&mut list, "alice"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_update_absent_is_noop() {
        let mut list = vec![nick("alice", "")];
        assert!(!apply_update(&mut list, &nick("carol", "@")));

        assert!(apply_update(&mut list, &nick("alice", "@")));
        assert_eq!(list[0].prefix, "@");
        assert_eq!(list[0].rank, rank_of("@"));
    }

    #[test]
    fn test_sort_by_rank_then_name() {
        let mut list = vec![
            nick("zoe", ""),
            nick("Bob", "+"),
            nick("alice", "@"),
            nick("carol", "+"),
        ];
        sort_entries(&mut list);
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "Bob", "carol", "zoe"]);
    }
}
