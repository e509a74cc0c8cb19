//! Hotlist ingestion: relay-side unread/highlight counters.
//!
//! The relay reports per-buffer activity as priority-bucketed counts.
//! The mapping is deliberately not additive: a priority-3 (highlight)
//! entry sets the highlighted counter from its own bucket, replacing
//! whatever a priority-2 (private) entry would have contributed for the
//! same buffer. This mirrors observed relay behavior and must not be
//! "fixed" into a sum.

use weerelay_proto::HdataEntry;

/// Priority bucket: joins/parts, never counted.
pub const PRIORITY_LOW: i32 = 0;
/// Priority bucket: normal messages.
pub const PRIORITY_MESSAGE: i32 = 1;
/// Priority bucket: private messages.
pub const PRIORITY_PRIVATE: i32 = 2;
/// Priority bucket: highlights.
pub const PRIORITY_HIGHLIGHT: i32 = 3;

/// One hotlist row for a buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HotlistEntry {
    /// Pointer of the buffer this row describes.
    pub buffer_ptr: String,
    /// Row priority, 0..=3.
    pub priority: i32,
    /// Per-priority counts, indexed by bucket.
    pub counts: Vec<i32>,
}

impl HotlistEntry {
    /// Build a row from a hotlist hdata entry.
    ///
    /// The relay sends counts either as an `arr` of ints (`count`) or as
    /// discrete `count_0x` int fields; both layouts are accepted.
    pub fn from_entry(entry: &HdataEntry) -> Option<Self> {
        let buffer_ptr = entry.ptr_field("buffer")?.to_string();
        let priority = entry.int_field("priority").unwrap_or(0);

        let counts = match entry.field("count").and_then(|o| o.as_array()) {
            Some(items) => items.iter().filter_map(|o| o.as_int()).collect(),
            None => (0..4)
                .map(|i| entry.int_field(&format!("count_{:02}", i)).unwrap_or(0))
                .collect(),
        };

        Some(Self {
            buffer_ptr,
            priority,
            counts,
        })
    }

    /// The count for this row's own priority bucket.
    pub fn own_count(&self) -> i32 {
        self.counts
            .get(self.priority.max(0) as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// The counter deltas one row produces.
///
/// Applied by [`crate::session::SessionState::apply_hotlist`] after the
/// per-buffer counters have been reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterAssign {
    /// No counter change (priority 0).
    None,
    /// Set the unread counter.
    Unread(i32),
    /// Set the highlighted counter.
    Highlighted(i32),
}

impl HotlistEntry {
    /// Map this row's priority to a counter assignment.
    pub fn assignment(&self) -> CounterAssign {
        match self.priority {
            PRIORITY_MESSAGE => CounterAssign::Unread(self.own_count()),
            PRIORITY_PRIVATE | PRIORITY_HIGHLIGHT => CounterAssign::Highlighted(self.own_count()),
            _ => CounterAssign::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: i32, counts: [i32; 4]) -> HotlistEntry {
        HotlistEntry {
            buffer_ptr: "0xb1".into(),
            priority,
            counts: counts.to_vec(),
        }
    }

    #[test]
    fn test_priority_zero_is_ignored() {
        assert_eq!(entry(0, [9, 0, 0, 0]).assignment(), CounterAssign::None);
    }

    #[test]
    fn test_priority_buckets() {
        assert_eq!(
            entry(1, [0, 3, 0, 0]).assignment(),
            CounterAssign::Unread(3)
        );
        assert_eq!(
            entry(2, [0, 0, 4, 0]).assignment(),
            CounterAssign::Highlighted(4)
        );
        // Priority 3 reads its own bucket, not the priority-2 one.
        assert_eq!(
            entry(3, [0, 0, 2, 5]).assignment(),
            CounterAssign::Highlighted(5)
        );
    }

    #[test]
    fn test_missing_bucket_is_zero() {
        let e = HotlistEntry {
            buffer_ptr: "0xb1".into(),
            priority: 3,
            counts: vec![1],
        };
        assert_eq!(e.assignment(), CounterAssign::Highlighted(0));
    }
}
