//! Bounded ring buffer invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every added element is still buffered or was taken |
//! | NoDuplicates | No element is observed twice across taken + buffered |
//! | FifoOrder | Taken then buffered elements replay the add order exactly, nothing more or less |
//! | BoundedCapacity | Live count never exceeds capacity and matches contents |
//! | CursorInRange | Write cursor stays in `[0, capacity)` |
//! | LiveSlotsContiguous | Exactly the `count` slots from the read cursor are occupied |

use std::collections::HashSet;

use crate::counterexample::{Counterexample, RingIssue, StateSnapshot};
use crate::property::{PropertyChecker, PropertyResult};

/// Physical slot layout of a ring, captured atomically.
///
/// The read cursor is not stored; it is derived from the write cursor and
/// the live count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    /// Number of slots
    pub capacity: usize,
    /// Index of the next slot to be written
    pub write_cursor: usize,
    /// Number of live elements
    pub count: usize,
    /// Whether each slot currently holds an element
    pub occupied: Vec<bool>,
}

impl SlotLayout {
    /// Index of the oldest live element.
    #[must_use]
    pub fn read_cursor(&self) -> usize {
        debug_assert!(self.capacity > 0, "capacity must be positive");
        (self.write_cursor + self.capacity - self.count % self.capacity) % self.capacity
    }

    /// Whether `slot` lies in the live window `[read, read + count)`.
    #[must_use]
    pub fn in_live_window(&self, slot: usize) -> bool {
        let offset = (slot + self.capacity - self.read_cursor()) % self.capacity;
        offset < self.count
    }

    /// Slot bookkeeping problems in this layout.
    #[must_use]
    pub fn issues(&self) -> Vec<RingIssue> {
        let mut issues = Vec::new();
        let capacity = self.capacity as u64;

        if self.write_cursor >= self.capacity {
            issues.push(RingIssue::CursorOutOfRange {
                write_cursor: self.write_cursor as u64,
                capacity,
            });
        }
        if self.count > self.capacity {
            issues.push(RingIssue::CountOverflow {
                count: self.count as u64,
                capacity,
            });
        }
        // Window arithmetic is meaningless once either bound is broken.
        if !issues.is_empty() || self.capacity == 0 {
            return issues;
        }

        let read_cursor = self.read_cursor() as u64;
        for (slot, &occupied) in self.occupied.iter().enumerate() {
            match (self.in_live_window(slot), occupied) {
                (true, false) => issues.push(RingIssue::HoleInLiveRange {
                    slot: slot as u64,
                    read_cursor,
                }),
                (false, true) => issues.push(RingIssue::StrayElement {
                    slot: slot as u64,
                    read_cursor,
                }),
                _ => {}
            }
        }
        issues
    }
}

/// Properties that a bounded buffer implementation must expose.
///
/// Elements are `u64` tags; checkers assume every added tag is unique.
pub trait BoundedBufferProperties {
    /// All elements that have been added, in add order.
    fn produced_elements(&self) -> Vec<u64>;

    /// All elements that have been taken, in take order.
    fn consumed_elements(&self) -> Vec<u64>;

    /// Elements currently buffered, oldest first.
    fn current_contents(&self) -> Vec<u64>;

    /// Slot layout captured under the buffer's lock.
    fn slot_layout(&self) -> SlotLayout;
}

/// Property checker for bounded buffer implementations.
pub struct BoundedBufferPropertyChecker<'a, T: BoundedBufferProperties> {
    buffer: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: BoundedBufferProperties> BoundedBufferPropertyChecker<'a, T> {
    #[must_use]
    pub fn new(buffer: &'a T) -> Self {
        Self {
            buffer,
            dst_seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self) -> Counterexample {
        match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
    }

    fn check_no_lost_elements(&self) -> PropertyResult {
        let produced = self.buffer.produced_elements();
        let consumed: HashSet<u64> = self.buffer.consumed_elements().into_iter().collect();
        let contents: HashSet<u64> = self.buffer.current_contents().into_iter().collect();

        for element in &produced {
            if !consumed.contains(element) && !contents.contains(element) {
                let mut ce = self.counterexample();
                ce.add_state(StateSnapshot {
                    step: 1,
                    description: format!("Element {} lost", element),
                    variables: vec![
                        ("produced".to_string(), format!("{:?}", produced)),
                        ("consumed".to_string(), format!("{:?}", consumed)),
                        ("contents".to_string(), format!("{:?}", contents)),
                    ],
                });
                return PropertyResult::fail(
                    "NoLostElements",
                    format!(
                        "Element {} was added but is neither buffered nor taken",
                        element
                    ),
                    Some(ce),
                );
            }
        }

        PropertyResult::pass("NoLostElements")
    }

    fn check_no_duplicates(&self) -> PropertyResult {
        let mut seen = HashSet::new();
        let observed = self
            .buffer
            .consumed_elements()
            .into_iter()
            .chain(self.buffer.current_contents());

        for element in observed {
            if !seen.insert(element) {
                return PropertyResult::fail(
                    "NoDuplicates",
                    format!("Element {} observed more than once", element),
                    None,
                );
            }
        }

        PropertyResult::pass("NoDuplicates")
    }

    fn check_fifo_order(&self) -> PropertyResult {
        let produced = self.buffer.produced_elements();
        let consumed = self.buffer.consumed_elements();
        let contents = self.buffer.current_contents();

        let replay = consumed.iter().chain(contents.iter());
        for (i, (got, want)) in replay.zip(produced.iter()).enumerate() {
            if got != want {
                let phase = if i < consumed.len() { "taken" } else { "buffered" };
                return PropertyResult::fail(
                    "FifoOrder",
                    format!(
                        "Element at position {} ({}) is {} but add order has {}",
                        i, phase, got, want
                    ),
                    None,
                );
            }
        }

        let observed_count = consumed.len() + contents.len();
        if observed_count > produced.len() {
            let phantom = consumed
                .iter()
                .chain(contents.iter())
                .nth(produced.len())
                .copied()
                .unwrap_or_default();
            return PropertyResult::fail(
                "FifoOrder",
                format!(
                    "Element {} observed at position {} but only {} were added",
                    phantom,
                    produced.len(),
                    produced.len()
                ),
                None,
            );
        }
        if observed_count < produced.len() {
            return PropertyResult::fail(
                "FifoOrder",
                format!(
                    "{} elements added but only {} taken or buffered",
                    produced.len(),
                    observed_count
                ),
                None,
            );
        }

        PropertyResult::pass("FifoOrder")
    }

    fn check_bounded_capacity(&self) -> PropertyResult {
        let contents = self.buffer.current_contents();
        let layout = self.buffer.slot_layout();

        if contents.len() > layout.capacity {
            return PropertyResult::fail(
                "BoundedCapacity",
                format!(
                    "Buffer contains {} items but capacity is {}",
                    contents.len(),
                    layout.capacity
                ),
                None,
            );
        }
        if contents.len() != layout.count {
            return PropertyResult::fail(
                "BoundedCapacity",
                format!(
                    "Live count is {} but {} items are buffered",
                    layout.count,
                    contents.len()
                ),
                None,
            );
        }

        PropertyResult::pass("BoundedCapacity")
    }

    fn check_cursor_in_range(&self) -> PropertyResult {
        let layout = self.buffer.slot_layout();

        if layout.write_cursor >= layout.capacity {
            let mut ce = self.counterexample();
            ce.add_ring_issue(RingIssue::CursorOutOfRange {
                write_cursor: layout.write_cursor as u64,
                capacity: layout.capacity as u64,
            });
            return PropertyResult::fail(
                "CursorInRange",
                format!(
                    "Write cursor {} is outside [0, {})",
                    layout.write_cursor, layout.capacity
                ),
                Some(ce),
            );
        }

        PropertyResult::pass("CursorInRange")
    }

    fn check_live_slots_contiguous(&self) -> PropertyResult {
        let layout = self.buffer.slot_layout();

        if layout.occupied.len() != layout.capacity {
            return PropertyResult::fail(
                "LiveSlotsContiguous",
                format!(
                    "Layout reports {} slots for capacity {}",
                    layout.occupied.len(),
                    layout.capacity
                ),
                None,
            );
        }

        let issues = layout.issues();
        if issues.is_empty() {
            return PropertyResult::pass("LiveSlotsContiguous");
        }

        let mut ce = self.counterexample();
        ce.add_state(StateSnapshot {
            step: 1,
            description: format!(
                "write={} count={} read={}",
                layout.write_cursor,
                layout.count,
                layout.read_cursor()
            ),
            variables: vec![("occupied".to_string(), format!("{:?}", layout.occupied))],
        });
        let message = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        for issue in issues {
            ce.add_ring_issue(issue);
        }

        PropertyResult::fail("LiveSlotsContiguous", message, Some(ce))
    }
}

impl<'a, T: BoundedBufferProperties> PropertyChecker for BoundedBufferPropertyChecker<'a, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_elements(),
            self.check_no_duplicates(),
            self.check_fifo_order(),
            self.check_bounded_capacity(),
            self.check_cursor_in_range(),
            self.check_live_slots_contiguous(),
        ]
    }
}
