use crate::types::{Comparator, LeftHand, PatternNode};

/// A validated node lowered into its runtime form.
///
/// `resolve` is the single place negative offsets become absolute indices:
/// with `L` entries buffered, the next append lands at position `L`, so
/// `start`/`stop` count backwards from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    column: u32,
    start: Option<i32>,
    stop: Option<i32>,
    step: u32,
    squeeze: bool,
}

impl SliceSpec {
    pub(crate) fn from_node(node: &PatternNode) -> Self {
        Self {
            column: node.flat_source_index,
            start: node.start,
            stop: node.stop,
            step: node.step.unwrap_or(1),
            squeeze: node.is_squeezed(),
        }
    }

    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    #[inline]
    pub fn squeeze(&self) -> bool {
        self.squeeze
    }

    /// Entries the owning column must retain for this node to resolve.
    #[inline]
    pub fn required_window(&self) -> u64 {
        let floor = self.start.unwrap_or(0).min(self.stop.unwrap_or(0));
        floor.unsigned_abs() as u64
    }

    /// Absolute index sequence for a history of logical length `len`, or
    /// `None` when the episode is still too short.
    pub fn resolve(&self, len: u64) -> Option<SliceIndices> {
        let len = len as i64;
        let (first, end) = match self.start {
            Some(start) => {
                let first = len + i64::from(start);
                let end = match self.stop {
                    Some(stop) if stop < 0 => len + i64::from(stop),
                    _ => len,
                };
                (first, end)
            }
            // Single-element select: validation guarantees `stop < 0` here.
            None => {
                let first = len + i64::from(self.stop.unwrap_or(0));
                (first, first + 1)
            }
        };
        if first < 0 {
            return None;
        }
        Some(SliceIndices {
            first: first as u64,
            end: end as u64,
            step: self.step as u64,
        })
    }
}

/// Half-open, strided index range `first, first + step, … < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    first: u64,
    end: u64,
    step: u64,
}

impl SliceIndices {
    #[inline]
    pub fn len(&self) -> usize {
        ((self.end - self.first + self.step - 1) / self.step) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first >= self.end
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = u64> {
        (self.first..self.end).step_by(self.step as usize)
    }
}

/// Counter snapshot a firing pass evaluates conditions against.
#[derive(Debug, Clone, Copy)]
pub struct PassState<'a> {
    /// Index of the most recent step in the episode; -1 before any append.
    pub step_index: i64,
    pub steps_since_applied: u64,
    pub end_of_episode: bool,
    /// Logical history length per column, holes included.
    pub buffer_lengths: &'a [u64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledCondition {
    left: LeftHand,
    cmp: Comparator,
}

impl CompiledCondition {
    pub(crate) fn new(left: LeftHand, cmp: Comparator) -> Self {
        Self { left, cmp }
    }

    pub fn holds(&self, state: &PassState<'_>) -> bool {
        let left = match self.left {
            LeftHand::StepIndex => state.step_index,
            LeftHand::StepsSinceApplied => state.steps_since_applied as i64,
            LeftHand::BufferLength { column } => state
                .buffer_lengths
                .get(column as usize)
                .copied()
                .unwrap_or(0) as i64,
            LeftHand::IsEndEpisode => i64::from(state.end_of_episode),
            LeftHand::Data { .. } => {
                debug_assert!(false, "`data` conditions are rejected at validation");
                return false;
            }
        };
        self.cmp.holds(left)
    }
}

/// A fully validated pattern in executable form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    pub(crate) slices: Vec<SliceSpec>,
    pub(crate) table: String,
    pub(crate) priority: f64,
    pub(crate) conditions: Vec<CompiledCondition>,
    /// Patterns gated on `is_end_episode` can only fire during the
    /// end-of-episode pass; everything else only during step passes.
    pub(crate) end_of_episode_only: bool,
}

impl CompiledPattern {
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[inline]
    pub fn priority(&self) -> f64 {
        self.priority
    }

    pub fn conditions_hold(&self, state: &PassState<'_>) -> bool {
        self.conditions.iter().all(|c| c.holds(state))
    }
}
