use serde::{Deserialize, Serialize};

/// One column-and-slice selector inside a pattern.
///
/// Offsets are negative and relative to the position the next appended step
/// will occupy, so `stop: -1` always names the most recent step. A node
/// selecting a single cell without `start` and `step` is *squeezed*: its
/// trajectory column drops the leading length-1 axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternNode {
    pub flat_source_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
}

impl PatternNode {
    pub fn new(flat_source_index: u32) -> Self {
        Self {
            flat_source_index,
            start: None,
            stop: None,
            step: None,
        }
    }

    pub fn with_start(mut self, start: i32) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_stop(mut self, stop: i32) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    /// Squeezed nodes select exactly one cell and emit it without a leading axis.
    #[inline]
    pub fn is_squeezed(&self) -> bool {
        self.start.is_none() && self.step.is_none()
    }
}

/// Left-hand side of a condition: the per-step counter it compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeftHand {
    /// Index of the most recent step within the episode.
    StepIndex,
    /// Steps completed since the pattern last produced an item.
    StepsSinceApplied,
    /// Logical length of a column's history, holes included.
    BufferLength { column: u32 },
    /// 1 during the end-of-episode pass, 0 otherwise.
    IsEndEpisode,
    /// Scalar value of a column's most recent cell. Accepted by the DSL for
    /// wire compatibility but rejected by validation; see DESIGN.md.
    Data { column: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq(i64),
    Ne(i64),
    Le(i64),
    Lt(i64),
    Ge(i64),
    Gt(i64),
    ModEq {
        #[serde(rename = "mod")]
        modulus: i64,
        eq: i64,
    },
}

impl Comparator {
    /// Applies the comparator to a left-hand value.
    ///
    /// Total over `i64`; `ModEq` uses the euclidean remainder so a negative
    /// left side (empty episode) still compares against `eq >= 0`.
    #[inline]
    pub fn holds(&self, left: i64) -> bool {
        match *self {
            Self::Eq(v) => left == v,
            Self::Ne(v) => left != v,
            Self::Le(v) => left <= v,
            Self::Lt(v) => left < v,
            Self::Ge(v) => left >= v,
            Self::Gt(v) => left > v,
            Self::ModEq { modulus, eq } => left.rem_euclid(modulus) == eq,
        }
    }

    /// The smallest left-hand value this comparator can accept, if it
    /// bounds the left side from below.
    #[inline]
    pub(crate) fn implied_lower_bound(&self) -> Option<i64> {
        match *self {
            Self::Ge(v) | Self::Eq(v) => Some(v),
            Self::Gt(v) => Some(v.saturating_add(1)),
            _ => None,
        }
    }
}

/// One predicate of a pattern's conjunction. Unset fields are absent, not
/// zero; validation demands both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<LeftHand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmp: Option<Comparator>,
}

impl Condition {
    pub fn new(left: LeftHand, cmp: Comparator) -> Self {
        Self {
            left: Some(left),
            cmp: Some(cmp),
        }
    }

    pub fn step_index(cmp: Comparator) -> Self {
        Self::new(LeftHand::StepIndex, cmp)
    }

    pub fn steps_since_applied(cmp: Comparator) -> Self {
        Self::new(LeftHand::StepsSinceApplied, cmp)
    }

    pub fn buffer_length_ge(column: u32, length: i64) -> Self {
        Self::new(LeftHand::BufferLength { column }, Comparator::Ge(length))
    }

    pub fn end_of_episode() -> Self {
        Self::new(LeftHand::IsEndEpisode, Comparator::Eq(1))
    }
}

/// A declarative description of how to cut trajectories out of the rolling
/// per-column history and where to submit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// The trajectory's columns, in emission order.
    pub flat: Vec<PatternNode>,
    pub table: String,
    pub priority: f64,
    /// Conjunction of firing predicates; all must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl PatternConfig {
    pub fn new(flat: Vec<PatternNode>, table: impl Into<String>, priority: f64) -> Self {
        Self {
            flat,
            table: table.into(),
            priority,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}
