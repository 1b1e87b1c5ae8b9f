use crate::plan::SliceSpec;
use std::collections::VecDeque;
use std::sync::Weak;

#[derive(Debug, Clone)]
struct HistoryEntry<R> {
    step: u64,
    /// `None` marks a hole: the column had no value at this step.
    cell: Option<Weak<R>>,
}

/// Rolling window over one column's cell references.
///
/// The logical length counts every step of the episode (holes included)
/// while the physical store keeps only the `retain` newest entries, so
/// negative-offset reads behave as if nothing was ever dropped.
#[derive(Debug, Clone)]
pub struct ColumnHistory<R> {
    entries: VecDeque<HistoryEntry<R>>,
    logical_len: u64,
    retain: usize,
}

impl<R> ColumnHistory<R> {
    pub fn new(retain: u64) -> Self {
        Self::with_backfill(retain, 0)
    }

    /// A column first observed mid-episode starts at the episode's current
    /// logical length; the missing prefix reads as absent.
    pub fn with_backfill(retain: u64, logical_len: u64) -> Self {
        Self {
            entries: VecDeque::with_capacity(retain.max(1) as usize),
            logical_len,
            retain: retain.max(1) as usize,
        }
    }

    #[inline]
    pub fn logical_len(&self) -> u64 {
        self.logical_len
    }

    /// Logical length excluding `step` if it is already recorded as the
    /// newest (still open) entry.
    #[inline]
    pub fn len_before_step(&self, step: u64) -> u64 {
        match self.entries.back() {
            Some(last) if last.step == step => self.logical_len - 1,
            _ => self.logical_len,
        }
    }

    /// Appends an entry for `step`, or completes it when `step` is already
    /// the newest entry (a partial step receiving another column pass).
    pub fn push(&mut self, step: u64, cell: Option<Weak<R>>) {
        if let Some(last) = self.entries.back_mut() {
            if last.step == step {
                if cell.is_some() {
                    last.cell = cell;
                }
                return;
            }
            debug_assert!(
                last.step < step,
                "history steps must be strictly increasing: {} then {step}",
                last.step
            );
        }
        self.entries.push_back(HistoryEntry { step, cell });
        self.logical_len += 1;
        while self.entries.len() > self.retain {
            self.entries.pop_front();
        }
    }

    /// Resolves a slice against the current window.
    ///
    /// Absent when the episode is too short, when the range reaches before
    /// this column was first observed, or when any selected entry is a hole.
    pub fn read_slice(&self, spec: &SliceSpec) -> Option<Vec<Weak<R>>> {
        let range = spec.resolve(self.logical_len)?;
        let oldest = self.logical_len - self.entries.len() as u64;
        let mut refs = Vec::with_capacity(range.len());
        for index in range.iter() {
            if index < oldest {
                return None;
            }
            let entry = &self.entries[(index - oldest) as usize];
            refs.push(entry.cell.as_ref()?.clone());
        }
        Some(refs)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.logical_len = 0;
    }
}

/// All column histories of one episode, advancing in lockstep.
///
/// Every recorded step gives every known column exactly one entry (holes
/// for missing values), so the per-column logical lengths always agree.
#[derive(Debug, Clone)]
pub struct HistorySet<R> {
    columns: Vec<ColumnHistory<R>>,
    /// Window requirement per column index as computed from the patterns;
    /// columns no pattern reads retain a single entry.
    retention: Vec<u64>,
    lengths: Vec<u64>,
}

impl<R> HistorySet<R> {
    pub fn new(retention: Vec<u64>) -> Self {
        Self {
            columns: Vec::new(),
            retention,
            lengths: Vec::new(),
        }
    }

    #[inline]
    fn retention_for(&self, column: usize) -> u64 {
        self.retention.get(column).copied().unwrap_or(1)
    }

    /// Records one append pass: `refs[c]` for provided columns, holes for
    /// the rest. Recording the same `step` again completes a partial step.
    pub fn record_step(&mut self, step: u64, refs: &[Option<Weak<R>>]) {
        if self.columns.len() < refs.len() {
            let backfill = self
                .columns
                .first()
                .map(|column| column.len_before_step(step))
                .unwrap_or(0);
            while self.columns.len() < refs.len() {
                let retain = self.retention_for(self.columns.len());
                self.columns
                    .push(ColumnHistory::with_backfill(retain, backfill));
            }
        }
        for (index, column) in self.columns.iter_mut().enumerate() {
            let cell = refs.get(index).and_then(Option::as_ref).cloned();
            column.push(step, cell);
        }
        self.refresh_lengths();
    }

    pub fn read_slice(&self, spec: &SliceSpec) -> Option<Vec<Weak<R>>> {
        self.columns
            .get(spec.column() as usize)
            .and_then(|column| column.read_slice(spec))
    }

    /// Logical length per column; indexable by `buffer_length` conditions.
    #[inline]
    pub fn lengths(&self) -> &[u64] {
        &self.lengths
    }

    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.refresh_lengths();
    }

    fn refresh_lengths(&mut self) {
        self.lengths.clear();
        self.lengths
            .extend(self.columns.iter().map(ColumnHistory::logical_len));
    }
}
