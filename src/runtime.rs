use crate::compile::{compile_pattern, retention_by_column};
use crate::error::ConfigError;
use crate::plan::{CompiledPattern, PassState};
use crate::state::HistorySet;
use crate::types::PatternConfig;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Downstream sink owning tensor storage, chunking and item durability.
///
/// The engine treats tensors and cell references as opaque: appended data
/// is handed over by value, and the sink reports each column's cell back
/// through a weak handle (or `None` when the column had no value). Errors
/// pass through the engine untouched.
pub trait ColumnWriter {
    type Tensor;
    type CellRef;
    type Error;

    /// Appends a full step and advances the sink's step counter.
    fn append(
        &mut self,
        data: Vec<Option<Self::Tensor>>,
        refs: &mut Vec<Option<Weak<Self::CellRef>>>,
    ) -> Result<(), Self::Error>;

    /// Appends columns of a step that remains open for further data.
    fn append_partial(
        &mut self,
        data: Vec<Option<Self::Tensor>>,
        refs: &mut Vec<Option<Weak<Self::CellRef>>>,
    ) -> Result<(), Self::Error>;

    fn create_item(
        &mut self,
        table: &str,
        priority: f64,
        trajectory: &[TrajectoryColumn<Self::CellRef>],
    ) -> Result<(), Self::Error>;

    fn end_episode(
        &mut self,
        clear_buffers: bool,
        timeout: Option<Duration>,
    ) -> Result<(), Self::Error>;

    fn flush(
        &mut self,
        ignore_last_num_items: usize,
        timeout: Option<Duration>,
    ) -> Result<(), Self::Error>;
}

/// One column of a submitted trajectory.
///
/// A squeezed column holds exactly one cell and is materialized without a
/// leading length-1 axis; the sink must honor the flag.
#[derive(Debug)]
pub struct TrajectoryColumn<R> {
    refs: Vec<Weak<R>>,
    squeezed: bool,
}

impl<R> TrajectoryColumn<R> {
    pub(crate) fn new(refs: Vec<Weak<R>>, squeezed: bool) -> Self {
        debug_assert!(
            !squeezed || refs.len() == 1,
            "squeezed columns hold exactly one cell, got {}",
            refs.len()
        );
        Self { refs, squeezed }
    }

    #[inline]
    pub fn refs(&self) -> &[Weak<R>] {
        &self.refs
    }

    #[inline]
    pub fn squeezed(&self) -> bool {
        self.squeezed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Upgrades every weak handle, or `None` if the sink already dropped
    /// one. Only meaningful inside the firing pass that built the column.
    pub fn lock_refs(&self) -> Option<Vec<Arc<R>>> {
        self.refs.iter().map(Weak::upgrade).collect()
    }
}

/// Pattern-driven trajectory writer.
///
/// Owns the per-column histories and per-pattern counters; every appended
/// step runs one firing pass per pattern, in configured order, and submits
/// the resolved slices to the sink as prioritized items.
pub struct StructuredWriter<W: ColumnWriter> {
    writer: W,
    patterns: Vec<CompiledPattern>,
    /// Steps completed since each pattern last fired.
    counters: Vec<u64>,
    histories: HistorySet<W::CellRef>,
    episode_id: u64,
    step_in_episode: u64,
    scratch_refs: Vec<Option<Weak<W::CellRef>>>,
}

impl<W: ColumnWriter> StructuredWriter<W> {
    /// Validates and compiles every pattern; the first invalid one fails
    /// construction and no data is admitted.
    pub fn new(writer: W, configs: Vec<PatternConfig>) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(configs.len());
        for config in &configs {
            patterns.push(compile_pattern(config)?);
        }
        let retention = retention_by_column(&patterns);
        let counters = vec![0; patterns.len()];
        Ok(Self {
            writer,
            patterns,
            counters,
            histories: HistorySet::new(retention),
            episode_id: 0,
            step_in_episode: 0,
            scratch_refs: Vec::new(),
        })
    }

    #[inline]
    pub fn episode_id(&self) -> u64 {
        self.episode_id
    }

    /// Number of full appends recorded in the current episode.
    #[inline]
    pub fn step_index_in_episode(&self) -> u64 {
        self.step_in_episode
    }

    #[inline]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    #[inline]
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Appends one full step: records every column (holes for missing
    /// values), closes the step, then runs the firing passes.
    pub fn append(&mut self, step: Vec<Option<W::Tensor>>) -> Result<(), W::Error> {
        self.append_internal(step, true)
    }

    /// Appends additional columns for the currently open step without
    /// closing it. Conditions are evaluated, but `steps_since_applied`
    /// counts steps rather than calls and is left untouched.
    pub fn append_partial(&mut self, step: Vec<Option<W::Tensor>>) -> Result<(), W::Error> {
        self.append_internal(step, false)
    }

    /// Runs the end-of-episode pass, resets all episode windows, and rolls
    /// the episode over before notifying the sink.
    pub fn end_episode(&mut self, clear_buffers: bool) -> Result<(), W::Error> {
        let step_index = self.step_in_episode as i64 - 1;
        for idx in 0..self.patterns.len() {
            if self.patterns[idx].end_of_episode_only {
                self.fire_if_ready(idx, step_index, true)?;
            }
        }
        self.histories.clear();
        let finished = self.episode_id;
        self.episode_id += 1;
        self.step_in_episode = 0;
        debug!(episode_id = finished, clear_buffers, "episode ended");
        self.writer.end_episode(clear_buffers, None)
    }

    pub fn flush(
        &mut self,
        ignore_last_num_items: usize,
        timeout: Option<Duration>,
    ) -> Result<(), W::Error> {
        self.writer.flush(ignore_last_num_items, timeout)
    }

    fn append_internal(
        &mut self,
        step: Vec<Option<W::Tensor>>,
        finalize: bool,
    ) -> Result<(), W::Error> {
        let mut refs = std::mem::take(&mut self.scratch_refs);
        refs.clear();
        let appended = if finalize {
            self.writer.append(step, &mut refs)
        } else {
            self.writer.append_partial(step, &mut refs)
        };
        if let Err(error) = appended {
            self.scratch_refs = refs;
            return Err(error);
        }
        let step_index = self.step_in_episode;
        self.histories.record_step(step_index, &refs);
        refs.clear();
        self.scratch_refs = refs;
        if finalize {
            self.step_in_episode += 1;
        }
        self.run_step_passes(step_index as i64, finalize)
    }

    fn run_step_passes(&mut self, step_index: i64, advance_counters: bool) -> Result<(), W::Error> {
        for idx in 0..self.patterns.len() {
            if advance_counters {
                self.counters[idx] += 1;
            }
            if self.patterns[idx].end_of_episode_only {
                continue;
            }
            self.fire_if_ready(idx, step_index, false)?;
        }
        Ok(())
    }

    /// One firing pass for one pattern: evaluate, slice, submit, reset.
    fn fire_if_ready(
        &mut self,
        idx: usize,
        step_index: i64,
        end_of_episode: bool,
    ) -> Result<(), W::Error> {
        let state = PassState {
            step_index,
            steps_since_applied: self.counters[idx],
            end_of_episode,
            buffer_lengths: self.histories.lengths(),
        };
        if !self.patterns[idx].conditions_hold(&state) {
            return Ok(());
        }
        let pattern = &self.patterns[idx];
        let mut trajectory = Vec::with_capacity(pattern.slices.len());
        for spec in &pattern.slices {
            match self.histories.read_slice(spec) {
                Some(refs) => trajectory.push(TrajectoryColumn::new(refs, spec.squeeze())),
                // A sparse column left a hole inside the window; the
                // pattern simply does not fire this pass.
                None => {
                    trace!(table = %pattern.table, "pattern skipped: gap in column history");
                    return Ok(());
                }
            }
        }
        self.writer
            .create_item(&pattern.table, pattern.priority, &trajectory)?;
        debug!(
            table = %pattern.table,
            priority = pattern.priority,
            columns = trajectory.len(),
            "trajectory item created"
        );
        self.counters[idx] = 0;
        Ok(())
    }
}
