use std::convert::Infallible;
use std::sync::{Arc, Weak};
use std::time::Duration;
use trajectory_engine::{ColumnWriter, Condition, PatternConfig, PatternNode, TrajectoryColumn};

#[derive(Debug)]
pub struct Cell {
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnData {
    Scalar(i32),
    Tensor(Vec<i32>),
}

pub fn scalar(value: i32) -> ColumnData {
    ColumnData::Scalar(value)
}

pub fn tensor(values: &[i32]) -> ColumnData {
    ColumnData::Tensor(values.to_vec())
}

/// Item as the recording sink materialized it.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub table: String,
    pub priority: f64,
    pub columns: Vec<ColumnData>,
}

/// Sink keeping every appended cell alive for the episode and recording
/// every created item with its table and priority.
pub struct RecordingWriter {
    cells: Vec<Vec<Arc<Cell>>>,
    items: Vec<Item>,
}

impl RecordingWriter {
    pub fn new(num_columns: usize) -> Self {
        Self {
            cells: vec![Vec::new(); num_columns],
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    fn store(&mut self, data: Vec<Option<i32>>, refs: &mut Vec<Option<Weak<Cell>>>) {
        assert!(
            data.len() <= self.cells.len(),
            "appended {} columns but the sink holds {}",
            data.len(),
            self.cells.len()
        );
        for (column, value) in data.into_iter().enumerate() {
            match value {
                Some(value) => {
                    let cell = Arc::new(Cell { value });
                    refs.push(Some(Arc::downgrade(&cell)));
                    self.cells[column].push(cell);
                }
                None => refs.push(None),
            }
        }
    }
}

impl ColumnWriter for RecordingWriter {
    type Tensor = i32;
    type CellRef = Cell;
    type Error = Infallible;

    fn append(
        &mut self,
        data: Vec<Option<i32>>,
        refs: &mut Vec<Option<Weak<Cell>>>,
    ) -> Result<(), Infallible> {
        self.store(data, refs);
        Ok(())
    }

    fn append_partial(
        &mut self,
        data: Vec<Option<i32>>,
        refs: &mut Vec<Option<Weak<Cell>>>,
    ) -> Result<(), Infallible> {
        self.store(data, refs);
        Ok(())
    }

    fn create_item(
        &mut self,
        table: &str,
        priority: f64,
        trajectory: &[TrajectoryColumn<Cell>],
    ) -> Result<(), Infallible> {
        let columns = trajectory
            .iter()
            .map(|column| {
                let cells = column
                    .lock_refs()
                    .expect("cells must stay alive during the firing pass");
                let values: Vec<i32> = cells.iter().map(|cell| cell.value).collect();
                if column.squeezed() {
                    assert_eq!(values.len(), 1, "squeezed column with {} cells", values.len());
                    ColumnData::Scalar(values[0])
                } else {
                    ColumnData::Tensor(values)
                }
            })
            .collect();
        self.items.push(Item {
            table: table.to_string(),
            priority,
            columns,
        });
        Ok(())
    }

    fn end_episode(
        &mut self,
        clear_buffers: bool,
        _timeout: Option<Duration>,
    ) -> Result<(), Infallible> {
        if clear_buffers {
            for column in &mut self.cells {
                column.clear();
            }
        }
        Ok(())
    }

    fn flush(
        &mut self,
        _ignore_last_num_items: usize,
        _timeout: Option<Duration>,
    ) -> Result<(), Infallible> {
        Ok(())
    }
}

/// The standard three-column stream: step `i` carries `(10+i, 20+i, 30+i)`.
pub fn step3(i: i32) -> Vec<Option<i32>> {
    vec![Some(10 + i), Some(20 + i), Some(30 + i)]
}

/// Appends a buffer-length guard sized exactly to the deepest offset the
/// nodes reach, after any scenario-specific conditions.
pub fn guarded(nodes: Vec<PatternNode>, conditions: Vec<Condition>) -> PatternConfig {
    let required = nodes
        .iter()
        .map(|node| i64::from(node.start.unwrap_or(0).min(node.stop.unwrap_or(0))).abs())
        .max()
        .unwrap_or(0);
    let mut config = PatternConfig::new(nodes, "table", 1.0);
    for condition in conditions {
        config = config.with_condition(condition);
    }
    config.with_condition(Condition::buffer_length_ge(0, required))
}
