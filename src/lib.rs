pub mod compile;
pub mod error;
pub mod plan;
pub mod runtime;
pub mod state;
pub mod types;

pub use compile::validate_pattern;
pub use error::ConfigError;
pub use runtime::{ColumnWriter, StructuredWriter, TrajectoryColumn};
pub use types::{Comparator, Condition, LeftHand, PatternConfig, PatternNode};
