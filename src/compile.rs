use crate::error::ConfigError;
use crate::plan::{CompiledCondition, CompiledPattern, SliceSpec};
use crate::types::{Comparator, Condition, LeftHand, PatternConfig, PatternNode};

/// Checks one pattern configuration against every structural rule.
///
/// Pure and data-independent: a config that passes here can be executed
/// without further defensive checks. The buffer-length sufficiency rule is
/// checked last so structural diagnostics win over the guard diagnostic.
pub fn validate_pattern(config: &PatternConfig) -> Result<(), ConfigError> {
    if config.flat.is_empty() {
        return Err(ConfigError::EmptyFlat);
    }
    for node in &config.flat {
        validate_node(node)?;
    }
    if config.table.is_empty() {
        return Err(ConfigError::EmptyTable);
    }
    if !(config.priority >= 0.0) {
        return Err(ConfigError::NegativePriority {
            priority: config.priority,
        });
    }
    for condition in &config.conditions {
        validate_condition(condition)?;
    }
    let required = required_history(&config.flat);
    if !has_buffer_guard(&config.conditions, required) {
        return Err(ConfigError::MissingBufferLengthCondition { required });
    }
    Ok(())
}

fn validate_node(node: &PatternNode) -> Result<(), ConfigError> {
    if node.start.is_none() && node.stop.is_none() {
        return Err(ConfigError::MissingStartAndStop);
    }
    if let Some(start) = node.start {
        if start >= 0 {
            return Err(ConfigError::InvalidStart { start });
        }
    }
    if let Some(stop) = node.stop {
        if stop > 0 {
            return Err(ConfigError::InvalidStop { stop });
        }
        if node.start.is_none() && stop == 0 {
            return Err(ConfigError::ZeroStopWithoutStart { stop });
        }
    }
    if let (Some(start), Some(stop)) = (node.start, node.stop) {
        if stop <= start {
            return Err(ConfigError::StopNotAfterStart { start, stop });
        }
    }
    if let Some(step) = node.step {
        if node.start.is_none() {
            return Err(ConfigError::StepWithoutStart);
        }
        if step == 0 {
            return Err(ConfigError::InvalidStep { step });
        }
    }
    Ok(())
}

fn validate_condition(condition: &Condition) -> Result<(), ConfigError> {
    let left = condition.left.ok_or(ConfigError::MissingConditionLeft)?;
    let cmp = condition.cmp.ok_or(ConfigError::MissingConditionCmp)?;
    if let Comparator::ModEq { modulus, eq } = cmp {
        if modulus <= 0 {
            return Err(ConfigError::InvalidModulus { modulus });
        }
        if eq < 0 {
            return Err(ConfigError::NegativeModEq { eq });
        }
    }
    match left {
        LeftHand::IsEndEpisode if cmp != Comparator::Eq(1) => {
            Err(ConfigError::InvalidEndEpisodeCondition)
        }
        LeftHand::Data { .. } => Err(ConfigError::UnsupportedDataCondition),
        _ => Ok(()),
    }
}

/// Deepest offset any node reaches back, with unset offsets taken as 0.
fn required_history(nodes: &[PatternNode]) -> i64 {
    nodes
        .iter()
        .map(|node| i64::from(node.start.unwrap_or(0).min(node.stop.unwrap_or(0))).abs())
        .max()
        .unwrap_or(0)
}

/// A guard holds when some `buffer_length` condition cannot pass before
/// `required` steps exist. Only lower-bounding comparators qualify.
fn has_buffer_guard(conditions: &[Condition], required: i64) -> bool {
    conditions.iter().any(|condition| {
        matches!(condition.left, Some(LeftHand::BufferLength { .. }))
            && condition
                .cmp
                .and_then(|cmp| cmp.implied_lower_bound())
                .is_some_and(|bound| bound >= required)
    })
}

/// Validates and lowers a configuration into its executable form.
pub(crate) fn compile_pattern(config: &PatternConfig) -> Result<CompiledPattern, ConfigError> {
    validate_pattern(config)?;
    let slices = config.flat.iter().map(SliceSpec::from_node).collect();
    let conditions = config
        .conditions
        .iter()
        .map(|condition| {
            CompiledCondition::new(
                condition.left.expect("validated condition carries `left`"),
                condition.cmp.expect("validated condition carries `cmp`"),
            )
        })
        .collect();
    let end_of_episode_only = config
        .conditions
        .iter()
        .any(|condition| matches!(condition.left, Some(LeftHand::IsEndEpisode)));
    Ok(CompiledPattern {
        slices,
        table: config.table.clone(),
        priority: config.priority,
        conditions,
        end_of_episode_only,
    })
}

/// Per-column retention bound over a whole pattern set. Columns no pattern
/// reads keep one entry so their logical clocks still advance.
pub(crate) fn retention_by_column(patterns: &[CompiledPattern]) -> Vec<u64> {
    let mut retention: Vec<u64> = Vec::new();
    for pattern in patterns {
        for slice in &pattern.slices {
            let column = slice.column() as usize;
            if retention.len() <= column {
                retention.resize(column + 1, 1);
            }
            retention[column] = retention[column].max(slice.required_window());
        }
    }
    retention
}
