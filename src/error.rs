use thiserror::Error;

/// Structural validation failures for a single pattern configuration.
///
/// Every rule carries its own diagnostic; the engine constructor surfaces
/// the first violation and admits no data afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`flat` must not be empty.")]
    EmptyFlat,
    #[error("At least one of `start` and `stop` must be specified.")]
    MissingStartAndStop,
    #[error("`start` must be < 0 but got {start}.")]
    InvalidStart { start: i32 },
    #[error("`stop` must be <= 0 but got {stop}.")]
    InvalidStop { stop: i32 },
    #[error("`stop` must be < 0 when `start` isn't set but got {stop}.")]
    ZeroStopWithoutStart { stop: i32 },
    #[error("`stop` ({stop}) must be > `start` ({start}) when both are specified.")]
    StopNotAfterStart { start: i32, stop: i32 },
    #[error("`step` must only be set when `start` is set.")]
    StepWithoutStart,
    #[error("`step` must be > 0 but got {step}.")]
    InvalidStep { step: u32 },
    #[error("`table` must not be empty.")]
    EmptyTable,
    #[error("`priority` must be >= 0 but got {priority:?}.")]
    NegativePriority { priority: f64 },
    #[error("Conditions must specify a value for `left`.")]
    MissingConditionLeft,
    #[error("Conditions must specify a value for `cmp`.")]
    MissingConditionCmp,
    #[error("`mod_eq.mod` must be > 0 but got {modulus}.")]
    InvalidModulus { modulus: i64 },
    #[error("`mod_eq.eq` must be >= 0 but got {eq}.")]
    NegativeModEq { eq: i64 },
    #[error("Condition must use `eq=1` when using `is_end_episode`.")]
    InvalidEndEpisodeCondition,
    #[error("`data` conditions are not supported.")]
    UnsupportedDataCondition,
    #[error(
        "Config does not contain required buffer length condition; \
         expected `buffer_length` >= {required}."
    )]
    MissingBufferLengthCondition { required: i64 },
}
