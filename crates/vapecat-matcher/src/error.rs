use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("similarity threshold {0} is outside (0, 1]")]
    InvalidThreshold(f64),

    #[error("length ratio {0} is outside [0, 1]")]
    InvalidLengthRatio(f64),

    #[error("character-set jaccard {0} is outside [0, 1]")]
    InvalidJaccard(f64),

    #[error("grouping batch size must be at least 1")]
    InvalidBatchSize,
}
