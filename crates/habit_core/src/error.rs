use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown habit frequency `{0}`")]
    UnknownFrequency(String),
    #[error("unknown weekday `{0}`")]
    UnknownWeekday(String),
    #[error("invalid calendar date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),
}
