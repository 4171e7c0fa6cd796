use thiserror::Error;

pub type SensorResult<T> = Result<T, SensorError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    #[error("thermocouple channel {index} out of range (channels={len})")]
    ChannelIndex { index: usize, len: usize },

    #[error("thermocouple offset {value} outside -30..=30 degC")]
    InvalidOffset { value: f64 },
}
