//! Error types for switchlogic-bus

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Sink closed: {0}")]
    SinkClosed(String),
}

pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_closed_error() {
        let err = BusError::SinkClosed("stdout".to_string());
        assert_eq!(err.to_string(), "Sink closed: stdout");
    }
}
