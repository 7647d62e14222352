//! Error types for the `dade` binary.
//!
//! [`EngineError`] wraps every failure mode of the three commands so that
//! `main` can propagate them with `?`.

/// Top-level error for the `dade` binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: dade_core::config::ConfigError,
    },

    /// A sequence or the dataset batch failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: dade_core::runner::RunnerError,
    },

    /// A map name given on the command line is unknown.
    #[error("map error: {source}")]
    Map {
        /// The underlying parse error.
        #[from]
        source: dade_types::UnknownMapError,
    },

    /// The timeline range is empty or its step is not positive.
    #[error("timeline error: {message}")]
    Timeline {
        /// Description of the invalid range.
        message: String,
    },

    /// Writing to standard output failed.
    #[error("output error: {source}")]
    Output {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A timeline row could not be serialized.
    #[error("serialization error: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
