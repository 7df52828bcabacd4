use std::{error::Error as _, path::PathBuf};
use thiserror::Error;

/// Failure of a single history request. Never fatal to a run: the pipeline
/// logs it and treats the slice as empty.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No API key configured for the history provider")]
    MissingApiKey,

    #[error("Failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("History request for {city} failed")]
    Request {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("History request for {city} failed with status {status}: {body}")]
    Status {
        city: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse history response for {city}")]
    Decode {
        city: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// The error and each of its sources, joined with `": "`, so a transport
    /// failure reads e.g. `... failed: error sending request ...: Connection refused`.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory '{0}'")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to serialize weather cache")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to export weather cache to CSV '{0}'")]
    Export(PathBuf, #[source] csv::Error),
}

/// Relational store failures. Opening and schema creation are fatal for
/// ingestion; per-row conditions are reported, not raised.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open weather database '{0}'")]
    Open(PathBuf, #[source] rusqlite::Error),

    #[error("Failed to remove old weather database '{0}'")]
    Remove(PathBuf, #[source] std::io::Error),

    #[error("Failed to initialize weather database schema")]
    Schema(#[source] rusqlite::Error),

    #[error("Weather database query failed")]
    Query(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_decode_cause() {
        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let err = FetchError::Decode {
            city: "Austin".into(),
            source,
        };

        let chain = err.chain();
        assert!(chain.starts_with("Failed to parse history response for Austin: "));
        assert!(chain.contains("line 1 column 1"));
    }

    #[test]
    fn chain_without_source_is_display() {
        assert_eq!(FetchError::MissingApiKey.chain(), FetchError::MissingApiKey.to_string());
    }
}
