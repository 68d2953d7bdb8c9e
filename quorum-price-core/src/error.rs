use thiserror::Error;

/// All errors generated in `quorum-price-core`.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("malformed message from {venue}: {reason}")]
    ProtocolParse { venue: String, reason: String },

    #[error("socket error: {0}")]
    Socket(String),

    #[error("preflight request to {venue} failed: {reason}")]
    Preflight { venue: String, reason: String },

    #[error("feed degraded: only {healthy} of {min_required} required venues are live")]
    FeedDegraded { healthy: usize, min_required: usize },

    #[error("oracle probe error: {0}")]
    Oracle(String),
}

impl DataError {
    /// Determine if an error represents a [`TransientNetwork`](spec §7) failure
    /// that should be recovered locally via reconnect/backoff, as opposed to one
    /// that should be surfaced as a hard failure (e.g. `ConfigInvalid`).
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Socket(_) | DataError::Preflight { .. } => true,
            DataError::ProtocolParse { .. } => false,
            DataError::ConfigInvalid(_) => false,
            DataError::FeedDegraded { .. } => false,
            DataError::Oracle(_) => true,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        Self::Preflight {
            venue: "unknown".to_string(),
            reason: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                input: DataError::Socket("connection reset".into()),
                expected: true,
            },
            TestCase {
                input: DataError::Preflight {
                    venue: "kucoin".into(),
                    reason: "503".into(),
                },
                expected: true,
            },
            TestCase {
                input: DataError::ProtocolParse {
                    venue: "binance".into(),
                    reason: "missing price field".into(),
                },
                expected: false,
            },
            TestCase {
                input: DataError::ConfigInvalid("empty venue list".into()),
                expected: false,
            },
            TestCase {
                input: DataError::FeedDegraded {
                    healthy: 1,
                    min_required: 2,
                },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_transient(), test.expected, "TC{index} failed");
        }
    }
}
