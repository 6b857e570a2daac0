//! Error types shared by the challenge sources and the match setup.
//!
//! None of these ever end a match: provider errors are recovered with the
//! fallback challenge, and match errors are reported back to the client.

use std::time::Duration;

use thiserror::Error;

/// Structural problems in a challenge record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge field `{0}` is empty")]
    MissingField(&'static str),

    #[error("multiple choice challenge needs 4 options, got {0}")]
    OptionCount(usize),

    #[error("no option matches the correct answer")]
    AnswerNotInOptions,
}

/// Failure while asking a challenge source for content.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("provider returned an empty completion")]
    EmptyCompletion,

    #[error("malformed challenge: {0}")]
    Malformed(#[from] ChallengeError),

    #[error("no local challenge available for difficulty {difficulty}")]
    Exhausted { difficulty: String },

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
}

/// Invalid match configuration supplied by the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}
