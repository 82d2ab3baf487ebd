//! Error types for card synthesis and BIN resolution.
//!
//! Every failure here is scoped to a single request. Nothing is process-fatal
//! and no variant implies that shared state was left half-updated.
//!
//! ## Error Cases
//! - `InvalidPrefix` / `InvalidOverride`: the caller supplied malformed input.
//!   These are user-correctable and should be surfaced verbatim.
//! - `PrefixTooLong` / `RandomnessUnavailable`: synthesis could not run.
//! - `Provider` / `ProviderTimeout`: a single metadata source failed. The
//!   [`Resolver`](crate::Resolver) recovers from these locally by moving on to
//!   the next source; they never reach the end user on their own.

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the `binforge` engine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The prefix is empty, too short, too long, or contains non-digits.
    #[error("invalid BIN: {reason}")]
    InvalidPrefix { reason: String },

    /// A fixed month, year, or security code could not be understood.
    #[error("invalid {field}: `{value}`")]
    InvalidOverride { field: &'static str, value: String },

    /// The prefix leaves no room for random digits and the check digit.
    #[error("BIN has {len} digits but cards are {target} digits long")]
    PrefixTooLong { len: usize, target: usize },

    /// The configured randomness source could not produce a value.
    #[error("randomness source unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A metadata provider responded with an error or unusable body.
    #[error("provider `{provider}` failed: {reason}")]
    Provider {
        provider: &'static str,
        reason: String,
    },

    /// A metadata provider did not answer within its deadline.
    #[error("provider `{provider}` timed out after {after_ms}ms")]
    ProviderTimeout { provider: &'static str, after_ms: u64 },
}

impl Error {
    /// Returns `true` for errors caused by what the caller typed, as opposed to
    /// failures of the service or its upstreams.
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrefix { .. } | Self::InvalidOverride { .. } | Self::PrefixTooLong { .. }
        )
    }

    pub(crate) fn provider(provider: &'static str, reason: impl ToString) -> Self {
        Self::Provider {
            provider,
            reason: reason.to_string(),
        }
    }
}
