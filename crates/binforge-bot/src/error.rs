//! Error types for the command service.
//!
//! ## Error Cases
//! - `Engine`: anything reported by `binforge` (bad BIN, bad overrides,
//!   synthesis failures). User-correctable variants are echoed back to the
//!   caller; the rest are logged.
//! - `StoreIo` / `StoreCorrupt`: a user's record could not be read or
//!   written. Always internal; the caller sees a generic apology.
//! - `StoreTask`: the blocking task running a store call panicked or was
//!   cancelled. Internal as well.

use binforge::CallerId;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] binforge::Error),

    #[error("user record I/O failed for {user}: {source}")]
    StoreIo {
        user: CallerId,
        #[source]
        source: std::io::Error,
    },

    #[error("user record for {user} is not valid JSON: {source}")]
    StoreCorrupt {
        user: CallerId,
        #[source]
        source: serde_json::Error,
    },

    #[error("user store task failed: {0}")]
    StoreTask(#[source] tokio::task::JoinError),
}

impl Error {
    /// Returns `true` if the message is safe and useful to show the caller.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_user_error())
    }
}
