use crate::{Error, Result};
use core::{fmt, str::FromStr};

/// Shortest accepted BIN prefix.
pub const MIN_PREFIX_LEN: usize = 6;

/// Longest accepted BIN prefix.
pub const MAX_PREFIX_LEN: usize = 16;

/// Returns `true` if `input` is 6 to 16 ASCII digits.
///
/// This is the gate every generation and lookup request must pass before it
/// reaches the [`Synthesizer`](crate::Synthesizer) or the
/// [`Resolver`](crate::Resolver).
pub fn is_valid_prefix(input: &str) -> bool {
    (MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&input.len())
        && input.bytes().all(|b| b.is_ascii_digit())
}

/// A validated BIN/IIN prefix.
///
/// The only way to obtain a `Prefix` is through [`Prefix::parse`] (or the
/// equivalent `FromStr`/`TryFrom` impls), so holding one proves the digits and
/// length were checked.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Prefix(String);

impl Prefix {
    /// Validates `input` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrefix`] with a user-facing reason if `input`
    /// is not 6 to 16 ASCII digits.
    pub fn parse(input: &str) -> Result<Self> {
        if is_valid_prefix(input) {
            return Ok(Self(input.to_owned()));
        }
        let reason = if input.is_empty() {
            "no digits given".to_owned()
        } else if !input.bytes().all(|b| b.is_ascii_digit()) {
            "only digits are allowed".to_owned()
        } else {
            format!(
                "must be between {MIN_PREFIX_LEN} and {MAX_PREFIX_LEN} digits, got {}",
                input.len()
            )
        };
        Err(Error::InvalidPrefix { reason })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits in the prefix.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Prefix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if is_valid_prefix(&value) {
            Ok(Self(value))
        } else {
            Self::parse(&value)
        }
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}
