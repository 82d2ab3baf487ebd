//! Synthetic card identifiers.
//!
//! A [`Synthesizer`] turns a validated [`Prefix`] into a [`SyntheticCard`]:
//!
//! ```text
//! | prefix (6-15 digits) | random filler | check digit |
//! |<------------------- card length ------------------>|
//! ```
//!
//! The expiry month, expiry year, and security code are random unless fixed
//! through [`Overrides`]. Each call is independent; a `Synthesizer` holds no
//! mutable state and can be shared freely.

use crate::{Error, Prefix, RandSource, Result, check_digit};
use chrono::Datelike;
use core::{fmt, ops::RangeInclusive};

/// Card length used when none is configured.
pub const DEFAULT_CARD_LENGTH: usize = 16;

/// Card lengths a [`Synthesizer`] can be configured for.
pub const CARD_LENGTHS: RangeInclusive<usize> = 12..=19;

/// Number of cards produced per generation command by default.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default spread of expiry years, relative to the current year.
pub const DEFAULT_YEARS_AHEAD: RangeInclusive<u8> = 1..=5;

/// A generated card number with expiry and security code.
///
/// `number` always starts with the originating prefix and passes
/// [`is_valid`](crate::is_valid). `month` is `01`-`12` and `year` is two
/// digits.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyntheticCard {
    pub number: String,
    pub month: String,
    pub year: String,
    pub cvv: String,
}

impl fmt::Display for SyntheticCard {
    /// Formats as `number|MM|YY|CVV`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}|{}", self.number, self.month, self.year, self.cvv)
    }
}

/// Caller-fixed expiry and security code values.
///
/// Fields left as `None` are randomized per card.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Overrides {
    month: Option<String>,
    year: Option<String>,
    cvv: Option<String>,
}

impl Overrides {
    /// Parses and normalizes user-supplied overrides.
    ///
    /// Empty or missing fields mean "random". Otherwise:
    /// - `month` must be 1-12 and is zero-padded (`"5"` becomes `"05"`),
    /// - `year` may be two or four digits; only the last two are kept,
    /// - `cvv` must be three or four digits and is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOverride`] naming the first malformed field.
    pub fn parse(month: Option<&str>, year: Option<&str>, cvv: Option<&str>) -> Result<Self> {
        let month = present(month)
            .map(|m| {
                m.parse::<u8>()
                    .ok()
                    .filter(|v| m.len() <= 2 && is_digits(m) && (1..=12).contains(v))
                    .map(|v| format!("{v:02}"))
                    .ok_or_else(|| invalid("month", m))
            })
            .transpose()?;

        let year = present(year)
            .map(|y| match y.len() {
                2 | 4 if is_digits(y) => Ok(y[y.len() - 2..].to_owned()),
                _ => Err(invalid("year", y)),
            })
            .transpose()?;

        let cvv = present(cvv)
            .map(|c| match c.len() {
                3 | 4 if is_digits(c) => Ok(c.to_owned()),
                _ => Err(invalid("security code", c)),
            })
            .transpose()?;

        Ok(Self { month, year, cvv })
    }

    pub fn month(&self) -> Option<&str> {
        self.month.as_deref()
    }

    pub fn year(&self) -> Option<&str> {
        self.year.as_deref()
    }

    pub fn cvv(&self) -> Option<&str> {
        self.cvv.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.month.is_none() && self.year.is_none() && self.cvv.is_none()
    }
}

fn present(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn invalid(field: &'static str, value: &str) -> Error {
    Error::InvalidOverride {
        field,
        value: value.to_owned(),
    }
}

/// Produces checksum-valid card numbers from a prefix.
///
/// # Example
/// ```
/// use binforge::{Overrides, Prefix, Synthesizer, ThreadRandom, is_valid};
///
/// let synth = Synthesizer::new(ThreadRandom);
/// let prefix = Prefix::parse("431940")?;
///
/// let cards = synth.synthesize_batch(&prefix, &Overrides::default(), 10)?;
/// assert_eq!(cards.len(), 10);
/// assert!(cards.iter().all(|c| c.number.len() == 16 && is_valid(&c.number)));
/// # Ok::<(), binforge::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Synthesizer<R> {
    rng: R,
    length: usize,
    years_ahead: RangeInclusive<u8>,
}

impl<R: RandSource> Synthesizer<R> {
    /// Creates a synthesizer for [`DEFAULT_CARD_LENGTH`]-digit cards expiring
    /// [`DEFAULT_YEARS_AHEAD`] years out.
    pub const fn new(rng: R) -> Self {
        Self {
            rng,
            length: DEFAULT_CARD_LENGTH,
            years_ahead: DEFAULT_YEARS_AHEAD,
        }
    }

    /// Sets the total card length, clamped to [`CARD_LENGTHS`].
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.clamp(*CARD_LENGTHS.start(), *CARD_LENGTHS.end());
        self
    }

    /// Sets how many years after the current one a random expiry may fall.
    pub fn with_years_ahead(mut self, years_ahead: RangeInclusive<u8>) -> Self {
        let (lo, hi) = years_ahead.into_inner();
        self.years_ahead = lo.min(hi)..=hi.max(lo);
        self
    }

    pub const fn length(&self) -> usize {
        self.length
    }

    /// Synthesizes one card, taking the expiry year relative to today (UTC).
    ///
    /// # Errors
    ///
    /// - [`Error::PrefixTooLong`] if the prefix leaves no room for the check
    ///   digit.
    /// - [`Error::RandomnessUnavailable`] if the random source fails.
    pub fn synthesize(&self, prefix: &Prefix, overrides: &Overrides) -> Result<SyntheticCard> {
        self.synthesize_in_year(prefix, overrides, chrono::Utc::now().year())
    }

    /// Synthesizes one card as if the current year were `current_year`.
    ///
    /// # Errors
    ///
    /// See [`Synthesizer::synthesize`].
    pub fn synthesize_in_year(
        &self,
        prefix: &Prefix,
        overrides: &Overrides,
        current_year: i32,
    ) -> Result<SyntheticCard> {
        let number = self.number(prefix)?;

        let month = match overrides.month() {
            Some(m) => m.to_owned(),
            None => format!("{:02}", self.rng.try_below(12)? + 1),
        };

        let year = match overrides.year() {
            Some(y) => y.to_owned(),
            None => {
                let (lo, hi) = (*self.years_ahead.start(), *self.years_ahead.end());
                let offset = i32::from(lo) + self.rng.try_below(u32::from(hi - lo) + 1)? as i32;
                format!("{:02}", (current_year + offset).rem_euclid(100))
            }
        };

        let cvv = match overrides.cvv() {
            Some(c) => c.to_owned(),
            None => format!("{:03}", self.rng.try_below(1000)?),
        };

        Ok(SyntheticCard {
            number,
            month,
            year,
            cvv,
        })
    }

    /// Synthesizes `count` independent cards sharing the same overrides.
    ///
    /// # Errors
    ///
    /// See [`Synthesizer::synthesize`]. The whole batch fails if any card does.
    pub fn synthesize_batch(
        &self,
        prefix: &Prefix,
        overrides: &Overrides,
        count: usize,
    ) -> Result<Vec<SyntheticCard>> {
        let year = chrono::Utc::now().year();
        (0..count)
            .map(|_| self.synthesize_in_year(prefix, overrides, year))
            .collect()
    }

    fn number(&self, prefix: &Prefix) -> Result<String> {
        let target = self.length;
        if prefix.len() >= target {
            return Err(Error::PrefixTooLong {
                len: prefix.len(),
                target,
            });
        }

        let mut number = String::with_capacity(target);
        number.push_str(prefix.as_str());
        for _ in 0..target - prefix.len() - 1 {
            let d = self.rng.try_below(10)?;
            number.push(char::from(b'0' + d as u8));
        }

        // Prefix and filler are digits only, so this cannot fail.
        let check = check_digit(&number).ok_or_else(|| Error::InvalidPrefix {
            reason: "only digits are allowed".to_owned(),
        })?;
        number.push(check);
        Ok(number)
    }
}
