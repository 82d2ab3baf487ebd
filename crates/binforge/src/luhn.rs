//! Luhn (mod 10) check digits.
//!
//! Digits are walked right to left. Every second digit, starting with the one
//! nearest the check position, is doubled and reduced by 9 when the result
//! exceeds 9.

/// Computes the check digit that makes `payload` + digit Luhn-valid.
///
/// Returns `None` if `payload` is empty or contains anything other than ASCII
/// digits.
///
/// # Example
/// ```
/// use binforge::check_digit;
///
/// assert_eq!(check_digit("7992739871"), Some('3'));
/// assert_eq!(check_digit("42x"), None);
/// ```
pub fn check_digit(payload: &str) -> Option<char> {
    if payload.is_empty() {
        return None;
    }
    // The payload's last digit sits immediately left of the check digit, so it
    // is the first one doubled.
    let sum = luhn_sum(payload, true)?;
    let digit = (10 - sum % 10) % 10;
    Some(char::from(b'0' + digit as u8))
}

/// Returns `true` if `number` (check digit included) passes the Luhn test.
///
/// Sequences shorter than two digits, or containing non-digits, are never
/// valid.
///
/// # Example
/// ```
/// use binforge::is_valid;
///
/// assert!(is_valid("79927398713"));
/// assert!(!is_valid("79927398710"));
/// ```
pub fn is_valid(number: &str) -> bool {
    number.len() >= 2 && luhn_sum(number, false).is_some_and(|sum| sum % 10 == 0)
}

fn luhn_sum(digits: &str, double_first: bool) -> Option<u32> {
    digits
        .bytes()
        .rev()
        .enumerate()
        .try_fold(0_u32, |acc, (i, b)| {
            if !b.is_ascii_digit() {
                return None;
            }
            let mut d = u32::from(b - b'0');
            if (i % 2 == 0) == double_first {
                d *= 2;
                if d > 9 {
                    d -= 9;
                }
            }
            Some(acc + d)
        })
}
