//! SmartOTP: a self-contained challenge/response one-time-password scheme
//! over the current 2-hour epoch, used to gate entry to the `cli` binary.
//!
//! Generation and verification both take the current time as an explicit
//! parameter rather than reading the clock internally, so this crate is
//! unit-testable without mocking global time.

use std::time::{Duration, SystemTime};

use myfs_crypto::sha256;

const EPOCH_SECONDS: u64 = 7_200;
const CHALLENGE_DIGITS: usize = 4;
const OTP_MODULUS: u64 = 100_000_000;

/// Errors constructing a [`Challenge`] or [`Otp`] from untrusted input.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("challenge must be exactly {CHALLENGE_DIGITS} digits in 1..=9, got {0:?}")]
    InvalidChallenge(String),
    #[error("OTP must be exactly 8 decimal digits, got {0:?}")]
    InvalidOtp(String),
}

/// A 4-digit, zero-free challenge string (`X` in the scheme).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    pub fn new(value: impl Into<String>) -> Result<Self, OtpError> {
        let value = value.into();
        if value.chars().count() != CHALLENGE_DIGITS || !value.chars().all(|c| ('1'..='9').contains(&c)) {
            return Err(OtpError::InvalidChallenge(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digit(&self, i: usize) -> u32 {
        self.0.as_bytes()[i] as u32 - b'0' as u32
    }
}

/// An 8-digit decimal one-time password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp(String);

impl Otp {
    pub fn new(value: impl Into<String>) -> Result<Self, OtpError> {
        let value = value.into();
        if value.chars().count() != 8 || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpError::InvalidOtp(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Draws a fresh 4-digit, zero-free challenge from the volume's CSPRNG.
/// Uses rejection sampling over `crypto::random_bytes` so each digit is
/// uniform over `1..=9` (`252 = 28 * 9` keeps the accepted range unbiased).
pub fn generate_challenge() -> Challenge {
    let mut digits = String::with_capacity(CHALLENGE_DIGITS);
    while digits.len() < CHALLENGE_DIGITS {
        for byte in myfs_crypto::random_bytes(CHALLENGE_DIGITS - digits.len()) {
            if byte < 252 {
                digits.push((b'1' + (byte % 9)) as char);
            }
        }
    }
    Challenge(digits)
}

/// Seconds elapsed since the last even-numbered hour, at time `t`.
fn seconds_since_last_even_hour(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .expect("time travels forward")
        .as_secs()
        % EPOCH_SECONDS
}

/// The first 8 decimal digits of `int(sha256(x).hexdigest(), 16)`, as used to
/// mask the OTP. Computed via grade-school base-256-to-decimal conversion
/// since the intermediate value (up to 2^256) doesn't fit any primitive
/// integer type.
fn challenge_hash_prefix(x: &Challenge) -> u64 {
    let digest = sha256(x.as_str().as_bytes());
    let mut digits_le: Vec<u8> = vec![0];
    for &byte in &digest {
        let mut carry = byte as u32;
        for d in digits_le.iter_mut() {
            let v = *d as u32 * 256 + carry;
            *d = (v % 10) as u8;
            carry = v / 10;
        }
        while carry > 0 {
            digits_le.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    let most_significant_first: Vec<u8> = digits_le.into_iter().rev().collect();
    most_significant_first
        .iter()
        .take(8)
        .fold(0u64, |acc, &d| acc * 10 + d as u64)
}

fn modulo(a: i64, m: i64) -> i64 {
    let r = a % m;
    if r < 0 { r + m } else { r }
}

/// Generates the OTP for challenge `x` as minted at time `t`.
pub fn make_otp(x: &Challenge, t: SystemTime) -> Otp {
    let delta = seconds_since_last_even_hour(t);
    let delta_digits = format!("{delta:04}");

    let mut value = String::with_capacity(8);
    for i in 0..CHALLENGE_DIGITS {
        let d = delta_digits.as_bytes()[i] as u32 - b'0' as u32;
        let product = d * x.digit(i);
        value.push_str(&format!("{product:02}"));
    }
    let reversed: String = value.chars().rev().collect();

    let h = challenge_hash_prefix(x);
    let raw = modulo(reversed.parse::<i64>().expect("8 decimal digits") + h as i64, OTP_MODULUS as i64);
    Otp(format!("{raw:08}"))
}

/// Verifies `otp` against challenge `x`, accepting it when the time it was
/// minted at is within `window` of `now`'s position in the 2-hour epoch.
pub fn verify(otp: &Otp, x: &Challenge, window: Duration, now: SystemTime) -> bool {
    let h = challenge_hash_prefix(x);
    let otp_value: i64 = match otp.as_str().parse() {
        Ok(v) => v,
        Err(_) => return false,
    };
    let r = modulo(otp_value - h as i64, OTP_MODULUS as i64);
    let reversed: String = format!("{r:08}").chars().rev().collect();

    let mut candidate = String::new();
    for i in 0..CHALLENGE_DIGITS {
        let group: u32 = match reversed[2 * i..2 * i + 2].parse() {
            Ok(v) => v,
            Err(_) => return false,
        };
        candidate.push_str(&(group / x.digit(i)).to_string());
    }
    let delta_candidate: i64 = match candidate.parse() {
        Ok(v) => v,
        Err(_) => return false,
    };

    let delta_now = seconds_since_last_even_hour(now) as i64;
    let window_seconds = window.as_secs() as i64;
    (delta_now - delta_candidate).abs() < window_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch_plus(seconds: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
    }

    #[test_log::test]
    fn challenge_rejects_wrong_length_and_zero_digits() {
        assert!(Challenge::new("123").is_err());
        assert!(Challenge::new("12340").is_err());
        assert!(Challenge::new("1230").is_err());
        assert!(Challenge::new("1234").is_ok());
    }

    #[test_log::test]
    fn make_otp_is_always_8_decimal_digits() {
        let x = Challenge::new("1234").unwrap();
        let otp = make_otp(&x, epoch_plus(3600));
        assert_eq!(otp.as_str().len(), 8);
        assert!(otp.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test_log::test]
    fn make_otp_is_deterministic_for_same_inputs() {
        let x = Challenge::new("9182").unwrap();
        let t = epoch_plus(5000);
        assert_eq!(make_otp(&x, t), make_otp(&x, t));
    }

    #[test_log::test]
    fn verify_accepts_within_window_and_rejects_outside() {
        let x = Challenge::new("1234").unwrap();
        let minted_at = epoch_plus(3600);
        let otp = make_otp(&x, minted_at);

        assert!(verify(&otp, &x, Duration::from_secs(60), minted_at));
        assert!(verify(&otp, &x, Duration::from_secs(60), epoch_plus(3630)));
        assert!(!verify(&otp, &x, Duration::from_secs(60), epoch_plus(4000)));
    }

    #[test_log::test]
    fn verify_rejects_wrong_challenge() {
        let x = Challenge::new("1234").unwrap();
        let other = Challenge::new("5678").unwrap();
        let otp = make_otp(&x, epoch_plus(3600));
        assert!(!verify(&otp, &other, Duration::from_secs(60), epoch_plus(3600)));
    }

    #[test_log::test]
    fn generate_challenge_has_four_nonzero_digits() {
        let challenge = generate_challenge();
        assert_eq!(challenge.as_str().len(), 4);
        assert!(challenge.as_str().chars().all(|c| ('1'..='9').contains(&c)));
    }
}
