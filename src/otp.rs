/// One-time code and reset token generation
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Login/signup codes live for 10 minutes
pub const OTP_TTL_MINUTES: i64 = 10;

/// Password reset tokens live for 30 minutes
pub const RESET_TOKEN_TTL_MINUTES: i64 = 30;

/// A generated code with its expiry timestamp
#[derive(Debug, Clone)]
pub struct Challenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a 6-digit numeric one-time code
pub fn generate_otp() -> Challenge {
    let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();

    Challenge {
        code,
        expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
    }
}

/// Generate a password reset token (32 lowercase alphanumeric characters)
pub fn generate_reset_token() -> Challenge {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    let code: String = (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    Challenge {
        code,
        expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    }
}

/// Why a submitted code was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeError {
    /// No code is stored for this identity
    NotRequested,
    /// The stored code's expiry timestamp has passed
    Expired,
    /// The submitted code does not match the stored code
    Mismatch,
}

/// Validate a submitted code against a stored code + expiry.
///
/// Checks run in a fixed order: presence, expiry, exact match. Each
/// violation maps to a distinct error so callers can report it.
pub fn validate_code(
    stored_code: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    submitted: &str,
) -> Result<(), CodeError> {
    let code = stored_code.ok_or(CodeError::NotRequested)?;
    let expires_at = expires_at.ok_or(CodeError::NotRequested)?;

    if expires_at < Utc::now() {
        return Err(CodeError::Expired);
    }

    if code != submitted {
        return Err(CodeError::Mismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..50 {
            let challenge = generate_otp();
            assert_eq!(challenge.code.len(), 6);
            assert!(challenge.code.chars().all(|c| c.is_ascii_digit()));
            // Leading digit is never zero
            assert!(!challenge.code.starts_with('0'));
        }
    }

    #[test]
    fn test_otp_expiry_window() {
        let challenge = generate_otp();
        let ttl = challenge.expires_at - Utc::now();
        assert!(ttl <= Duration::minutes(OTP_TTL_MINUTES));
        assert!(ttl > Duration::minutes(OTP_TTL_MINUTES - 1));
    }

    #[test]
    fn test_reset_token_shape() {
        let challenge = generate_reset_token();
        assert_eq!(challenge.code.len(), 32);
        assert!(challenge
            .code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let ttl = challenge.expires_at - Utc::now();
        assert!(ttl <= Duration::minutes(RESET_TOKEN_TTL_MINUTES));
    }

    #[test]
    fn test_validate_code_paths() {
        let future = Utc::now() + Duration::minutes(5);
        let past = Utc::now() - Duration::minutes(5);

        assert_eq!(
            validate_code(None, None, "123456"),
            Err(CodeError::NotRequested)
        );
        assert_eq!(
            validate_code(Some("123456"), Some(past), "123456"),
            Err(CodeError::Expired)
        );
        assert_eq!(
            validate_code(Some("123456"), Some(future), "654321"),
            Err(CodeError::Mismatch)
        );
        assert_eq!(validate_code(Some("123456"), Some(future), "123456"), Ok(()));
    }

    #[test]
    fn test_expiry_checked_before_match() {
        // An expired code must report expiry even when the submitted
        // code would not have matched anyway
        let past = Utc::now() - Duration::minutes(1);
        assert_eq!(
            validate_code(Some("123456"), Some(past), "000000"),
            Err(CodeError::Expired)
        );
    }
}
