use rand::Rng;
use time::OffsetDateTime;

use crate::auth::repo_types::PendingOtp;

/// Draw a 6-digit verification code, uniform over 100000..=999999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl PendingOtp {
    /// A code is accepted only when it string-equals the stored one AND the
    /// expiry is still strictly in the future.
    pub fn matches(&self, supplied: &str, now: OffsetDateTime) -> bool {
        self.code == supplied && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn pending(code: &str, expires_in: Duration) -> PendingOtp {
        PendingOtp {
            code: code.into(),
            expires_at: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[test]
    fn generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().expect("numeric code");
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn matching_code_within_window_is_accepted() {
        let otp = pending("123456", Duration::minutes(15));
        assert!(otp.matches("123456", OffsetDateTime::now_utc()));
    }

    #[test]
    fn wrong_code_is_rejected() {
        let otp = pending("123456", Duration::minutes(15));
        assert!(!otp.matches("654321", OffsetDateTime::now_utc()));
    }

    #[test]
    fn expired_code_is_rejected_even_when_equal() {
        let otp = pending("123456", Duration::minutes(-1));
        assert!(!otp.matches("123456", OffsetDateTime::now_utc()));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = OffsetDateTime::now_utc();
        let otp = PendingOtp {
            code: "123456".into(),
            expires_at: now,
        };
        assert!(!otp.matches("123456", now));
    }
}
