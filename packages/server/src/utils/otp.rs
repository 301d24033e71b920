use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config;

/// Number of digits in a one-time code.
pub const OTP_LENGTH: usize = 6;

/// Generate a zero-padded numeric one-time code.
pub fn generate() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:0width$}", width = OTP_LENGTH)
}

/// Expiry instant for a code issued now. Saturates at the latest representable time.
pub fn expires_at(ttl_secs: u64) -> DateTime<Utc> {
    config::seconds(ttl_secs)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether `submitted` matches the stored code and the code has not expired.
pub fn matches(
    stored: Option<&str>,
    expires: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
) -> bool {
    match (stored, expires) {
        (Some(code), Some(expires)) => now < expires && code == submitted.trim(),
        _ => false,
    }
}
