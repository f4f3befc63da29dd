// Expiry policy

use chrono::Utc;

use super::types::CredentialSet;

/// Renew this long before the provider-declared expiry, so a token judged
/// valid does not lapse while the API call using it is still in flight.
pub const REFRESH_BUFFER_MS: i64 = 5 * 60 * 1000;

/// True when the credential set must be renewed before use at `now_ms`.
/// An absent set, or one without `expires_at`, always needs renewal.
pub fn needs_renewal_at(set: Option<&CredentialSet>, now_ms: i64) -> bool {
    match set.and_then(|s| s.expires_at) {
        None => true,
        Some(expires_at) => now_ms >= expires_at.saturating_sub(REFRESH_BUFFER_MS),
    }
}

/// [`needs_renewal_at`] evaluated against the current wall clock
pub fn needs_renewal(set: Option<&CredentialSet>) -> bool {
    needs_renewal_at(set, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expiring_at(expires_at: Option<i64>) -> CredentialSet {
        CredentialSet {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            expires_in: None,
            scope: None,
            token_type: None,
        }
    }

    #[test]
    fn test_absent_set_needs_renewal() {
        assert!(needs_renewal_at(None, 0));
    }

    #[test]
    fn test_missing_expiry_needs_renewal() {
        assert!(needs_renewal_at(Some(&expiring_at(None)), 0));
    }

    #[test]
    fn test_buffer_boundary() {
        let now = 1_700_000_000_000;

        // Token expires in 10 minutes, buffer is 5 minutes - still valid
        assert!(!needs_renewal_at(Some(&expiring_at(Some(now + 600_000))), now));

        // Exactly at the buffer edge counts as expired
        assert!(needs_renewal_at(
            Some(&expiring_at(Some(now + REFRESH_BUFFER_MS))),
            now
        ));

        // One millisecond outside the buffer is valid
        assert!(!needs_renewal_at(
            Some(&expiring_at(Some(now + REFRESH_BUFFER_MS + 1))),
            now
        ));
    }

    #[test]
    fn test_wall_clock_variant() {
        let now = Utc::now().timestamp_millis();
        assert!(!needs_renewal(Some(&expiring_at(Some(now + 3_600_000)))));
        assert!(needs_renewal(Some(&expiring_at(Some(now - 1_000)))));
    }

    proptest! {
        #[test]
        fn prop_far_expiry_is_valid(now in 0i64..4_000_000_000_000, margin in 1i64..1_000_000_000) {
            let set = expiring_at(Some(now + REFRESH_BUFFER_MS + margin));
            prop_assert!(!needs_renewal_at(Some(&set), now));
        }

        #[test]
        fn prop_near_or_past_expiry_needs_renewal(now in 0i64..4_000_000_000_000, offset in -1_000_000_000i64..=REFRESH_BUFFER_MS) {
            let set = expiring_at(Some(now + offset));
            prop_assert!(needs_renewal_at(Some(&set), now));
        }
    }
}
