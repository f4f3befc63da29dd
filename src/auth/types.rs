// Credential types

use serde::{Deserialize, Serialize};

/// Lifetime of synthetic test-mode tokens, in seconds
pub const TEST_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Complete credential set, persisted verbatim as the token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    #[serde(default)]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Epoch milliseconds after which `access_token` must not be used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl CredentialSet {
    /// Build a fresh credential set from a provider response issued at `issued_at_ms`
    pub fn issued(response: TokenResponse, issued_at_ms: i64) -> Self {
        Self {
            expires_at: Some(expiry_instant(issued_at_ms, response.expires_in)),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: Some(response.expires_in),
            scope: response.scope,
            token_type: response.token_type,
        }
    }

    /// Apply a refresh response. The refresh token is replaced only when the
    /// provider rotated it.
    pub fn renewed(&self, response: TokenResponse, issued_at_ms: i64) -> Self {
        Self {
            expires_at: Some(expiry_instant(issued_at_ms, response.expires_in)),
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_in: Some(response.expires_in),
            scope: response.scope.or_else(|| self.scope.clone()),
            token_type: response.token_type.or_else(|| self.token_type.clone()),
        }
    }

    /// Synthetic one-hour credential set; tokens embed the creation timestamp
    pub fn synthetic(now_ms: i64) -> Self {
        Self::issued(TokenResponse::synthetic(now_ms), now_ms)
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Refresh token, if one is stored and non-empty
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

fn expiry_instant(issued_at_ms: i64, expires_in: u64) -> i64 {
    let lifetime_ms = i64::try_from(expires_in)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    issued_at_ms.saturating_add(lifetime_ms)
}

/// Successful token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn synthetic(now_ms: i64) -> Self {
        Self {
            access_token: format!("test_access_token_{}", now_ms),
            refresh_token: Some(format!("test_refresh_token_{}", now_ms)),
            expires_in: TEST_TOKEN_LIFETIME_SECS,
            scope: Some("test-scope".to_string()),
            token_type: Some("Bearer".to_string()),
        }
    }
}

/// OAuth error body (`error` / `error_description`)
#[derive(Debug, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh_token: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in: 3600,
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    fn stored() -> CredentialSet {
        CredentialSet {
            access_token: "old-access".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            expires_at: Some(1_000),
            expires_in: Some(3600),
            scope: Some("Mail.Read".to_string()),
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_renewed_keeps_refresh_token_when_not_rotated() {
        let renewed = stored().renewed(response(None), 5_000);
        assert_eq!(renewed.access_token, "new-access");
        assert_eq!(renewed.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(renewed.expires_at, Some(5_000 + 3_600_000));
        assert_eq!(renewed.scope.as_deref(), Some("Mail.Read"));
    }

    #[test]
    fn test_renewed_replaces_rotated_refresh_token() {
        let renewed = stored().renewed(response(Some("rotated")), 5_000);
        assert_eq!(renewed.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn test_synthetic_expires_one_hour_after_creation() {
        let set = CredentialSet::synthetic(1_700_000_000_000);
        assert_eq!(set.expires_at, Some(1_700_000_000_000 + 3_600_000));
        assert_eq!(set.access_token, "test_access_token_1700000000000");
        assert_eq!(
            set.refresh_token.as_deref(),
            Some("test_refresh_token_1700000000000")
        );
    }

    #[test]
    fn test_record_uses_verbatim_field_names() {
        let json = serde_json::to_value(stored()).unwrap();
        assert_eq!(json["access_token"], "old-access");
        assert_eq!(json["refresh_token"], "old-refresh");
        assert_eq!(json["expires_at"], 1_000);
        assert_eq!(json["expires_in"], 3600);
        assert_eq!(json["scope"], "Mail.Read");
        assert_eq!(json["token_type"], "Bearer");
    }

    #[test]
    fn test_record_without_access_token_parses_as_empty() {
        let set: CredentialSet =
            serde_json::from_str(r#"{"refresh_token":"r","expires_at":5}"#).unwrap();
        assert!(!set.has_access_token());
        assert_eq!(set.usable_refresh_token(), Some("r"));
    }

    #[test]
    fn test_token_response_requires_expires_in() {
        let parsed = serde_json::from_str::<TokenResponse>(r#"{"access_token":"a"}"#);
        assert!(parsed.is_err());
    }
}
