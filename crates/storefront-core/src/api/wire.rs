//! Request and response bodies of the `/auth` endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct LoginRequest {
    pub email_or_user_name: String,
    pub password: String,
    pub is_remember_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token pair issued by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expiry_time: String,
}

impl TokenGrant {
    /// Parse the refresh expiry. Timestamps without an offset are UTC.
    pub fn expiry(&self) -> Result<DateTime<Utc>, ApiError> {
        let raw = self.refresh_token_expiry_time.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| ApiError::InvalidResponse(format!("Unparseable refresh expiry: {}", raw)))
    }

    /// Reject grants that are missing either token
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse("Token grant is missing a token".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grant(expiry: &str) -> TokenGrant {
        TokenGrant {
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
            refresh_token_expiry_time: expiry.to_string(),
        }
    }

    #[test]
    fn test_expiry_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(grant("2025-03-01T12:30:00Z").expiry().unwrap(), expected);
        assert_eq!(grant("2025-03-01T14:30:00+02:00").expiry().unwrap(), expected);
        assert_eq!(grant("2025-03-01T12:30:00").expiry().unwrap(), expected);
        assert_eq!(
            grant("2025-03-01T12:30:00.1234567").expiry().unwrap().timestamp(),
            expected.timestamp()
        );
        assert!(matches!(grant("tomorrow").expiry(), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_wire_names() {
        let body = serde_json::to_value(LoginRequest {
            email_or_user_name: "vendor@example.com".to_string(),
            password: "secret".to_string(),
            is_remember_me: true,
        })
        .unwrap();
        assert_eq!(body["emailOrUserName"], "vendor@example.com");
        assert_eq!(body["isRememberMe"], true);

        let grant: TokenGrant = serde_json::from_str(
            r#"{"accessToken":"A2","refreshToken":"R2","refreshTokenExpiryTime":"T2"}"#,
        )
        .unwrap();
        assert_eq!(grant.access_token, "A2");
        assert_eq!(grant.refresh_token_expiry_time, "T2");
    }

    #[test]
    fn test_validate_rejects_empty_tokens() {
        assert!(grant("2025-03-01T12:30:00Z").validate().is_ok());
        let mut empty = grant("2025-03-01T12:30:00Z");
        empty.refresh_token.clear();
        assert!(empty.validate().is_err());
    }
}
