use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Buffer before the refresh expiry at which a credential counts as stale (5 minutes)
const REFRESH_BUFFER_MINUTES: i64 = 5;

/// The access/refresh pair that authorizes API calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expiry: DateTime<Utc>,
    pub remember_me: bool,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.refresh_expiry
    }

    /// Check if the refresh token will expire soon
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.refresh_expiry - Duration::minutes(REFRESH_BUFFER_MINUTES);
        Utc::now() >= refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.refresh_expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// Field-level view of what a token store holds.
///
/// Fields are individually settable, so a record may be partial between
/// single-field writes. `credential()` only yields a value once all three
/// fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remember_me: bool,
}

impl CredentialRecord {
    pub fn credential(&self) -> Option<Credential> {
        match (&self.access_token, &self.refresh_token, self.refresh_expiry) {
            (Some(access), Some(refresh), Some(expiry)) => Some(Credential {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
                refresh_expiry: expiry,
                remember_me: self.remember_me,
            }),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.refresh_expiry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_expiring_in(minutes: i64) -> Credential {
        Credential {
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
            refresh_expiry: Utc::now() + Duration::minutes(minutes),
            remember_me: false,
        }
    }

    #[test]
    fn test_expiry_checks() {
        let fresh = credential_expiring_in(60);
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());

        let stale = credential_expiring_in(3);
        assert!(!stale.is_expired());
        assert!(stale.needs_refresh());

        let expired = credential_expiring_in(-1);
        assert!(expired.is_expired());
        assert_eq!(expired.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_partial_record_has_no_credential() {
        let record = CredentialRecord {
            access_token: Some("A".to_string()),
            ..Default::default()
        };
        assert!(record.credential().is_none());
        assert!(!record.is_empty());
        assert!(CredentialRecord::default().is_empty());
    }

    #[test]
    fn test_record_parses_without_remember_flag() {
        let json = r#"{"access_token":"A","refresh_token":"R","refresh_expiry":"2030-01-01T00:00:00Z"}"#;
        let record: CredentialRecord = serde_json::from_str(json).expect("record should parse");
        let credential = record.credential().expect("record is complete");
        assert_eq!(credential.access_token, "A");
        assert!(!credential.remember_me);
    }
}
