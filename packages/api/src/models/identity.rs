//! # Identity claims carried inside a session credential
//!
//! [`IdentityClaims`] is the decoded identity of a signed-in Taskboard user. It is
//! produced once per login by the backend from Google's ID token (or userinfo
//! response), embedded in the signed credential, and read back by both the
//! middleware (to attach identity to a request) and the client (to render who is
//! signed in).
//!
//! On the wire the fields use the short JWT-style names (`sub`, `iat`, `exp`, ...)
//! and timestamps are whole unix seconds. [`IdentityClaims::new`] truncates to
//! seconds up front so a freshly minted value compares equal to its decoded copy.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the signed-in user plus the validity window of the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Provider subject identifier; stable and unique per account.
    #[serde(rename = "sub")]
    pub subject_id: String,
    pub email: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "picture", default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaims {
    /// Build claims for a session window, falling back to the email address when the
    /// provider did not return a usable name.
    pub fn new(
        subject_id: String,
        email: String,
        name: Option<String>,
        picture_url: Option<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let display_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.clone());

        Self {
            subject_id,
            email,
            display_name,
            picture_url,
            issued_at: issued_at.trunc_subsecs(0),
            expires_at: expires_at.trunc_subsecs(0),
        }
    }

    /// The same identity over a new validity window.
    pub fn renewed(&self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            issued_at: issued_at.trunc_subsecs(0),
            expires_at: expires_at.trunc_subsecs(0),
            ..self.clone()
        }
    }

    /// `true` once `now` has reached the end of the window.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let iat = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        (iat, iat + Duration::hours(1))
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let (iat, exp) = window();
        let claims = IdentityClaims::new(
            "1234".into(),
            "ada@example.com".into(),
            Some("   ".into()),
            None,
            iat,
            exp,
        );
        assert_eq!(claims.display_name, "ada@example.com");

        let named = IdentityClaims::new(
            "1234".into(),
            "ada@example.com".into(),
            Some("Ada Lovelace".into()),
            None,
            iat,
            exp,
        );
        assert_eq!(named.display_name, "Ada Lovelace");
    }

    #[test]
    fn test_wire_names_and_subsecond_truncation() {
        let (iat, exp) = window();
        let claims = IdentityClaims::new(
            "1234".into(),
            "ada@example.com".into(),
            None,
            Some("https://example.com/ada.png".into()),
            iat + Duration::milliseconds(750),
            exp,
        );
        assert_eq!(claims.issued_at, iat);

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "1234");
        assert_eq!(json["iat"], iat.timestamp());
        assert_eq!(json["exp"], exp.timestamp());

        let back: IdentityClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let (iat, exp) = window();
        let claims = IdentityClaims::new("1".into(), "a@b.c".into(), None, None, iat, exp);
        assert!(!claims.is_expired_at(exp - Duration::seconds(1)));
        assert!(claims.is_expired_at(exp));
    }
}
