//! # Session credential: the opaque, signed proof of a Taskboard session
//!
//! A [`SessionCredential`] is minted by the backend after a successful code exchange
//! (and re-minted on refresh), handed to the client, persisted by it verbatim and
//! presented back as a bearer token on every protected call.
//!
//! ## Wire format
//!
//! ```text
//! base64url(json(payload)) "." base64url(signature)
//! ```
//!
//! Both segments are unpadded base64url. The payload carries the provider access
//! token (`tok`), the sealed provider refresh token (`rtk`, optional) and the
//! [`IdentityClaims`] (`claims`), whose `iat`/`exp` are the credential's window. The
//! signature covers the ASCII bytes of the first segment exactly as transmitted.
//!
//! ## Who checks what
//!
//! - [`SessionCredential::decode`] only parses. Clients use it to read claims and
//!   expiry; they hold no key and cannot verify.
//! - The backend's `SessionSigner` (feature `server`) verifies the signature in
//!   constant time before trusting anything decoded here.
//!
//! Both paths enforce `expires_at > issued_at`.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::models::IdentityClaims;

/// Reasons a string is not a well-formed credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Malformed session credential: {0}")]
    Malformed(String),

    #[error("Session credential expires before it was issued")]
    EmptyWindow,
}

#[derive(Serialize, Deserialize)]
struct CredentialPayload {
    #[serde(rename = "tok")]
    access_token: String,
    #[serde(rename = "rtk", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    claims: IdentityClaims,
}

/// A decoded session credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    /// Provider access token.
    pub access_token: String,
    /// Provider refresh token, sealed by the backend.
    pub refresh_token: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claims: IdentityClaims,
    payload: String,
    signature: Vec<u8>,
}

impl SessionCredential {
    /// Assemble a credential and sign its payload segment with `sign`.
    pub fn new_signed<F>(
        mut claims: IdentityClaims,
        access_token: String,
        refresh_token: Option<String>,
        sign: F,
    ) -> Result<Self, CredentialError>
    where
        F: FnOnce(&[u8]) -> Vec<u8>,
    {
        // The wire carries whole seconds; check the window that will be decoded.
        claims.issued_at = claims.issued_at.trunc_subsecs(0);
        claims.expires_at = claims.expires_at.trunc_subsecs(0);
        if claims.expires_at <= claims.issued_at {
            return Err(CredentialError::EmptyWindow);
        }

        let body = CredentialPayload {
            access_token,
            refresh_token,
            claims,
        };
        let json =
            serde_json::to_vec(&body).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = sign(payload.as_bytes());

        Ok(Self {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            issued_at: body.claims.issued_at,
            expires_at: body.claims.expires_at,
            claims: body.claims,
            payload,
            signature,
        })
    }

    /// Parse the wire form. Does not verify the signature.
    pub fn decode(token: &str) -> Result<Self, CredentialError> {
        let (payload, signature) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| CredentialError::Malformed("missing signature segment".into()))?;

        if payload.is_empty() || signature.is_empty() {
            return Err(CredentialError::Malformed("empty segment".into()));
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| CredentialError::Malformed(format!("payload: {e}")))?;
        let body: CredentialPayload = serde_json::from_slice(&json)
            .map_err(|e| CredentialError::Malformed(format!("payload: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| CredentialError::Malformed(format!("signature: {e}")))?;

        if body.claims.expires_at <= body.claims.issued_at {
            return Err(CredentialError::EmptyWindow);
        }

        Ok(Self {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            issued_at: body.claims.issued_at,
            expires_at: body.claims.expires_at,
            claims: body.claims,
            payload: payload.to_string(),
            signature,
        })
    }

    /// The wire form, suitable for an `Authorization: Bearer` header or storage.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.payload, URL_SAFE_NO_PAD.encode(&self.signature))
    }

    /// The exact bytes the signature was computed over.
    pub fn signed_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// `true` when the credential is expired or will be within `leeway`.
    pub fn expires_within(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        now + leeway >= self.expires_at
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("subject", &self.claims.subject_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("refreshable", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}
