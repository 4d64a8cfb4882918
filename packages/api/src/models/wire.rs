//! JSON bodies exchanged between the client and the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer to `GET /auth/login`: where to send the browser next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginStart {
    pub authorization_url: String,
    /// The anti-forgery token embedded in `authorization_url`.
    pub state: String,
}

/// Answer to `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    /// The new credential in its wire form.
    pub credential: String,
    pub expires_at: DateTime<Utc>,
}
