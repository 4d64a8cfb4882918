//! # Cryptographic utilities: session key material
//!
//! The backend holds one 32-byte master secret, provisioned once per deployment in the
//! `SESSION_SECRET` environment variable as 64 hex characters. Two independent subkeys
//! are derived from it with HMAC-SHA256 so that a compromise of one use does not help
//! with the other:
//!
//! | Subkey | Algorithm | Purpose |
//! |--------|-----------|---------|
//! | signing | HMAC-SHA256 | Signs the payload segment of every [`SessionCredential`](crate::SessionCredential) |
//! | sealing | AES-256-GCM | Encrypts the provider refresh token before it is embedded in a credential |
//!
//! Sealed values are `base64url(nonce || ciphertext)` with a fresh random 12-byte
//! nonce per call. Signature checks and state comparisons go through constant-time
//! primitives ([`Mac::verify_slice`], [`constant_time_eq`]).

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const SIGNING_LABEL: &[u8] = b"taskboard/session-signing";
const SEALING_LABEL: &[u8] = b"taskboard/refresh-sealing";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid session secret: {0}")]
    InvalidSecret(String),

    #[error("Failed to seal token")]
    Seal,

    #[error("Failed to unseal token: {0}")]
    Unseal(String),
}

/// Derived signing and sealing keys.
#[derive(Clone)]
pub struct SessionKeys {
    signing: HmacSha256,
    sealing: Aes256Gcm,
}

impl SessionKeys {
    /// Parse the 64 hex-char master secret.
    pub fn from_hex(hex_secret: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_secret.trim())
            .map_err(|e| CryptoError::InvalidSecret(format!("not hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidSecret(format!(
                "must be 64 hex chars (32 bytes), got {} bytes",
                bytes.len()
            )));
        }
        let mut master = [0u8; 32];
        master.copy_from_slice(&bytes);
        Self::from_master(&master)
    }

    /// A throwaway key set for development and tests.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut master = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut master);
        Self::from_master(&master)
    }

    fn from_master(master: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = derive(master, SIGNING_LABEL)?;
        let sealing_key = derive(master, SEALING_LABEL)?;

        let signing = <HmacSha256 as Mac>::new_from_slice(&signing_key)
            .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
        let sealing = Aes256Gcm::new_from_slice(&sealing_key)
            .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;

        Ok(Self { signing, sealing })
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.signing.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Constant-time signature check.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.signing.clone();
        mac.update(data);
        mac.verify_slice(signature).is_ok()
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .sealing
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Seal)?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn unseal(&self, sealed: &str) -> Result<String, CryptoError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| CryptoError::Unseal(e.to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(CryptoError::Unseal("too short".into()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .sealing
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Unseal("authentication failed".into()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Unseal(e.to_string()))
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}

fn derive(master: &[u8; 32], label: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(master)
        .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
    mac.update(label);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compare two secrets without leaking where they differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_secret_must_be_32_bytes_of_hex() {
        assert!(SessionKeys::from_hex(SECRET).is_ok());
        assert!(matches!(
            SessionKeys::from_hex("abcd"),
            Err(CryptoError::InvalidSecret(_))
        ));
        assert!(matches!(
            SessionKeys::from_hex(&"zz".repeat(32)),
            Err(CryptoError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_signatures_are_key_bound() {
        let keys = SessionKeys::from_hex(SECRET).unwrap();
        let other = SessionKeys::generate().unwrap();

        let signature = keys.sign(b"payload");
        assert_eq!(signature.len(), 32);
        assert!(keys.verify(b"payload", &signature));
        assert!(!keys.verify(b"payloaD", &signature));
        assert!(!other.verify(b"payload", &signature));

        // Same secret, same signature.
        let again = SessionKeys::from_hex(SECRET).unwrap();
        assert_eq!(again.sign(b"payload"), signature);
    }

    #[test]
    fn test_sealed_tokens_are_opaque_and_tamper_evident() {
        let keys = SessionKeys::from_hex(SECRET).unwrap();
        let sealed = keys.seal("1//refresh-token").unwrap();

        assert!(!sealed.contains("refresh"));
        assert_ne!(sealed, keys.seal("1//refresh-token").unwrap());
        assert_eq!(keys.unseal(&sealed).unwrap(), "1//refresh-token");

        let mut bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);
        assert!(matches!(keys.unseal(&tampered), Err(CryptoError::Unseal(_))));

        let other = SessionKeys::generate().unwrap();
        assert!(other.unseal(&sealed).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
        assert!(!constant_time_eq(b"abc123", b"xyz999"));
        assert!(!constant_time_eq(b"abc123", b"abc1234"));
    }
}
