//! Sealing and unsealing of bot tokens.
//!
//! Tokens are stored only as AES-256-GCM output; the key is derived once at
//! startup from the configured secret and held in memory.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

const HKDF_SALT: &[u8] = b"botauth-token-cipher";
const HKDF_INFO: &[u8] = b"bot token sealing key v1";

/// Authenticated-encryption output for one bot token. The GCM tag is
/// appended to the ciphertext; the nonce is unique per seal, so two blobs
/// for the same token never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedToken {
    pub ciphertext: String,
    pub nonce: String,
}

impl SealedToken {
    /// Single-column storage form: `<nonce>.<ciphertext>`, both base64.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.nonce, self.ciphertext)
    }

    pub fn decode(raw: &str) -> Result<Self, AppError> {
        let (nonce, ciphertext) = raw
            .split_once('.')
            .ok_or_else(|| AppError::Decryption("malformed sealed token".to_string()))?;

        Ok(Self {
            ciphertext: ciphertext.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl TokenCipher {
    /// Derives the AES key from the configured secret with HKDF-SHA256.
    /// Called once at process start.
    pub fn from_secret(secret: &str) -> Result<Self, AppError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|_| AppError::Config("failed to derive encryption key".to_string()))?;

        Ok(Self { key })
    }

    pub fn seal(&self, token: &str) -> Result<SealedToken, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("cipher init failed: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted = cipher
            .encrypt(nonce, token.as_bytes())
            .map_err(|e| AppError::Internal(format!("encryption failed: {}", e)))?;

        Ok(SealedToken {
            ciphertext: BASE64.encode(encrypted),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    /// Fails on tag mismatch, malformed encoding, or a wrong key. Never
    /// returns altered plaintext.
    pub fn open(&self, sealed: &SealedToken) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("cipher init failed: {}", e)))?;

        let nonce_bytes = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| AppError::Decryption(format!("invalid nonce encoding: {}", e)))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(AppError::Decryption("invalid nonce length".to_string()));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let encrypted = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|e| AppError::Decryption(format!("invalid ciphertext encoding: {}", e)))?;

        let decrypted = cipher
            .decrypt(nonce, encrypted.as_ref())
            .map_err(|_| AppError::Decryption("authentication tag mismatch".to_string()))?;

        String::from_utf8(decrypted)
            .map_err(|_| AppError::Decryption("sealed data is not valid UTF-8".to_string()))
    }
}
