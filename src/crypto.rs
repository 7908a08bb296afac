//! Password-based encryption for exported backups.
//!
//! The key is PBKDF2-HMAC-SHA256 over a random 16-byte salt and the
//! ciphertext is AES-256-GCM with a random 12-byte nonce. Everything travels
//! base64-encoded inside a small JSON envelope.

use aes_gcm::aead::{Aead, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;
pub const MIN_PASSWORD_LENGTH: usize = 6;
const ENVELOPE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Wrong password or corrupted file")]
    DecryptionFailed,

    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u8,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    pub salt: String,
    pub iv: String,
    pub tag: String,
    pub data: String,
}

fn default_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    B64.decode(value)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("{field}: {e}")))
}

pub fn encrypt(plaintext: &str, password: &str) -> Result<Envelope, CryptoError> {
    encrypt_with_iterations(plaintext, password, DEFAULT_PBKDF2_ITERATIONS)
}

pub fn encrypt_with_iterations(
    plaintext: &str,
    password: &str,
    iterations: u32,
) -> Result<Envelope, CryptoError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CryptoError::PasswordTooShort);
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt, iterations);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::EncryptionFailed)?;
    let encrypted = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    // aes-gcm appends the tag to the ciphertext
    if encrypted.len() < TAG_LEN {
        return Err(CryptoError::EncryptionFailed);
    }
    let (data, tag) = encrypted.split_at(encrypted.len() - TAG_LEN);

    Ok(Envelope {
        v: ENVELOPE_VERSION,
        iterations,
        salt: B64.encode(salt),
        iv: B64.encode(iv),
        tag: B64.encode(tag),
        data: B64.encode(data),
    })
}

pub fn decrypt(envelope: &Envelope, password: &str) -> Result<String, CryptoError> {
    if envelope.v != ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion(envelope.v));
    }

    let salt = decode("salt", &envelope.salt)?;
    let iv = decode("iv", &envelope.iv)?;
    let tag = decode("tag", &envelope.tag)?;
    let data = decode("data", &envelope.data)?;
    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(CryptoError::MalformedEnvelope(String::from(
            "unexpected iv or tag length",
        )));
    }

    let key = derive_key(password, &salt, envelope.iterations);
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::DecryptionFailed)?;

    let mut combined = Vec::with_capacity(data.len() + tag.len());
    combined.extend_from_slice(&data);
    combined.extend_from_slice(&tag);

    let decrypted = cipher
        .decrypt(Nonce::from_slice(&iv), combined.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(decrypted).map_err(|_| CryptoError::DecryptionFailed)
}

/// Whether `content` parses as an encryption envelope
pub fn is_encrypted(content: &str) -> bool {
    serde_json::from_str::<Envelope>(content).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub strength: Strength,
    pub feedback: Vec<&'static str>,
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let checks: [(bool, &'static str); 5] = [
        (password.chars().count() >= 8, "Use at least 8 characters"),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "Add a lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "Add an uppercase letter",
        ),
        (password.chars().any(|c| c.is_ascii_digit()), "Add a digit"),
        (
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
            "Consider adding a symbol",
        ),
    ];

    let score = checks.iter().filter(|(passed, _)| *passed).count() as u8;
    let feedback = checks
        .iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, hint)| *hint)
        .collect();

    let strength = match score {
        4.. => Strength::Strong,
        3 => Strength::Medium,
        _ => Strength::Weak,
    };

    PasswordStrength {
        score,
        strength,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keeps the tests fast. Real exports use the default count.
    const ITERATIONS: u32 = 1_000;

    #[test]
    fn test_round_trip() {
        let envelope = encrypt_with_iterations("{\"projects\":[]}", "correct horse", ITERATIONS).unwrap();

        assert_eq!(envelope.v, 1);
        assert_eq!(envelope.iterations, ITERATIONS);
        assert_eq!(B64.decode(&envelope.salt).unwrap().len(), 16);
        assert_eq!(B64.decode(&envelope.iv).unwrap().len(), 12);
        assert_eq!(decrypt(&envelope, "correct horse").unwrap(), "{\"projects\":[]}");
    }

    #[test]
    fn test_wrong_password_fails() {
        let envelope = encrypt_with_iterations("secret", "correct horse", ITERATIONS).unwrap();

        let result = decrypt(&envelope, "battery staple");

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_each_export_uses_fresh_salt_and_iv() {
        let a = encrypt_with_iterations("same", "password", ITERATIONS).unwrap();
        let b = encrypt_with_iterations("same", "password", ITERATIONS).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_tampered_data_fails() {
        let mut envelope = encrypt_with_iterations("payload", "password", ITERATIONS).unwrap();
        let mut data = B64.decode(&envelope.data).unwrap();
        data[0] ^= 0xff;
        envelope.data = B64.encode(data);

        assert!(matches!(
            decrypt(&envelope, "password"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            encrypt("data", "12345"),
            Err(CryptoError::PasswordTooShort)
        ));
    }

    #[test]
    fn test_is_encrypted() {
        let envelope = encrypt_with_iterations("data", "password", ITERATIONS).unwrap();
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(is_encrypted(&json));
        assert!(!is_encrypted("{\"projects\": []}"));
        assert!(!is_encrypted("not json"));
    }

    #[test]
    fn test_password_strength() {
        assert_eq!(password_strength("abc").strength, Strength::Weak);
        assert_eq!(password_strength("abcdefgh1").strength, Strength::Medium);
        assert_eq!(password_strength("Abcdefgh1").strength, Strength::Strong);

        let full = password_strength("Abcdefg1!");
        assert_eq!(full.score, 5);
        assert!(full.feedback.is_empty());
    }
}
