/// Field-level encryption for personal data at rest
///
/// Sealed values are self-describing strings:
///
/// ```text
/// <kind>:crypto:<base64(nonce || ciphertext || tag)>
/// ```
///
/// where `kind` is one of `string`, `number`, `date` or `boolean`. The kind is
/// bound to the ciphertext as associated data, so relabelling a sealed number
/// as a string fails authentication instead of yielding garbage.
///
/// Values that do not contain the `:crypto:` marker are treated as legacy
/// plaintext and returned unchanged by [`FieldCipher::open`].
///
/// # Algorithm
///
/// - AES-256-GCM (ring), 96-bit random nonce per value
/// - Key = SHA-256(`CRYPTO_SECRET`)
///
/// # Example
///
/// ```
/// use hearth_shared::crypto::FieldCipher;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cipher = FieldCipher::new("a-long-enough-crypto-secret-value!")?;
///
/// let sealed = cipher.seal(&"Biscuit".to_string())?;
/// assert!(sealed.starts_with("string:crypto:"));
///
/// let name: String = cipher.open(&sealed)?;
/// assert_eq!(name, "Biscuit");
/// # Ok(())
/// # }
/// ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between the kind label and the payload
pub const CRYPTO_MARKER: &str = ":crypto:";

/// Error type for sealing and opening fields
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid encryption key")]
    InvalidKey,

    #[error("Failed to generate nonce")]
    Rng,

    #[error("Encryption failed")]
    Seal,

    /// Wrong key, tampered payload, or mismatched kind label
    #[error("Decryption failed")]
    Open,

    #[error("Malformed sealed value: {0}")]
    Malformed(String),

    #[error("Expected a sealed {expected} but found {found}")]
    KindMismatch { expected: FieldKind, found: String },

    #[error("Invalid {kind} value: {value}")]
    InvalidValue { kind: FieldKind, value: String },
}

/// Type label carried by every sealed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Date,
    Boolean,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that can be written to a sealed column
pub trait SealedField: Sized {
    const KIND: FieldKind;

    fn to_plain(&self) -> String;

    fn from_plain(plain: &str) -> Result<Self, CryptoError>;
}

impl SealedField for String {
    const KIND: FieldKind = FieldKind::String;

    fn to_plain(&self) -> String {
        self.clone()
    }

    fn from_plain(plain: &str) -> Result<Self, CryptoError> {
        Ok(plain.to_string())
    }
}

impl SealedField for i64 {
    const KIND: FieldKind = FieldKind::Number;

    fn to_plain(&self) -> String {
        self.to_string()
    }

    fn from_plain(plain: &str) -> Result<Self, CryptoError> {
        plain.parse().map_err(|_| CryptoError::InvalidValue {
            kind: FieldKind::Number,
            value: plain.to_string(),
        })
    }
}

impl SealedField for f64 {
    const KIND: FieldKind = FieldKind::Number;

    fn to_plain(&self) -> String {
        self.to_string()
    }

    fn from_plain(plain: &str) -> Result<Self, CryptoError> {
        plain.parse().map_err(|_| CryptoError::InvalidValue {
            kind: FieldKind::Number,
            value: plain.to_string(),
        })
    }
}

impl SealedField for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn to_plain(&self) -> String {
        self.to_string()
    }

    fn from_plain(plain: &str) -> Result<Self, CryptoError> {
        match plain {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(CryptoError::InvalidValue {
                kind: FieldKind::Boolean,
                value: plain.to_string(),
            }),
        }
    }
}

impl SealedField for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Date;

    fn to_plain(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn from_plain(plain: &str) -> Result<Self, CryptoError> {
        DateTime::parse_from_rfc3339(plain)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| CryptoError::InvalidValue {
                kind: FieldKind::Date,
                value: plain.to_string(),
            })
    }
}

/// AES-256-GCM cipher for sealed columns
pub struct FieldCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Derives the key from `secret` with SHA-256
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        let digest = Sha256::digest(secret.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, &digest).map_err(|_| CryptoError::InvalidKey)?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Whether `value` carries the sealed marker
    pub fn is_sealed(value: &str) -> bool {
        value.contains(CRYPTO_MARKER)
    }

    pub fn seal<T: SealedField>(&self, value: &T) -> Result<String, CryptoError> {
        let kind = T::KIND;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Rng)?;

        let mut in_out = value.to_plain().into_bytes();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(kind.as_str().as_bytes()),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Seal)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + in_out.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&in_out);

        Ok(format!("{}{}{}", kind.as_str(), CRYPTO_MARKER, BASE64.encode(payload)))
    }

    /// Opens a sealed value, or parses `stored` directly when it is plaintext
    pub fn open<T: SealedField>(&self, stored: &str) -> Result<T, CryptoError> {
        let Some((label, encoded)) = stored.split_once(CRYPTO_MARKER) else {
            return T::from_plain(stored);
        };

        if label != T::KIND.as_str() {
            return Err(CryptoError::KindMismatch {
                expected: T::KIND,
                found: label.to_string(),
            });
        }

        let payload = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Malformed(format!("base64: {}", e)))?;

        if payload.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::Malformed("payload too short".to_string()));
        }

        let (nonce_bytes, sealed) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Malformed("bad nonce".to_string()))?;

        let mut buffer = sealed.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::from(label.as_bytes()), &mut buffer)
            .map_err(|_| CryptoError::Open)?;

        let text = std::str::from_utf8(plain)
            .map_err(|_| CryptoError::Malformed("plaintext is not UTF-8".to_string()))?;

        T::from_plain(text)
    }

    pub fn seal_opt<T: SealedField>(&self, value: Option<&T>) -> Result<Option<String>, CryptoError> {
        value.map(|v| self.seal(v)).transpose()
    }

    pub fn open_opt<T: SealedField>(&self, stored: Option<&str>) -> Result<Option<T>, CryptoError> {
        stored.map(|s| self.open(s)).transpose()
    }
}
