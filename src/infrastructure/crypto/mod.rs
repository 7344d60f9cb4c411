//! AES-256-GCM encryption-at-rest for access tokens and message bodies.
//!
//! Envelope layout: `base64(nonce || ciphertext || tag)`. Every encryption
//! draws a fresh random 96-bit nonce from the system CSPRNG; nonce reuse
//! would be catastrophic for GCM security.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::application::services::crypto::{CryptoError, TokenCipher};

pub struct AesGcmTokenCipher {
    key: [u8; 32],
    rng: SystemRandom,
}

impl AesGcmTokenCipher {
    pub fn new(key: [u8; 32]) -> Arc<dyn TokenCipher> {
        Arc::new(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    /// Build a cipher from a 64-character hex key, as loaded from the
    /// environment.
    pub fn from_hex(hex_key: &str) -> Result<Arc<dyn TokenCipher>, CryptoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|_| CryptoError::Malformed("encryption key is not valid hex".to_string()))?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::Malformed("encryption key must be exactly 32 bytes".to_string())
        })?;
        Ok(Self::new(key))
    }

    fn sealing_key(&self) -> Result<LessSafeKey, CryptoError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key).map_err(|_| CryptoError::Encrypt)?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl TokenCipher for AesGcmTokenCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let key = self.sealing_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Encrypt)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + in_out.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&in_out);
        Ok(BASE64.encode(envelope))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let envelope = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::Malformed("envelope is not valid base64".to_string()))?;
        if envelope.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed(
                "envelope is shorter than a nonce".to_string(),
            ));
        }

        let (nonce_bytes, sealed) = envelope.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CryptoError::Malformed("bad nonce length".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let key = self.sealing_key().map_err(|_| CryptoError::Decrypt)?;
        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Malformed("plaintext is not valid utf-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Arc<dyn TokenCipher> {
        AesGcmTokenCipher::new([7u8; 32])
    }

    #[test]
    fn roundtrips_a_token() {
        let cipher = cipher();
        let sealed = cipher.encrypt("dG9rLXNlY3JldA").unwrap();
        assert_ne!(sealed, "dG9rLXNlY3JldA");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "dG9rLXNlY3JldA");
    }

    #[test]
    fn same_plaintext_seals_differently_each_time() {
        let cipher = cipher();
        let first = cipher.encrypt("body").unwrap();
        let second = cipher.encrypt("body").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = BASE64.encode(bytes);

        assert_eq!(cipher.decrypt(&tampered), Err(CryptoError::Decrypt));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other = AesGcmTokenCipher::new([9u8; 32]);
        assert_eq!(other.decrypt(&sealed), Err(CryptoError::Decrypt));
    }

    #[test]
    fn malformed_envelopes_are_distinguishable() {
        let cipher = cipher();
        assert!(matches!(
            cipher.decrypt("not base64!!!"),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            cipher.decrypt(&BASE64.encode([0u8; 4])),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn from_hex_validates_the_key() {
        assert!(AesGcmTokenCipher::from_hex(&"ab".repeat(32)).is_ok());
        assert!(AesGcmTokenCipher::from_hex("zz").is_err());
        assert!(AesGcmTokenCipher::from_hex("abcd").is_err());
    }
}
