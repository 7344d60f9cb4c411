use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("ciphertext is malformed: {0}")]
    Malformed(String),
    #[error("decryption failed: wrong key or tampered ciphertext")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
}

/// Encryption-at-rest for access tokens and message bodies. Decryption of a
/// malformed or tampered envelope fails with a distinguishable error and is
/// never retried by callers.
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use super::*;

    /// Identity cipher for tests that do not exercise encryption.
    pub struct PlainCipher;

    impl PlainCipher {
        pub fn new() -> Arc<dyn TokenCipher> {
            Arc::new(Self)
        }
    }

    impl TokenCipher for PlainCipher {
        fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
            Ok(plaintext.to_string())
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
            Ok(ciphertext.to_string())
        }
    }
}
