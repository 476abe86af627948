use std::sync::Arc;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use derive_new::new;
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::{debug, instrument};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, KeySourceError, SubmissionError};
use crate::types::CiphertextEnvelope;

const HKDF_SALT: &[u8] = b"survey-x/payload/v1";
const KEY_LEN: usize = 32;
const CIPHER_NONCE_LEN: usize = 12;

/// Publishes the x25519 key the MPC executor decrypts with.
#[async_trait]
pub trait ExecutorKeySource: Send + Sync {
    async fn executor_public_key(&self) -> Result<[u8; 32], KeySourceError>;
}

#[derive(Clone, Copy, Debug, new)]
pub struct StaticExecutorKey {
    key: [u8; 32],
}

#[async_trait]
impl ExecutorKeySource for StaticExecutorKey {
    async fn executor_public_key(&self) -> Result<[u8; 32], KeySourceError> {
        Ok(self.key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub ephemeral_public_key: [u8; 32],
    pub nonce: u128,
}

pub trait EnvelopeCipher: Send + Sync {
    fn seal(&self, executor_key: &[u8; 32], plaintext: &[u8]) -> Result<SealedPayload, EnvelopeError>;
}

/// Ephemeral x25519 agreement, HKDF-SHA256 keyed by the envelope nonce, ChaCha20-Poly1305.
#[derive(Clone, Copy, Debug, Default)]
pub struct X25519ChaCha;

impl X25519ChaCha {
    /// Executor side of [`EnvelopeCipher::seal`].
    pub fn open(
        executor_secret: &[u8; 32],
        envelope: &CiphertextEnvelope,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let secret = StaticSecret::from(*executor_secret);
        let shared = secret.diffie_hellman(&PublicKey::from(envelope.ephemeral_public_key));
        if !shared.was_contributory() {
            return Err(EnvelopeError::WeakExecutorKey);
        }

        let (cipher, nonce) = cipher_for(shared.as_bytes(), envelope.nonce)?;
        cipher
            .decrypt(&nonce, envelope.ciphertext.as_slice())
            .map_err(|_| EnvelopeError::Cipher)
    }

    /// Public half of an executor secret, for wiring a [`StaticExecutorKey`].
    pub fn public_key(executor_secret: &[u8; 32]) -> [u8; 32] {
        PublicKey::from(&StaticSecret::from(*executor_secret)).to_bytes()
    }
}

impl EnvelopeCipher for X25519ChaCha {
    fn seal(&self, executor_key: &[u8; 32], plaintext: &[u8]) -> Result<SealedPayload, EnvelopeError> {
        let ephemeral = StaticSecret::from(rand::random::<[u8; 32]>());
        let ephemeral_public_key = PublicKey::from(&ephemeral).to_bytes();
        let shared = ephemeral.diffie_hellman(&PublicKey::from(*executor_key));
        if !shared.was_contributory() {
            return Err(EnvelopeError::WeakExecutorKey);
        }

        let nonce = rand::random::<u128>();
        let (cipher, cipher_nonce) = cipher_for(shared.as_bytes(), nonce)?;
        let ciphertext = cipher
            .encrypt(&cipher_nonce, plaintext)
            .map_err(|_| EnvelopeError::Cipher)?;

        Ok(SealedPayload {
            ciphertext,
            ephemeral_public_key,
            nonce,
        })
    }
}

fn cipher_for(shared: &[u8; 32], nonce: u128) -> Result<(ChaCha20Poly1305, Nonce), EnvelopeError> {
    let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared);
    let mut okm = Zeroizing::new([0u8; KEY_LEN + CIPHER_NONCE_LEN]);
    hkdf.expand(&nonce.to_le_bytes(), &mut okm[..])
        .map_err(|_| EnvelopeError::Cipher)?;

    let cipher = ChaCha20Poly1305::new_from_slice(&okm[..KEY_LEN]).map_err(|_| EnvelopeError::Cipher)?;
    let cipher_nonce = Nonce::clone_from_slice(&okm[KEY_LEN..]);

    Ok((cipher, cipher_nonce))
}

/// Turns a JSON payload into a [`CiphertextEnvelope`] bound to a fresh computation offset.
#[derive(Clone, new)]
pub struct PayloadEncryptor {
    keys: Arc<dyn ExecutorKeySource>,
    cipher: Arc<dyn EnvelopeCipher>,
}

impl PayloadEncryptor {
    #[instrument(skip_all)]
    pub async fn encrypt(&self, payload: &serde_json::Value) -> Result<CiphertextEnvelope, SubmissionError> {
        let executor_key = self
            .keys
            .executor_public_key()
            .await
            .map_err(|err| SubmissionError::EncryptionUnavailable(err.to_string()))?;
        let plaintext = Zeroizing::new(
            serde_json::to_vec(payload)
                .map_err(|err| SubmissionError::EncryptionUnavailable(EnvelopeError::from(err).to_string()))?,
        );
        let sealed = self
            .cipher
            .seal(&executor_key, &plaintext)
            .map_err(|err| SubmissionError::EncryptionUnavailable(err.to_string()))?;
        let computation_offset = rand::random::<u64>();

        debug!(computation_offset, ciphertext_len = sealed.ciphertext.len(), "payload sealed");

        Ok(CiphertextEnvelope {
            ciphertext: sealed.ciphertext,
            ephemeral_public_key: sealed.ephemeral_public_key,
            nonce: sealed.nonce,
            computation_offset,
        })
    }
}
