//! Field-level encryption for sensitive data.
//!
//! AES-256-GCM seals client secrets and tokens before they reach the
//! database. Every ciphertext is bound to the column it belongs to via the
//! AEAD associated data, so a value copied into a different column fails to
//! decrypt instead of silently masquerading as something else.

use anyhow::{Context, Result};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

/// Size of the encryption key (32 bytes = 256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce (12 bytes for AES-GCM).
const NONCE_SIZE: usize = 12;

/// Encryptor for sensitive field data.
///
/// The `field` argument names the column being protected (e.g.
/// `"oauth_tokens.access_token"`) and must match between encrypt and
/// decrypt.
pub struct FieldEncryptor {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl FieldEncryptor {
    /// Create a new encryptor with the given master key.
    ///
    /// The key must be exactly 32 bytes (256 bits).
    pub fn new(master_key: &[u8; KEY_SIZE]) -> Result<Self> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, master_key)
            .map_err(|_| anyhow::anyhow!("Failed to create encryption key"))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a plaintext string for one named field.
    ///
    /// Returns hex(nonce + ciphertext + tag).
    pub fn encrypt(&self, field: &str, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(field.as_bytes()), &mut in_out)
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);

        Ok(hex::encode(sealed))
    }

    /// Decrypt a hex-encoded ciphertext for one named field.
    ///
    /// Fails if the ciphertext was tampered with, was sealed under a
    /// different key, or belongs to a different field.
    pub fn decrypt(&self, field: &str, ciphertext_hex: &str) -> Result<String> {
        let sealed = hex::decode(ciphertext_hex).context("Invalid hex encoding")?;

        if sealed.len() < NONCE_SIZE + AES_256_GCM.tag_len() {
            anyhow::bail!("Ciphertext too short");
        }

        let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);
        let nonce_array: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid nonce"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let mut in_out = encrypted.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(field.as_bytes()), &mut in_out)
            .map_err(|_| anyhow::anyhow!("Decryption failed - wrong key, wrong field, or corrupted data"))?;

        String::from_utf8(plaintext.to_vec()).context("Decrypted data is not valid UTF-8")
    }
}

/// Generate a random master key.
pub fn generate_master_key() -> Result<[u8; KEY_SIZE]> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_SIZE];
    rng.fill(&mut key)
        .map_err(|_| anyhow::anyhow!("Failed to generate random key"))?;
    Ok(key)
}
