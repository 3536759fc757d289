//! Optional AES-128-GCM payload encryption. Keys and nonces are derived
//! per message from a 16-byte out-of-band shared secret (`EncRand`) via
//! triple SHA-256, using `aes-gcm` + `sha2` rather than hand-rolled
//! primitives.
//!
//! Key: first 16 bytes of `sha256(sha256(sha256(enc_rand)))`.
//! Nonce: last 12 bytes of `sha256(sha256(sha256(LE16(command_id) || LE16(sequence) || enc_rand)))`.
//! AAD: `LE16(command_id) || LE16(sequence)`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::FrameError;

pub const ENC_RAND_LEN: usize = 16;

fn triple_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let third = Sha256::digest(second);
    third.into()
}

fn derive_key(enc_rand: &[u8; ENC_RAND_LEN]) -> [u8; 16] {
    let digest = triple_sha256(enc_rand);
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

fn derive_nonce(command_id: u16, sequence: u16, enc_rand: &[u8; ENC_RAND_LEN]) -> [u8; 12] {
    let mut material = Vec::with_capacity(4 + ENC_RAND_LEN);
    material.extend_from_slice(&command_id.to_le_bytes());
    material.extend_from_slice(&sequence.to_le_bytes());
    material.extend_from_slice(enc_rand);

    let digest = triple_sha256(&material);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[20..32]);
    nonce
}

fn aad(command_id: u16, sequence: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..2].copy_from_slice(&command_id.to_le_bytes());
    out[2..].copy_from_slice(&sequence.to_le_bytes());
    out
}

/// Seal `plaintext`, returning ciphertext with the 16-byte GCM tag appended
/// (matching the wire layout `dtu_core::frame` expects for encrypted
/// standard frames).
pub fn seal(command_id: u16, sequence: u16, enc_rand: &[u8; ENC_RAND_LEN], plaintext: &[u8]) -> Result<Vec<u8>, FrameError> {
    let key_bytes = derive_key(enc_rand);
    let key = Key::<Aes128Gcm>::from_slice(&key_bytes);
    let cipher = Aes128Gcm::new(key);

    let nonce_bytes = derive_nonce(command_id, sequence, enc_rand);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let associated_data = aad(command_id, sequence);
    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &associated_data,
            },
        )
        .map_err(|_| FrameError::DecryptFailed)
}

/// Open a ciphertext-with-trailing-tag blob produced by `seal`.
pub fn open(command_id: u16, sequence: u16, enc_rand: &[u8; ENC_RAND_LEN], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, FrameError> {
    let key_bytes = derive_key(enc_rand);
    let key = Key::<Aes128Gcm>::from_slice(&key_bytes);
    let cipher = Aes128Gcm::new(key);

    let nonce_bytes = derive_nonce(command_id, sequence, enc_rand);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let associated_data = aad(command_id, sequence);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext_and_tag,
                aad: &associated_data,
            },
        )
        .map_err(|_| FrameError::DecryptFailed)
}
