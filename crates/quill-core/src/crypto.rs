//! Crypto façade
//!
//! Two deliberately separate regimes:
//!
//! - the **fast path** for blob encryption: key = SHA-256 of the session
//!   password, XChaCha20-Poly1305 AEAD, fresh random 24-byte nonce
//!   prepended to the ciphertext. The password is treated as high-entropy;
//!   a slow KDF here would make every view rebuild unbearable.
//! - the **slow path** for the PIN vault only: self-tuning Argon2id with a
//!   salt built from stable host identifiers, so the derived key is bound
//!   to this machine and costs at least half a second per guess.
//!
//! Also provides the SHA-256 content hash used for blob filenames and the
//! MD5 archive fingerprint compared against the sync server.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 24;

/// Minimum wall-clock cost of one slow-hash invocation
const SLOW_HASH_FLOOR: Duration = Duration::from_millis(500);

/// Argon2id starting memory cost in KiB, and the step it grows by
const SLOW_HASH_BASE_KIB: u32 = 65536;
const SLOW_HASH_STEP_KIB: u32 = 65536;

fn cipher_for(password: &str) -> XChaCha20Poly1305 {
    let key = Sha256::digest(password.as_bytes());
    XChaCha20Poly1305::new(Key::from_slice(&key))
}

/// Encrypt bytes under a password
///
/// Output layout: 24-byte nonce followed by the AEAD ciphertext.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let cipher = cipher_for(password);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt bytes produced by [`encrypt`]
///
/// Fails on wrong password, truncation, or tampering.
pub fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(Error::Crypto("ciphertext too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = cipher_for(password);
    cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// Encrypt bytes under a password and write the result to `path`
pub fn encrypt_to_file(plaintext: &[u8], password: &str, path: &Path) -> Result<()> {
    let data = encrypt(plaintext, password)?;
    fs::write(path, data)?;
    Ok(())
}

/// Read `path` and decrypt its contents under a password
pub fn decrypt_from_file(password: &str, path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path)?;
    decrypt(&data, password)
}

/// Hex SHA-256 of a string; the blob content address
pub fn hash_and_hex(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}

/// Hex MD5 of a file; the archive fingerprint compared with the server
pub fn compute_md5(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Md5::digest(&bytes)))
}

/// Salt for the slow hash: stable identifiers of this machine
///
/// OS name, hostname, and CPU model, in that order. Padded with the app
/// name in stripped-down environments where those come up short.
fn host_salt() -> String {
    let os = sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let hostname = sysinfo::System::host_name().unwrap_or_default();
    let sys = sysinfo::System::new_all();
    let cpu = sys
        .cpus()
        .first()
        .map(|c| c.brand().to_string())
        .unwrap_or_default();

    let mut salt = format!("{os}{hostname}{cpu}");
    if salt.len() < 8 {
        salt.push_str("quill-pin");
    }
    salt
}

/// Deliberately slow, machine-bound hash of a short PIN
///
/// Argon2id keyed with the host salt. The memory cost starts at a base
/// factor and grows by a fixed step until a single invocation crosses the
/// floor; the first result past the floor is returned. Used exclusively
/// by the PIN vault.
pub fn hash_password_slow(pin: &str) -> Result<String> {
    let salt = host_salt();
    let mut memory_kib = SLOW_HASH_BASE_KIB;
    loop {
        let started = Instant::now();
        let params = Params::new(memory_kib, 3, 1, Some(64))
            .map_err(|e| Error::Crypto(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut out = [0u8; 64];
        argon
            .hash_password_into(pin.as_bytes(), salt.as_bytes(), &mut out)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        if started.elapsed() >= SLOW_HASH_FLOOR {
            return Ok(hex::encode(out));
        }
        memory_kib += SLOW_HASH_STEP_KIB;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let data = b"the quick brown fox";
        let encrypted = encrypt(data, "hunter2").unwrap();
        assert_ne!(&encrypted[NONCE_LEN..], data.as_slice());

        let decrypted = decrypt(&encrypted, "hunter2").unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn wrong_password_fails() {
        let encrypted = encrypt(b"secret", "right").unwrap();
        assert!(matches!(
            decrypt(&encrypted, "wrong"),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn tampering_fails() {
        let mut encrypted = encrypt(b"secret", "pw").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;
        assert!(decrypt(&encrypted, "pw").is_err());
    }

    #[test]
    fn truncation_fails() {
        let encrypted = encrypt(b"secret", "pw").unwrap();
        assert!(decrypt(&encrypted[..NONCE_LEN - 1], "pw").is_err());
        assert!(decrypt(&encrypted[..NONCE_LEN + 2], "pw").is_err());
    }

    #[test]
    fn nonces_are_fresh() {
        let a = encrypt(b"same input", "pw").unwrap();
        let b = encrypt(b"same input", "pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.json");

        encrypt_to_file(b"{\"k\":1}", "pw", &path).unwrap();
        let plain = decrypt_from_file("pw", &path).unwrap();
        assert_eq!(plain, b"{\"k\":1}");

        assert!(matches!(
            decrypt_from_file("other", &path),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn hash_and_hex_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            hash_and_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_and_hex("abc").len(), 64);
    }

    #[test]
    fn content_address_depends_on_text_and_entry() {
        let a = hash_and_hex(&format!("{}{}", "hello", "greet"));
        let b = hash_and_hex(&format!("{}{}", "hello", "other"));
        let c = hash_and_hex(&format!("{}{}", "hi", "greet"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn md5_known_vector() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("archive");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            compute_md5(&path).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn md5_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(compute_md5(&tmp.path().join("absent")).is_err());
    }

    #[test]
    fn host_salt_is_stable_and_long_enough() {
        assert_eq!(host_salt(), host_salt());
        assert!(host_salt().len() >= 8);
    }
}
