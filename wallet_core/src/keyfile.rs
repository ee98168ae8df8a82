//! Passphrase-encrypted key files.
//!
//! Each account's 32-byte Ed25519 secret is encrypted with its passphrase:
//! 1. Argon2id derives a 32-byte encryption key from the passphrase + random salt
//! 2. AES-256-GCM encrypts the secret with a random nonce
//! 3. The result is a JSON document carrying every parameter needed to decrypt
//!
//! The passphrase itself is never stored.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use kin_types::{Address, PrivateKey};

use crate::error::KinError;

pub const KEY_FILE_VERSION: u32 = 1;

const CIPHER: &str = "aes-256-gcm";
const KDF: &str = "argon2id";
const SALT_LEN: usize = 32;
/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters, recorded in every key file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Minimal cost profile for tests and sandbox tooling. Never use it for
    /// keys that protect real value.
    pub fn light() -> Self {
        Self {
            memory: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 iterations, 1 lane.
    fn default() -> Self {
        Self {
            memory: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// One encrypted account key as persisted by a `KeyStorage` backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub version: u32,
    pub index: u32,
    /// Plaintext so accounts can be listed without the passphrase.
    pub address: Address,
    pub crypto: KeyFileCrypto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyFileCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext (secret key + GCM tag).
    pub ciphertext: String,
}

/// Encrypt an account's secret key under `passphrase`.
pub fn encrypt_key(
    secret: &PrivateKey,
    index: u32,
    address: Address,
    passphrase: &str,
    params: KdfParams,
) -> Result<KeyFile, KinError> {
    let mut rng = rand::thread_rng();

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let derived_key = derive_key(passphrase, &salt, &params)?;
    let cipher = Aes256Gcm::new_from_slice(&derived_key[..])
        .map_err(|e| KinError::Keystore(format!("AES key init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret.0.as_ref())
        .map_err(|e| KinError::Keystore(format!("encryption failed: {e}")))?;

    Ok(KeyFile {
        version: KEY_FILE_VERSION,
        index,
        address,
        crypto: KeyFileCrypto {
            cipher: CIPHER.to_string(),
            kdf: KDF.to_string(),
            kdf_params: params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

/// Decrypt a key file with `passphrase`.
///
/// A wrong passphrase yields [`KinError::Authentication`]; a structurally
/// broken file yields [`KinError::Keystore`].
pub fn decrypt_key(file: &KeyFile, passphrase: &str) -> Result<PrivateKey, KinError> {
    if file.version != KEY_FILE_VERSION {
        return Err(KinError::Keystore(format!(
            "unsupported key file version: {}",
            file.version
        )));
    }
    if file.crypto.cipher != CIPHER || file.crypto.kdf != KDF {
        return Err(KinError::Keystore(format!(
            "unsupported key file scheme: {}/{}",
            file.crypto.cipher, file.crypto.kdf
        )));
    }

    let salt = hex::decode(&file.crypto.salt)
        .map_err(|e| KinError::Keystore(format!("invalid salt hex: {e}")))?;
    let nonce_bytes = hex::decode(&file.crypto.nonce)
        .map_err(|e| KinError::Keystore(format!("invalid nonce hex: {e}")))?;
    let ciphertext = hex::decode(&file.crypto.ciphertext)
        .map_err(|e| KinError::Keystore(format!("invalid ciphertext hex: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(KinError::Keystore(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            nonce_bytes.len()
        )));
    }

    let derived_key = derive_key(passphrase, &salt, &file.crypto.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&derived_key[..])
        .map_err(|e| KinError::Keystore(format!("AES key init failed: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| KinError::Authentication { index: file.index })?,
    );

    if plaintext.len() != KEY_LEN {
        return Err(KinError::Keystore(format!(
            "decrypted key has wrong length: expected {KEY_LEN}, got {}",
            plaintext.len()
        )));
    }
    let mut key = PrivateKey([0u8; KEY_LEN]);
    key.0.copy_from_slice(&plaintext);
    Ok(key)
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KinError> {
    let argon_params = Params::new(
        params.memory,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| KinError::Keystore(format!("Argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut output[..])
        .map_err(|e| KinError::Keystore(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address::from_bytes([3u8; 20])
    }

    fn encrypt(secret: [u8; 32], passphrase: &str) -> KeyFile {
        encrypt_key(&PrivateKey(secret), 4, address(), passphrase, KdfParams::light()).unwrap()
    }

    #[test]
    fn decrypts_with_correct_passphrase() {
        let file = encrypt([42u8; 32], "correct horse");
        let key = decrypt_key(&file, "correct horse").unwrap();
        assert_eq!(key.0, [42u8; 32]);
    }

    #[test]
    fn wrong_passphrase_is_authentication_error() {
        let file = encrypt([42u8; 32], "correct horse");
        let err = decrypt_key(&file, "battery staple").err().unwrap();
        assert!(matches!(err, KinError::Authentication { index: 4 }));
    }

    #[test]
    fn records_scheme_and_params() {
        let file = encrypt([0u8; 32], "pass");
        assert_eq!(file.version, KEY_FILE_VERSION);
        assert_eq!(file.crypto.cipher, "aes-256-gcm");
        assert_eq!(file.crypto.kdf, "argon2id");
        assert_eq!(file.crypto.kdf_params, KdfParams::light());
        assert_eq!(file.address, address());
    }

    #[test]
    fn json_does_not_contain_plaintext_key() {
        let file = encrypt([0xAB; 32], "pass");
        let json = serde_json::to_string(&file).unwrap();
        assert!(!json.contains(&hex::encode([0xABu8; 32])));
        assert!(json.contains("\"kdf\":\"argon2id\""));
    }

    #[test]
    fn salts_differ_between_encryptions() {
        let a = encrypt([7u8; 32], "pass");
        let b = encrypt([7u8; 32], "pass");
        assert_ne!(a.crypto.salt, b.crypto.salt);
        assert_ne!(a.crypto.ciphertext, b.crypto.ciphertext);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut file = encrypt([0u8; 32], "pass");
        file.version = 99;
        assert!(matches!(decrypt_key(&file, "pass"), Err(KinError::Keystore(_))));
    }

    #[test]
    fn corrupted_nonce_rejected() {
        let mut file = encrypt([0u8; 32], "pass");
        file.crypto.nonce = "00".to_string();
        assert!(matches!(decrypt_key(&file, "pass"), Err(KinError::Keystore(_))));
    }
}
