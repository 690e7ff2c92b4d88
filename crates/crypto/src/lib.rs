//! Crypto primitives backing the MyFS volume format.
//!
//! Every function here is a pure transform over byte buffers; none of them
//! touch the filesystem. The primitive suite (SHA-256, MD5, PBKDF2-HMAC-SHA1,
//! AES-ECB/PKCS#7) is pinned by the on-disk format, not chosen for strength —
//! see the workspace DESIGN.md for the tradeoffs this locks in.

use aes::{Aes128, Aes192, Aes256};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, block_padding::Pkcs7};
use ecb::{Decryptor, Encryptor};
use md5::{Digest as _, Md5};
use myfs_types::{PBKDF2_ITER, PBKDF2_SALT};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors produced while encrypting or decrypting with the volume's AES suite.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext is not block-aligned")]
    Unaligned,
    /// PKCS#7 padding was absent or malformed on decrypt.
    #[error("invalid PKCS#7 padding")]
    InvalidPadding,
    /// The key length doesn't correspond to AES-128/192/256.
    #[error("unsupported AES key length: {0} bytes")]
    UnsupportedKeyLength(usize),
}

/// A derived AES key. Zeroized on drop so key material doesn't linger in
/// memory past the operation that needed it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key(Vec<u8>);

impl Key {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Key {
    fn from(value: Vec<u8>) -> Self {
        Key(value)
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// MD5 of `data`. Used only for the format's plaintext integrity checksum,
/// never for anything security-sensitive.
pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derives the 32-byte AES key used to encrypt a file's or the sidecar's
/// payload from the SHA-256 of a password, via PBKDF2-HMAC-SHA1 with the
/// format's fixed salt and iteration count.
pub fn derive_key(password_sha256: &[u8; 32]) -> Key {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha1>(password_sha256, PBKDF2_SALT, PBKDF2_ITER, &mut out);
    Key(out.to_vec())
}

/// Encrypts `plaintext` under `key` using AES-ECB with PKCS#7 padding.
/// `key.len()` selects AES-128/192/256.
pub fn aes_ecb_encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    macro_rules! encrypt_with {
        ($cipher:ty) => {
            Encryptor::<$cipher>::new_from_slice(key.as_bytes())
                .map_err(|_| CryptoError::UnsupportedKeyLength(key.as_bytes().len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
        };
    }
    Ok(match key.as_bytes().len() {
        16 => encrypt_with!(Aes128),
        24 => encrypt_with!(Aes192),
        32 => encrypt_with!(Aes256),
        other => return Err(CryptoError::UnsupportedKeyLength(other)),
    })
}

/// Decrypts `ciphertext` under `key`, stripping PKCS#7 padding.
pub fn aes_ecb_decrypt(key: &Key, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    macro_rules! decrypt_with {
        ($cipher:ty) => {
            Decryptor::<$cipher>::new_from_slice(key.as_bytes())
                .map_err(|_| CryptoError::UnsupportedKeyLength(key.as_bytes().len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| CryptoError::InvalidPadding)?
        };
    }
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CryptoError::Unaligned);
    }
    Ok(match key.as_bytes().len() {
        16 => decrypt_with!(Aes128),
        24 => decrypt_with!(Aes192),
        32 => decrypt_with!(Aes256),
        other => return Err(CryptoError::UnsupportedKeyLength(other)),
    })
}

/// `n` cryptographically strong random bytes.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}
