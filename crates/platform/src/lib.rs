//! Host machine-binding metadata.
//!
//! The sidecar file next to a MyFS volume carries a small snapshot of the
//! host that created it. On open, the engine re-gathers this snapshot and
//! compares it against what's stored, refusing to mount the volume if they
//! disagree (see `myfs-engine`).

use std::process::Command;

use log::{debug, warn};
use myfs_crypto::{CryptoError, Key, aes_ecb_decrypt, aes_ecb_encrypt};
use myfs_types::SIDECAR_SIZE;
use snafu::{ResultExt as _, Snafu};

const FIELD_16: usize = 16;
const FIELD_64: usize = 64;

/// Errors decoding or decrypting the sidecar platform-metadata blob.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("sidecar blob is {got} bytes, expected {expected} after decryption"))]
    ShortRead { expected: usize, got: usize },

    #[snafu(display("sidecar field {field} contains non-ASCII bytes"))]
    InvalidAscii { field: &'static str },

    #[snafu(display("failed to encrypt sidecar: {source}"))]
    Encrypt { source: CryptoError },

    #[snafu(display("failed to decrypt sidecar: {source}"))]
    Decrypt { source: CryptoError },
}

/// A snapshot of host-identifying fields, plus the volume's access-password
/// hash (stored alongside it, not compared as part of machine identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMetadata {
    pub platform: String,
    pub arch: String,
    pub release: String,
    pub machine: String,
    pub processor: String,
    /// SHA-256 of the volume access password, or all-zero when unset.
    pub myfs_password_hash: [u8; 32],
}

impl PlatformMetadata {
    /// Gathers a snapshot of the current host.
    pub fn current(myfs_password_hash: [u8; 32]) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: format!("{}bit", pointer_width_bits()),
            release: uname_field("-r").unwrap_or_else(|| "unknown".to_string()),
            machine: uname_field("-m").unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            processor: uname_field("-v").unwrap_or_else(|| "unknown".to_string()),
            myfs_password_hash,
        }
    }

    /// Equality over host-identifying fields only; excludes the password
    /// hash, matching the original `PlatformMetadata.__eq__`.
    pub fn host_matches(&self, other: &PlatformMetadata) -> bool {
        self.platform == other.platform
            && self.arch == other.arch
            && self.release == other.release
            && self.machine == other.machine
            && self.processor == other.processor
    }

    /// The host-identifying fields only, packed without the password hash.
    /// This is what `machine_hash` is computed over, so that an access-
    /// password change (which rewrites the sidecar's password hash) never
    /// invalidates the volume's machine binding.
    pub fn host_fingerprint_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIDECAR_SIZE - 32);
        out.extend(pack_field(&self.platform, FIELD_16));
        out.extend(pack_field(&self.arch, FIELD_16));
        out.extend(pack_field(&self.release, FIELD_16));
        out.extend(pack_field(&self.machine, FIELD_16));
        out.extend(pack_field(&self.processor, FIELD_64));
        out
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SIDECAR_SIZE);
        out.extend(pack_field(&self.platform, FIELD_16));
        out.extend(pack_field(&self.arch, FIELD_16));
        out.extend(pack_field(&self.release, FIELD_16));
        out.extend(pack_field(&self.machine, FIELD_16));
        out.extend(pack_field(&self.processor, FIELD_64));
        out.extend(self.myfs_password_hash);
        out
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != SIDECAR_SIZE {
            return ShortReadSnafu {
                expected: SIDECAR_SIZE,
                got: data.len(),
            }
            .fail();
        }
        let mut offset = 0;
        let platform = unpack_field(&data[offset..offset + FIELD_16], "platform")?;
        offset += FIELD_16;
        let arch = unpack_field(&data[offset..offset + FIELD_16], "arch")?;
        offset += FIELD_16;
        let release = unpack_field(&data[offset..offset + FIELD_16], "release")?;
        offset += FIELD_16;
        let machine = unpack_field(&data[offset..offset + FIELD_16], "machine")?;
        offset += FIELD_16;
        let processor = unpack_field(&data[offset..offset + FIELD_64], "processor")?;
        offset += FIELD_64;
        let mut myfs_password_hash = [0u8; 32];
        myfs_password_hash.copy_from_slice(&data[offset..offset + 32]);

        Ok(Self {
            platform,
            arch,
            release,
            machine,
            processor,
            myfs_password_hash,
        })
    }

    /// Encrypts the packed metadata under `key` (AES-ECB/PKCS#7).
    pub fn encrypt(&self, key: &Key) -> Result<Vec<u8>, Error> {
        aes_ecb_encrypt(key, &self.pack()).context(EncryptSnafu)
    }

    /// Decrypts and unpacks a sidecar blob produced by [`PlatformMetadata::encrypt`].
    pub fn decrypt(key: &Key, blob: &[u8]) -> Result<Self, Error> {
        let packed = aes_ecb_decrypt(key, blob).context(DecryptSnafu)?;
        Self::unpack(&packed)
    }
}

fn pack_field(value: &str, width: usize) -> Vec<u8> {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    let mut buf = vec![0u8; width];
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn unpack_field(data: &[u8], field: &'static str) -> Result<String, Error> {
    let trimmed = data.split(|&b| b == 0).next().unwrap_or(data);
    if !trimmed.is_ascii() {
        return InvalidAsciiSnafu { field }.fail();
    }
    Ok(String::from_utf8_lossy(trimmed).into_owned())
}

fn uname_field(flag: &str) -> Option<String> {
    let output = match Command::new("uname").arg(flag).output() {
        Ok(output) => output,
        Err(err) => {
            warn!("failed to run `uname {flag}`: {err}");
            return None;
        }
    };
    if !output.status.success() {
        warn!("`uname {flag}` exited with {}", output.status);
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        debug!("`uname {flag}` produced empty output");
        return None;
    }
    Some(text)
}

fn pointer_width_bits() -> u32 {
    (std::mem::size_of::<usize>() * 8) as u32
}
