//! The MyFS volume engine.
//!
//! Owns the on-disk volume file and its sidecar metadata file, and exposes
//! the file-level operations (`add_file`, `export_file`, `delete_file`,
//! `reset_password`) plus the volume-level access-password and listing
//! operations. The volume and sidecar file handles are opened and closed
//! per operation; nothing is cached across calls except the superblock
//! (immutable after creation), matching the single-threaded, no-caching
//! resource model the format is specified under.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use myfs_crypto::{self as crypto, Key};
use myfs_format::{BlockStatus, DataBlock, Entry, EntryStatus, EntryTable, Superblock};
use myfs_platform::PlatformMetadata;
use myfs_types::{BACKUP_ENTRY_TABLE_OFFSET, DATA_BLOCK_SIZE, DATA_PAYLOAD_PER_BLOCK, DATA_TABLE_OFFSET, MAIN_ENTRY_TABLE_OFFSET};

const ZERO_HASH: [u8; 32] = [0u8; 32];

/// Errors produced by volume operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("volume format error: {0}")]
    Format(#[from] myfs_format::Error),
    #[error("platform metadata error: {0}")]
    Platform(#[from] myfs_platform::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] myfs_crypto::CryptoError),
    #[error("sidecar metadata file not found next to the volume")]
    MissingSidecar,
    #[error("this volume was created on a different machine")]
    MetadataMismatch,
    #[error("password does not match")]
    AuthError,
    #[error("no free entry slots remain in either entry table")]
    NoFreeEntry,
    #[error("file {0:?} not found")]
    NotFound(String),
    #[error("file {0:?} has no password set")]
    NoPassword(String),
    #[error("no export destination: no export path given and the entry has no recorded source path")]
    NoDestination,
    #[error("integrity check failed: decrypted content does not match the stored MD5")]
    IntegrityError,
}

/// An owned snapshot of a live entry, returned by [`Volume::list_files`].
/// Later mutation of the volume does not retroactively change a snapshot
/// already handed to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub filename: String,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    pub original_size: u64,
    pub encrypted_size: u64,
    pub has_password: bool,
    pub root_dir: Option<String>,
}

impl From<&Entry> for EntrySnapshot {
    fn from(entry: &Entry) -> Self {
        Self {
            filename: entry.filename.clone(),
            creation_date: entry.creation_date,
            modification_date: entry.modification_date,
            original_size: entry.original_size,
            encrypted_size: entry.encrypted_size,
            has_password: entry.password_hash != ZERO_HASH,
            root_dir: entry.root_dir.clone(),
        }
    }
}

/// A handle to an open MyFS volume.
pub struct Volume {
    file_path: PathBuf,
    metadata_path: PathBuf,
    superblock: Superblock,
}

impl Volume {
    /// Opens an existing volume, or initializes a fresh one if `file_path`
    /// doesn't exist yet.
    ///
    /// `access_password` only takes effect on initialization, where it
    /// becomes the volume's access password. Opening an *existing* volume
    /// never checks it — callers that need to gate access on open should
    /// call [`Volume::is_password_match`] explicitly, the same separation
    /// the format's own access-password check keeps.
    pub fn open(
        file_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
        access_password: Option<&str>,
    ) -> Result<Self, EngineError> {
        let file_path = file_path.as_ref().to_path_buf();
        let metadata_path = metadata_path.as_ref().to_path_buf();

        if !file_path.exists() {
            return Self::initialize(file_path, metadata_path, access_password);
        }

        let superblock = Superblock::unpack(&read_at(&file_path, 0, Superblock::SIZE)?)?;

        if !metadata_path.exists() {
            warn!("sidecar metadata file missing at {}", metadata_path.display());
            return Err(EngineError::MissingSidecar);
        }
        let key: Key = superblock.metadata_key.to_vec().into();
        let on_disk_sidecar = PlatformMetadata::decrypt(&key, &fs::read(&metadata_path)?)?;

        if crypto::sha256(&on_disk_sidecar.host_fingerprint_bytes()) != superblock.machine_hash {
            warn!("machine hash mismatch opening {}", file_path.display());
            return Err(EngineError::MetadataMismatch);
        }
        let current = PlatformMetadata::current(on_disk_sidecar.myfs_password_hash);
        if !on_disk_sidecar.host_matches(&current) {
            warn!("host fingerprint mismatch opening {}", file_path.display());
            return Err(EngineError::MetadataMismatch);
        }

        debug!("opened volume at {}", file_path.display());
        Ok(Self {
            file_path,
            metadata_path,
            superblock,
        })
    }

    fn initialize(file_path: PathBuf, metadata_path: PathBuf, access_password: Option<&str>) -> Result<Self, EngineError> {
        let metadata_key: [u8; 32] = crypto::random_bytes(32).try_into().expect("random_bytes(32) returns 32 bytes");

        let password_hash = match access_password {
            Some(pw) if !pw.is_empty() => crypto::sha256(pw.as_bytes()),
            _ => ZERO_HASH,
        };
        let sidecar = PlatformMetadata::current(password_hash);
        let machine_hash = crypto::sha256(&sidecar.host_fingerprint_bytes());
        let superblock = Superblock::new(metadata_key, machine_hash);

        let mut volume_file = File::create(&file_path)?;
        volume_file.write_all(&superblock.pack())?;
        let empty_table = EntryTable::empty().pack()?;
        volume_file.write_all(&empty_table)?; // main
        volume_file.write_all(&empty_table)?; // backup
        drop(volume_file);

        let key: Key = metadata_key.to_vec().into();
        fs::write(&metadata_path, sidecar.encrypt(&key)?)?;

        info!("initialized new MyFS volume at {}", file_path.display());
        Ok(Self {
            file_path,
            metadata_path,
            superblock,
        })
    }

    fn load_sidecar(&self) -> Result<PlatformMetadata, EngineError> {
        let key: Key = self.superblock.metadata_key.to_vec().into();
        Ok(PlatformMetadata::decrypt(&key, &fs::read(&self.metadata_path)?)?)
    }

    /// True when `password` matches the volume's access password, or the
    /// volume has none set.
    pub fn is_password_match(&self, password: &str) -> Result<bool, EngineError> {
        let sidecar = self.load_sidecar()?;
        Ok(sidecar.myfs_password_hash == ZERO_HASH || sidecar.myfs_password_hash == crypto::sha256(password.as_bytes()))
    }

    /// Changes the volume access password. The sidecar is always
    /// re-encrypted under the superblock's `metadata_key`, never under a
    /// key derived from the access password.
    pub fn change_access_password(&self, old: &str, new: &str) -> Result<(), EngineError> {
        if !self.is_password_match(old)? {
            warn!("access password change rejected: old password mismatch");
            return Err(EngineError::AuthError);
        }
        let mut sidecar = self.load_sidecar()?;
        sidecar.myfs_password_hash = if new.is_empty() { ZERO_HASH } else { crypto::sha256(new.as_bytes()) };

        let key: Key = self.superblock.metadata_key.to_vec().into();
        fs::write(&self.metadata_path, sidecar.encrypt(&key)?)?;
        info!("access password changed");
        Ok(())
    }

    /// Live entries from the main table, or from the backup table when the
    /// main table has none (corruption fallback).
    pub fn list_files(&self) -> Result<Vec<EntrySnapshot>, EngineError> {
        let main = read_table(&self.file_path, MAIN_ENTRY_TABLE_OFFSET)?;
        let live: Vec<EntrySnapshot> = main.entries.iter().filter(|e| e.is_live()).map(EntrySnapshot::from).collect();
        if !live.is_empty() {
            return Ok(live);
        }
        let backup = read_table(&self.file_path, BACKUP_ENTRY_TABLE_OFFSET)?;
        Ok(backup.entries.iter().filter(|e| e.is_live()).map(EntrySnapshot::from).collect())
    }

    /// Adds `source_path`'s contents to the volume under `name_in_volume`.
    pub fn add_file(&self, source_path: impl AsRef<Path>, name_in_volume: &str, file_password: Option<&str>) -> Result<(), EngineError> {
        let source_path = source_path.as_ref();
        let idx = find_free_slot(&self.file_path)?;

        let plaintext = fs::read(source_path)?;
        let original_size = plaintext.len() as u64;
        let md5_hash = crypto::md5(&plaintext);

        let (password_hash, ciphertext) = match file_password {
            Some(pw) if !pw.is_empty() => {
                let hash = crypto::sha256(pw.as_bytes());
                let key = crypto::derive_key(&hash);
                (hash, crypto::aes_ecb_encrypt(&key, &plaintext)?)
            }
            _ => (ZERO_HASH, plaintext),
        };
        let encrypted_size = ciphertext.len() as u64;
        let first_block = write_chunked(&self.file_path, &ciphertext)?;

        let now = Utc::now();
        // Lexical absolute path (no symlink resolution, no existence check),
        // matching the original's `os.path.abspath`. Unlike `canonicalize`,
        // this can't silently fall back to a relative path on failure.
        let root_dir = std::path::absolute(source_path).ok().and_then(|p| p.to_str().map(str::to_string));

        let entry = Entry {
            status: EntryStatus::Live,
            first_block,
            filename: name_in_volume.to_string(),
            creation_date: now,
            modification_date: now,
            password_hash,
            md5_hash,
            encrypted_size,
            original_size,
            root_dir,
        };
        persist_entry_at(&self.file_path, idx, entry)?;
        info!("added {name_in_volume:?} ({original_size} bytes)");
        Ok(())
    }

    /// Decrypts (if needed), integrity-checks, and writes out a stored file.
    pub fn export_file(&self, name: &str, export_path: Option<&Path>, password: Option<&str>) -> Result<(), EngineError> {
        let (_, entry) = find_live_entry(&self.file_path, name)?;

        let key = if entry.password_hash != ZERO_HASH {
            let password = password.ok_or(EngineError::AuthError)?;
            if crypto::sha256(password.as_bytes()) != entry.password_hash {
                warn!("export of {name:?} rejected: wrong password");
                return Err(EngineError::AuthError);
            }
            Some(crypto::derive_key(&entry.password_hash))
        } else {
            None
        };

        let stored = read_chain(&self.file_path, entry.first_block, entry.encrypted_size)?;
        let plaintext = match &key {
            Some(k) => crypto::aes_ecb_decrypt(k, &stored)?,
            None => stored,
        };

        if crypto::md5(&plaintext) != entry.md5_hash {
            warn!("integrity check failed exporting {name:?}");
            return Err(EngineError::IntegrityError);
        }

        let destination = match export_path {
            Some(p) => p.to_path_buf(),
            None => entry.root_dir.as_ref().map(PathBuf::from).ok_or(EngineError::NoDestination)?,
        };
        fs::write(&destination, &plaintext)?;

        let atime = filetime::FileTime::from_unix_time(entry.creation_date.timestamp(), 0);
        let mtime = filetime::FileTime::from_unix_time(entry.modification_date.timestamp(), 0);
        filetime::set_file_times(&destination, atime, mtime)?;

        info!("exported {name:?} to {}", destination.display());
        Ok(())
    }

    /// Frees an entry's data blocks and marks the entry free. Blocks are not
    /// zeroed; the payload stays recoverable until reallocated, a documented
    /// trade-off rather than a bug.
    ///
    /// The entry is marked free before its chain is freed, so a failure
    /// between the two steps leaves an orphaned (but still-live-looking)
    /// block chain rather than a live entry pointing at freed blocks.
    pub fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let (idx, entry) = find_live_entry(&self.file_path, name)?;
        persist_entry_at(&self.file_path, idx, Entry::free())?;
        free_chain(&self.file_path, entry.first_block)?;
        info!("deleted {name:?}");
        Ok(())
    }

    /// Re-encrypts a file's content under a new password, reusing the same
    /// entry but allocating a fresh block chain.
    pub fn reset_password(&self, name: &str, old: &str, new: &str) -> Result<(), EngineError> {
        let (idx, entry) = find_live_entry(&self.file_path, name)?;
        if entry.password_hash == ZERO_HASH {
            return Err(EngineError::NoPassword(name.to_string()));
        }
        if crypto::sha256(old.as_bytes()) != entry.password_hash {
            warn!("reset_password rejected for {name:?}: old password mismatch");
            return Err(EngineError::AuthError);
        }

        let old_key = crypto::derive_key(&entry.password_hash);
        let new_hash = crypto::sha256(new.as_bytes());
        let new_key = crypto::derive_key(&new_hash);

        let stored = read_chain(&self.file_path, entry.first_block, entry.encrypted_size)?;
        let plaintext = crypto::aes_ecb_decrypt(&old_key, &stored)?;
        let new_ciphertext = crypto::aes_ecb_encrypt(&new_key, &plaintext)?;
        let new_encrypted_size = new_ciphertext.len() as u64;

        // Write the new chain and persist the entry before freeing the old
        // chain, so a failure partway through never leaves the live entry
        // pointing at blocks that have already been marked free.
        let new_first_block = write_chunked(&self.file_path, &new_ciphertext)?;

        let old_first_block = entry.first_block;
        let mut updated = entry;
        updated.first_block = new_first_block;
        updated.password_hash = new_hash;
        updated.encrypted_size = new_encrypted_size;
        updated.modification_date = Utc::now();
        persist_entry_at(&self.file_path, idx, updated)?;

        free_chain(&self.file_path, old_first_block)?;

        info!("reset password for {name:?}");
        Ok(())
    }
}

fn read_at(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, EngineError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_at(path: &Path, offset: u64, data: &[u8]) -> Result<(), EngineError> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

fn read_table(path: &Path, offset: u64) -> Result<EntryTable, EngineError> {
    Ok(EntryTable::unpack(&read_at(path, offset, EntryTable::SIZE)?)?)
}

fn write_table(path: &Path, offset: u64, table: &EntryTable) -> Result<(), EngineError> {
    write_at(path, offset, &table.pack()?)
}

/// Writes `entry` into both the main and backup tables at `idx`, keeping
/// them as true mirrors of each other.
fn persist_entry_at(path: &Path, idx: usize, entry: Entry) -> Result<(), EngineError> {
    let mut main = read_table(path, MAIN_ENTRY_TABLE_OFFSET)?;
    main.entries[idx] = entry.clone();
    write_table(path, MAIN_ENTRY_TABLE_OFFSET, &main)?;

    let mut backup = read_table(path, BACKUP_ENTRY_TABLE_OFFSET)?;
    backup.entries[idx] = entry;
    write_table(path, BACKUP_ENTRY_TABLE_OFFSET, &backup)?;
    Ok(())
}

/// Finds a live entry by name, checking the main table first and the
/// backup table only as a corruption fallback (under normal operation the
/// two are kept identical, so the fallback rarely triggers).
fn find_live_entry(path: &Path, name: &str) -> Result<(usize, Entry), EngineError> {
    let main = read_table(path, MAIN_ENTRY_TABLE_OFFSET)?;
    if let Some(idx) = main.entries.iter().position(|e| e.is_live() && e.filename == name) {
        return Ok((idx, main.entries[idx].clone()));
    }
    let backup = read_table(path, BACKUP_ENTRY_TABLE_OFFSET)?;
    if let Some(idx) = backup.entries.iter().position(|e| e.is_live() && e.filename == name) {
        return Ok((idx, backup.entries[idx].clone()));
    }
    Err(EngineError::NotFound(name.to_string()))
}

fn find_free_slot(path: &Path) -> Result<usize, EngineError> {
    let main = read_table(path, MAIN_ENTRY_TABLE_OFFSET)?;
    if let Some(idx) = main.entries.iter().position(|e| !e.is_live()) {
        return Ok(idx);
    }
    let backup = read_table(path, BACKUP_ENTRY_TABLE_OFFSET)?;
    if let Some(idx) = backup.entries.iter().position(|e| !e.is_live()) {
        return Ok(idx);
    }
    Err(EngineError::NoFreeEntry)
}

fn block_count(path: &Path) -> Result<u64, EngineError> {
    let len = fs::metadata(path)?.len();
    if len <= DATA_TABLE_OFFSET {
        return Ok(0);
    }
    Ok((len - DATA_TABLE_OFFSET) / DATA_BLOCK_SIZE)
}

/// Scans the data-block region from its start for the first free or
/// tombstoned block, re-reading on-disk state fresh each call so
/// back-to-back allocations within one operation never collide.
fn find_free_block(path: &Path) -> Result<u64, EngineError> {
    let count = block_count(path)?;
    let mut file = File::open(path)?;
    for idx in 0..count {
        file.seek(SeekFrom::Start(DATA_TABLE_OFFSET + idx * DATA_BLOCK_SIZE))?;
        let mut status = [0u8; 1];
        file.read_exact(&mut status)?;
        if matches!(status[0], 0x00 | 0x02) {
            return Ok(idx);
        }
    }
    Ok(count)
}

fn read_block(path: &Path, idx: u64) -> Result<DataBlock, EngineError> {
    Ok(DataBlock::unpack(&read_at(path, DATA_TABLE_OFFSET + idx * DATA_BLOCK_SIZE, DataBlock::SIZE)?)?)
}

fn write_block(path: &Path, idx: u64, block: &DataBlock) -> Result<(), EngineError> {
    write_at(path, DATA_TABLE_OFFSET + idx * DATA_BLOCK_SIZE, &block.pack())
}

/// Chops `data` into `DATA_PAYLOAD_PER_BLOCK`-byte chunks, allocates and
/// writes a block per chunk, links them in order, and returns the first
/// block's index (`None` for empty data).
fn write_chunked(path: &Path, data: &[u8]) -> Result<Option<u64>, EngineError> {
    if data.is_empty() {
        return Ok(None);
    }

    let mut indices = Vec::new();
    for chunk in data.chunks(DATA_PAYLOAD_PER_BLOCK) {
        let idx = find_free_block(path)?;
        write_block(path, idx, &DataBlock::new(chunk, None))?;
        indices.push(idx);
    }

    for pair in indices.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let mut block = read_block(path, current)?;
        block.next_block = Some(next);
        write_block(path, current, &block)?;
    }

    Ok(Some(indices[0]))
}

/// Walks a block chain from `first_block`, concatenating full block
/// payloads and truncating to `encrypted_size` (the authoritative length —
/// trailing zero padding inside the last block is not otherwise
/// distinguishable from real zero bytes in the payload).
fn read_chain(path: &Path, first_block: Option<u64>, encrypted_size: u64) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::with_capacity(encrypted_size as usize);
    let mut current = first_block;
    while let Some(idx) = current {
        let block = read_block(path, idx)?;
        out.extend_from_slice(&block.content);
        current = block.next_block;
    }
    out.truncate(encrypted_size as usize);
    Ok(out)
}

/// Marks every block in a chain free without zeroing its content.
fn free_chain(path: &Path, first_block: Option<u64>) -> Result<(), EngineError> {
    let mut current = first_block;
    while let Some(idx) = current {
        let mut block = read_block(path, idx)?;
        let next = block.next_block;
        block.status = BlockStatus::Free;
        write_block(path, idx, &block)?;
        current = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let volume = dir.path().join("volume.ivf");
        let sidecar = dir.path().join("metadata.ivf");
        (dir, volume, sidecar)
    }

    #[test_log::test]
    fn initializes_fresh_volume_with_no_files() {
        let (_dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, Some("hunter2")).unwrap();
        assert!(vol.list_files().unwrap().is_empty());
        assert!(vol.is_password_match("hunter2").unwrap());
        assert!(!vol.is_password_match("wrong").unwrap());
    }

    #[test_log::test]
    fn reopening_an_existing_volume_preserves_state() {
        let (dir, volume, sidecar) = paths();
        {
            let vol = Volume::open(&volume, &sidecar, None).unwrap();
            let source = dir.path().join("a.txt");
            fs::write(&source, b"hello world").unwrap();
            vol.add_file(&source, "a.txt", None).unwrap();
        }
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let files = vol.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[0].original_size, 11);
    }

    #[test_log::test]
    fn add_and_export_round_trips_without_password() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"the quick brown fox").unwrap();
        vol.add_file(&source, "a.txt", None).unwrap();

        let export = dir.path().join("out.txt");
        vol.export_file("a.txt", Some(&export), None).unwrap();
        assert_eq!(fs::read(&export).unwrap(), b"the quick brown fox");
    }

    #[test_log::test]
    fn add_and_export_round_trips_with_password() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("secret.txt");
        fs::write(&source, b"top secret payload, spanning more than one block would also work fine")
            .unwrap();
        vol.add_file(&source, "secret.txt", Some("filepw")).unwrap();

        let export = dir.path().join("out.txt");
        assert!(matches!(
            vol.export_file("secret.txt", Some(&export), None),
            Err(EngineError::AuthError)
        ));
        assert!(matches!(
            vol.export_file("secret.txt", Some(&export), Some("wrong")),
            Err(EngineError::AuthError)
        ));
        vol.export_file("secret.txt", Some(&export), Some("filepw")).unwrap();
        assert_eq!(
            fs::read(&export).unwrap(),
            b"top secret payload, spanning more than one block would also work fine"
        );
    }

    #[test_log::test]
    fn add_file_spanning_multiple_blocks_round_trips() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("big.bin");
        let payload = vec![0x5Au8; myfs_types::DATA_PAYLOAD_PER_BLOCK * 3 + 17];
        fs::write(&source, &payload).unwrap();
        vol.add_file(&source, "big.bin", None).unwrap();

        let export = dir.path().join("big.out");
        vol.export_file("big.bin", Some(&export), None).unwrap();
        assert_eq!(fs::read(&export).unwrap(), payload);
    }

    #[test_log::test]
    fn delete_then_export_fails_not_found() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"data").unwrap();
        vol.add_file(&source, "a.txt", None).unwrap();
        vol.delete_file("a.txt").unwrap();

        assert!(vol.list_files().unwrap().is_empty());
        assert!(matches!(
            vol.export_file("a.txt", Some(&dir.path().join("out")), None),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test_log::test]
    fn reset_password_reencrypts_and_preserves_content() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"reset me please").unwrap();
        vol.add_file(&source, "a.txt", Some("oldpw")).unwrap();

        vol.reset_password("a.txt", "oldpw", "newpw").unwrap();

        let export = dir.path().join("out.txt");
        assert!(matches!(
            vol.export_file("a.txt", Some(&export), Some("oldpw")),
            Err(EngineError::AuthError)
        ));
        vol.export_file("a.txt", Some(&export), Some("newpw")).unwrap();
        assert_eq!(fs::read(&export).unwrap(), b"reset me please");
    }

    #[test_log::test]
    fn reset_password_without_existing_password_is_rejected() {
        let (dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, None).unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"data").unwrap();
        vol.add_file(&source, "a.txt", None).unwrap();

        assert!(matches!(
            vol.reset_password("a.txt", "", "newpw"),
            Err(EngineError::NoPassword(_))
        ));
    }

    #[test_log::test]
    fn change_access_password_requires_old_password() {
        let (_dir, volume, sidecar) = paths();
        let vol = Volume::open(&volume, &sidecar, Some("oldpw")).unwrap();
        assert!(matches!(
            vol.change_access_password("wrong", "newpw"),
            Err(EngineError::AuthError)
        ));
        vol.change_access_password("oldpw", "newpw").unwrap();
        assert!(vol.is_password_match("newpw").unwrap());
        assert!(!vol.is_password_match("oldpw").unwrap());
    }

    #[test_log::test]
    fn reopening_after_password_change_still_succeeds() {
        let (_dir, volume, sidecar) = paths();
        {
            let vol = Volume::open(&volume, &sidecar, Some("oldpw")).unwrap();
            vol.change_access_password("oldpw", "newpw").unwrap();
        }
        let vol = Volume::open(&volume, &sidecar, Some("newpw")).unwrap();
        assert!(vol.is_password_match("newpw").unwrap());
    }

    #[test_log::test]
    fn opening_without_sidecar_fails() {
        let (dir, volume, sidecar) = paths();
        {
            Volume::open(&volume, &sidecar, None).unwrap();
        }
        fs::remove_file(&sidecar).unwrap();
        assert!(matches!(Volume::open(&volume, &sidecar, None), Err(EngineError::MissingSidecar)));
        let _ = dir;
    }

    #[test_log::test]
    fn tampering_with_machine_hash_is_detected() {
        let (dir, volume, sidecar) = paths();
        {
            Volume::open(&volume, &sidecar, None).unwrap();
        }
        let mut bytes = fs::read(&volume).unwrap();
        bytes[56] ^= 0xFF; // inside machine_hash
        fs::write(&volume, bytes).unwrap();
        assert!(matches!(Volume::open(&volume, &sidecar, None), Err(EngineError::MetadataMismatch)));
        let _ = dir;
    }
}
