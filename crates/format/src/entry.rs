use chrono::{DateTime, Utc};
use myfs_types::{ALL_ONES, ENTRY_SIZE, MAX_FILENAME, ROOT_DIR_FIELD};
use snafu::ResultExt as _;
use zerocopy::*;

use crate::{Error, InvalidStatusSnafu, InvalidTimestampSnafu, expect_len, pack_ascii_field, unpack_ascii_field};

const DATE_FIELD_WIDTH: usize = 20;
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Liveness of an entry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Free,
    Live,
}

impl TryFrom<u8> for EntryStatus {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x00 => Ok(EntryStatus::Free),
            0x01 => Ok(EntryStatus::Live),
            other => InvalidStatusSnafu { byte: other }.fail(),
        }
    }
}

impl From<EntryStatus> for u8 {
    fn from(status: EntryStatus) -> u8 {
        match status {
            EntryStatus::Free => 0x00,
            EntryStatus::Live => 0x01,
        }
    }
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C, packed)]
struct EntryRaw {
    status: u8,
    first_block: U64<BigEndian>,
    filename: [u8; MAX_FILENAME],
    creation_date: [u8; DATE_FIELD_WIDTH],
    modification_date: [u8; DATE_FIELD_WIDTH],
    password_hash: [u8; 32],
    md5_hash: [u8; 16],
    encrypted_size: U64<BigEndian>,
    original_size: U64<BigEndian>,
    root_dir: [u8; ROOT_DIR_FIELD],
}

/// One entry-table slot describing a stored file (or a free slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub status: EntryStatus,
    /// Index of the first data block, or `None` when the entry is free or
    /// (transiently) an empty file.
    pub first_block: Option<u64>,
    pub filename: String,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    /// All-zero means "no per-file password set".
    pub password_hash: [u8; 32],
    pub md5_hash: [u8; 16],
    pub encrypted_size: u64,
    pub original_size: u64,
    pub root_dir: Option<String>,
}

impl Entry {
    pub const SIZE: usize = ENTRY_SIZE as usize;

    /// A free (unused) entry slot.
    pub fn free() -> Self {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            status: EntryStatus::Free,
            first_block: None,
            filename: String::new(),
            creation_date: now,
            modification_date: now,
            password_hash: [0; 32],
            md5_hash: [0; 16],
            encrypted_size: 0,
            original_size: 0,
            root_dir: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == EntryStatus::Live
    }

    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let filename = pack_ascii_field(&self.filename, MAX_FILENAME, "filename")?;
        let creation_date = pack_date_field(&self.creation_date);
        let modification_date = pack_date_field(&self.modification_date);
        let root_dir = match &self.root_dir {
            Some(path) => pack_ascii_field(path, ROOT_DIR_FIELD, "root_dir")?,
            None => vec![0u8; ROOT_DIR_FIELD],
        };

        let raw = EntryRaw {
            status: self.status.into(),
            first_block: U64::new(self.first_block.unwrap_or(ALL_ONES)),
            filename: filename.try_into().expect("width checked"),
            creation_date: creation_date.try_into().expect("width checked"),
            modification_date: modification_date.try_into().expect("width checked"),
            password_hash: self.password_hash,
            md5_hash: self.md5_hash,
            encrypted_size: U64::new(self.encrypted_size),
            original_size: U64::new(self.original_size),
            root_dir: root_dir.try_into().expect("width checked"),
        };
        Ok(raw.as_bytes().to_vec())
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        expect_len(data, Self::SIZE)?;
        let raw = EntryRaw::read_from_bytes(data).expect("length checked above");

        let first_block_raw = raw.first_block.get();
        let root_dir_bytes = &raw.root_dir;
        let root_dir = if root_dir_bytes.iter().all(|&b| b == 0) {
            None
        } else {
            Some(unpack_ascii_field(root_dir_bytes))
        };

        Ok(Self {
            status: EntryStatus::try_from(raw.status)?,
            first_block: (first_block_raw != ALL_ONES).then_some(first_block_raw),
            filename: unpack_ascii_field(&raw.filename),
            creation_date: unpack_date_field(&raw.creation_date, "creation_date")?,
            modification_date: unpack_date_field(&raw.modification_date, "modification_date")?,
            password_hash: raw.password_hash,
            md5_hash: raw.md5_hash,
            encrypted_size: raw.encrypted_size.get(),
            original_size: raw.original_size.get(),
            root_dir,
        })
    }
}

fn pack_date_field(date: &DateTime<Utc>) -> Vec<u8> {
    let text = date.format(DATE_FORMAT).to_string();
    let mut buf = vec![0u8; DATE_FIELD_WIDTH];
    buf[..text.len()].copy_from_slice(text.as_bytes());
    buf
}

fn unpack_date_field(data: &[u8], field: &'static str) -> Result<DateTime<Utc>, Error> {
    let text = unpack_ascii_field(data);
    let naive = chrono::NaiveDateTime::parse_from_str(&text, DATE_FORMAT).context(InvalidTimestampSnafu { field })?;
    Ok(naive.and_utc())
}
