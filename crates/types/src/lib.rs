//! On-disk layout constants for the MyFS volume format.
//!
//! These are pinned by the format itself: changing any of them breaks
//! compatibility with every volume already written to disk.

/// Size in bytes of the superblock at offset 0.
pub const VOLUME_INFO_SIZE: u64 = 88;
/// Size in bytes of one entry record.
pub const ENTRY_SIZE: u64 = 401;
/// Number of entry records in the main table and in the backup table.
pub const ENTRY_TABLE_SIZE: usize = 100;
/// Size in bytes of one data block, including its status byte and link.
pub const DATA_BLOCK_SIZE: u64 = 4096;
/// Maximum payload bytes carried by a single data block.
pub const DATA_PAYLOAD_PER_BLOCK: usize = 4087;
/// Maximum length of a filename stored in an entry.
pub const MAX_FILENAME: usize = 32;
/// Width of the `root_dir` field in an entry.
pub const ROOT_DIR_FIELD: usize = 256;
/// Sentinel value meaning "no next block" / "no first block".
pub const ALL_ONES: u64 = u64::MAX;

/// Length of the even-hour SmartOTP epoch, in seconds.
pub const OTP_EPOCH_SECONDS: u64 = 7200;

/// PBKDF2 iteration count pinned by the on-disk format. Weak by modern
/// standards; kept for compatibility with existing volumes (see DESIGN.md).
pub const PBKDF2_ITER: u32 = 10;
/// PBKDF2 salt pinned by the on-disk format.
pub const PBKDF2_SALT: &[u8] = b"IVOLFILESYSTEM";

/// Offset of the main entry table.
pub const MAIN_ENTRY_TABLE_OFFSET: u64 = VOLUME_INFO_SIZE;
/// Offset of the backup entry table.
pub const BACKUP_ENTRY_TABLE_OFFSET: u64 = VOLUME_INFO_SIZE + ENTRY_SIZE * ENTRY_TABLE_SIZE as u64;
/// Offset of the first data block.
pub const DATA_TABLE_OFFSET: u64 = BACKUP_ENTRY_TABLE_OFFSET + ENTRY_SIZE * ENTRY_TABLE_SIZE as u64;

/// Superblock signature, right-padded with zero bytes to 8 bytes on disk.
pub const SIGNATURE: &[u8] = b"IVOLFILE";

/// Size in bytes of the encrypted sidecar platform-metadata file.
pub const SIDECAR_SIZE: usize = 160;
