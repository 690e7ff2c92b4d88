use myfs_types::{ALL_ONES, DATA_BLOCK_SIZE, DATA_PAYLOAD_PER_BLOCK};
use zerocopy::*;

use crate::{Error, InvalidStatusSnafu, expect_len};

/// Liveness of a data block slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Free, or tombstoned (0x02) — both are reusable by allocation.
    Free,
    Live,
}

impl TryFrom<u8> for BlockStatus {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x00 | 0x02 => Ok(BlockStatus::Free),
            0x01 => Ok(BlockStatus::Live),
            other => InvalidStatusSnafu { byte: other }.fail(),
        }
    }
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone)]
#[repr(C, packed)]
struct DataBlockRaw {
    status: u8,
    next_block: U64<BigEndian>,
    content: [u8; DATA_PAYLOAD_PER_BLOCK],
}

/// One 4096-byte data block: a status byte, a link to the next block in the
/// chain, and up to 4087 bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub status: BlockStatus,
    pub next_block: Option<u64>,
    /// Exactly `DATA_PAYLOAD_PER_BLOCK` bytes; trailing bytes beyond the
    /// meaningful payload are zero.
    pub content: Vec<u8>,
}

impl DataBlock {
    pub const SIZE: usize = DATA_BLOCK_SIZE as usize;

    /// Builds an in-use block from a chunk of payload, zero-padding it to
    /// the block's fixed content width.
    pub fn new(chunk: &[u8], next_block: Option<u64>) -> Self {
        assert!(chunk.len() <= DATA_PAYLOAD_PER_BLOCK, "chunk exceeds block payload width");
        let mut content = vec![0u8; DATA_PAYLOAD_PER_BLOCK];
        content[..chunk.len()].copy_from_slice(chunk);
        Self {
            status: BlockStatus::Live,
            next_block,
            content,
        }
    }

    /// A free block, used when growing the file to allocate past EOF.
    pub fn free() -> Self {
        Self {
            status: BlockStatus::Free,
            next_block: None,
            content: vec![0u8; DATA_PAYLOAD_PER_BLOCK],
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut content = [0u8; DATA_PAYLOAD_PER_BLOCK];
        let n = self.content.len().min(DATA_PAYLOAD_PER_BLOCK);
        content[..n].copy_from_slice(&self.content[..n]);
        let raw = DataBlockRaw {
            status: match self.status {
                BlockStatus::Free => 0x00,
                BlockStatus::Live => 0x01,
            },
            next_block: U64::new(self.next_block.unwrap_or(ALL_ONES)),
            content,
        };
        raw.as_bytes().to_vec()
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        expect_len(data, Self::SIZE)?;
        let raw = DataBlockRaw::read_from_bytes(data).expect("length checked above");
        let next_block_raw = raw.next_block.get();
        Ok(Self {
            status: BlockStatus::try_from(raw.status)?,
            next_block: (next_block_raw != ALL_ONES).then_some(next_block_raw),
            content: raw.content.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn round_trips_full_block() {
        let block = DataBlock::new(&[0x41; DATA_PAYLOAD_PER_BLOCK], Some(3));
        let packed = block.pack();
        assert_eq!(packed.len(), DataBlock::SIZE);
        assert_eq!(DataBlock::unpack(&packed).unwrap(), block);
    }

    #[test_log::test]
    fn round_trips_terminal_block() {
        let block = DataBlock::new(b"tail", None);
        let unpacked = DataBlock::unpack(&block.pack()).unwrap();
        assert_eq!(unpacked.next_block, None);
        assert!(unpacked.content.starts_with(b"tail"));
        assert!(unpacked.content[b"tail".len()..].iter().all(|&b| b == 0));
    }

    #[test_log::test]
    fn free_block_round_trips() {
        let block = DataBlock::free();
        let unpacked = DataBlock::unpack(&block.pack()).unwrap();
        assert_eq!(unpacked.status, BlockStatus::Free);
    }

    #[test_log::test]
    fn tombstone_byte_decodes_as_free() {
        let mut packed = DataBlock::free().pack();
        packed[0] = 0x02;
        assert_eq!(DataBlock::unpack(&packed).unwrap().status, BlockStatus::Free);
    }
}
