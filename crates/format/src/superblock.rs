use myfs_types::{SIGNATURE, VOLUME_INFO_SIZE};
use zerocopy::*;

use crate::{Error, expect_len};

/// On-disk layout of the 88-byte superblock at offset 0.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C, packed)]
struct SuperblockRaw {
    signature: [u8; 8],
    volume_size_hi: U64<BigEndian>,
    volume_size_lo: U64<BigEndian>,
    metadata_key: [u8; 32],
    machine_hash: [u8; 32],
}

/// The MyFS superblock: signature, declared size, the sidecar encryption key,
/// and the SHA-256 of the platform metadata captured at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub volume_size: u128,
    pub metadata_key: [u8; 32],
    pub machine_hash: [u8; 32],
}

impl Superblock {
    /// Size in bytes of the packed representation.
    pub const SIZE: usize = VOLUME_INFO_SIZE as usize;

    /// Builds a fresh superblock for a newly initialized volume.
    pub fn new(metadata_key: [u8; 32], machine_hash: [u8; 32]) -> Self {
        Self {
            volume_size: 0,
            metadata_key,
            machine_hash,
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut signature = [0u8; 8];
        signature[..SIGNATURE.len()].copy_from_slice(SIGNATURE);
        let raw = SuperblockRaw {
            signature,
            volume_size_hi: U64::new((self.volume_size >> 64) as u64),
            volume_size_lo: U64::new(self.volume_size as u64),
            metadata_key: self.metadata_key,
            machine_hash: self.machine_hash,
        };
        raw.as_bytes().to_vec()
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        expect_len(data, Self::SIZE)?;
        let raw = SuperblockRaw::read_from_bytes(data).expect("length checked above");
        let volume_size = ((raw.volume_size_hi.get() as u128) << 64) | raw.volume_size_lo.get() as u128;
        Ok(Self {
            volume_size,
            metadata_key: raw.metadata_key,
            machine_hash: raw.machine_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn round_trips() {
        let sb = Superblock::new([0x11; 32], [0x22; 32]);
        let packed = sb.pack();
        assert_eq!(packed.len(), Superblock::SIZE);
        let unpacked = Superblock::unpack(&packed).unwrap();
        assert_eq!(sb, unpacked);
    }

    #[test_log::test]
    fn preserves_volume_size_round_trip() {
        let mut sb = Superblock::new([0; 32], [0; 32]);
        sb.volume_size = u128::from(u64::MAX) << 32;
        let unpacked = Superblock::unpack(&sb.pack()).unwrap();
        assert_eq!(unpacked.volume_size, sb.volume_size);
    }

    #[test_log::test]
    fn rejects_short_read() {
        assert!(Superblock::unpack(&[0u8; 10]).is_err());
    }
}
