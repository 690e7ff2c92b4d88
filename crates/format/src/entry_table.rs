use myfs_types::{ENTRY_SIZE, ENTRY_TABLE_SIZE};

use crate::{Entry, Error, expect_len};

/// A fixed-length array of `ENTRY_TABLE_SIZE` entry records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTable {
    pub entries: Vec<Entry>,
}

impl EntryTable {
    pub const SIZE: usize = ENTRY_SIZE as usize * ENTRY_TABLE_SIZE;

    /// A table of `ENTRY_TABLE_SIZE` free entries, as written at volume init.
    pub fn empty() -> Self {
        Self {
            entries: (0..ENTRY_TABLE_SIZE).map(|_| Entry::free()).collect(),
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        assert_eq!(self.entries.len(), ENTRY_TABLE_SIZE, "entry table must hold exactly ENTRY_TABLE_SIZE entries");
        let mut out = Vec::with_capacity(Self::SIZE);
        for entry in &self.entries {
            out.extend(entry.pack()?);
        }
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        expect_len(data, Self::SIZE)?;
        let entries = data
            .chunks_exact(Entry::SIZE)
            .map(Entry::unpack)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}
