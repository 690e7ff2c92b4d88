//! Byte-exact codecs for the MyFS volume on-disk layout.
//!
//! Every struct here round-trips through `pack`/`unpack` unchanged; the
//! fixed-layout pieces (superblock, entry record, data block) are backed by
//! `zerocopy` so the wire representation and the in-memory representation
//! are provably the same bytes, the way the workspace's other superblock
//! parsers are.

use snafu::Snafu;

mod data_block;
mod entry;
mod entry_table;
mod superblock;

pub use data_block::{BlockStatus, DataBlock};
pub use entry::{Entry, EntryStatus};
pub use entry_table::EntryTable;
pub use superblock::Superblock;

/// Errors that can occur decoding a MyFS on-disk structure.
#[derive(Debug, Snafu)]
pub enum Error {
    /// A buffer passed to `unpack` was the wrong size.
    #[snafu(display("short read: expected {expected} bytes, got {got}"))]
    ShortRead { expected: usize, got: usize },

    /// A fixed-width ASCII field contained non-ASCII bytes or an embedded NUL.
    #[snafu(display("invalid ascii field {field}"))]
    InvalidAscii { field: &'static str },

    /// A fixed-width ASCII field was longer than its on-disk width.
    #[snafu(display("field {field} exceeds its on-disk width of {max} bytes"))]
    FieldTooLong { field: &'static str, max: usize },

    /// A date field did not parse as the format's ISO-8601 profile.
    #[snafu(display("invalid timestamp in field {field}: {source}"))]
    InvalidTimestamp {
        field: &'static str,
        source: chrono::ParseError,
    },

    /// An unrecognized status byte was encountered while decoding.
    #[snafu(display("invalid status byte: {byte:#04x}"))]
    InvalidStatus { byte: u8 },
}

pub(crate) fn expect_len(data: &[u8], expected: usize) -> Result<(), Error> {
    if data.len() != expected {
        return ShortReadSnafu {
            expected,
            got: data.len(),
        }
        .fail();
    }
    Ok(())
}

/// Encodes an ASCII string into a fixed-width, NUL-padded field.
pub(crate) fn pack_ascii_field(value: &str, width: usize, field: &'static str) -> Result<Vec<u8>, Error> {
    if !value.is_ascii() || value.contains('\0') {
        return InvalidAsciiSnafu { field }.fail();
    }
    if value.len() > width {
        return FieldTooLongSnafu { field, max: width }.fail();
    }
    let mut buf = vec![0u8; width];
    buf[..value.len()].copy_from_slice(value.as_bytes());
    Ok(buf)
}

/// Decodes a fixed-width, NUL-padded field, trimming trailing NULs. Unpack
/// trusts bytes read from a well-formed volume and never fails on non-ASCII
/// content; only `pack_ascii_field` (construction, the system boundary)
/// validates ASCII and rejects embedded NULs.
pub(crate) fn unpack_ascii_field(data: &[u8]) -> String {
    let trimmed = data.split(|&b| b == 0).next().unwrap_or(data);
    String::from_utf8_lossy(trimmed).into_owned()
}
