//! On-disk layout of a [`FlatIndex`].
//!
//! Little-endian throughout:
//! - Magic: "BKFLAT01" (8 bytes)
//! - Dimension: u32
//! - Count: u64
//! - Per row: KeyLen u32, Key [u8; KeyLen] (UTF-8), Vector [f32; Dimension]
//! - Footer: xxhash64 of all preceding bytes
//!
//! Every length read from the file is checked against the bytes actually
//! present before anything is allocated for it.

use xxhash_rust::xxh64::xxh64;

use super::{FlatIndex, MAX_DIMENSION};

const MAGIC: &[u8; 8] = b"BKFLAT01";

const HEADER_LEN: usize = 8 + 4 + 8;
const FOOTER_LEN: usize = 8;

/// Upper bound on a single key.
const MAX_KEY_LEN: usize = 64 * 1024;

impl FlatIndex {
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let row_bytes: usize = self.keys.iter().map(|k| 4 + k.len()).sum::<usize>()
            + self.vectors.len() * 4;
        let mut data = Vec::with_capacity(HEADER_LEN + row_bytes + FOOTER_LEN);

        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        data.extend_from_slice(&(self.keys.len() as u64).to_le_bytes());

        for (key, row) in self.keys.iter().zip(self.vectors.chunks_exact(self.dimension)) {
            data.extend_from_slice(&(key.len() as u32).to_le_bytes());
            data.extend_from_slice(key.as_bytes());
            for value in row {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }

        let checksum = xxh64(&data, 0);
        data.extend_from_slice(&checksum.to_le_bytes());
        data
    }

    /// Decode a buffer written by [`to_bytes`](Self::to_bytes). The error is
    /// a human-readable reason the buffer was rejected.
    pub(super) fn from_bytes(data: &[u8]) -> Result<Self, String> {
        if data.len() < HEADER_LEN + FOOTER_LEN {
            return Err(format!("file too small ({} bytes)", data.len()));
        }

        let checksum_offset = data.len() - FOOTER_LEN;
        let stored = u64::from_le_bytes(array(&data[checksum_offset..]));
        let computed = xxh64(&data[..checksum_offset], 0);
        if stored != computed {
            return Err(format!(
                "checksum mismatch (stored={stored:#x}, computed={computed:#x})"
            ));
        }

        if &data[..8] != MAGIC {
            return Err("invalid magic".into());
        }

        let dimension = u32::from_le_bytes(array(&data[8..12])) as usize;
        if dimension == 0 || dimension > MAX_DIMENSION {
            return Err(format!("unsupported dimension {dimension}"));
        }
        let count = u64::from_le_bytes(array(&data[12..20]));

        let mut body = Cursor {
            data: &data[HEADER_LEN..checksum_offset],
        };

        // each row needs at least its key length and its vector
        let min_row = 4 + dimension * 4;
        let max_rows = (body.data.len() / min_row) as u64;
        if count > max_rows {
            return Err(format!(
                "header claims {count} rows but only {} bytes follow",
                body.data.len()
            ));
        }
        let count = count as usize;

        let mut index = FlatIndex {
            dimension,
            keys: Vec::with_capacity(count),
            vectors: Vec::with_capacity(count * dimension),
        };

        for i in 0..count {
            let key_len = u32::from_le_bytes(array(body.take(4, i)?)) as usize;
            if key_len > MAX_KEY_LEN {
                return Err(format!("row {i}: key length {key_len}"));
            }
            let key = std::str::from_utf8(body.take(key_len, i)?)
                .map_err(|_| format!("row {i}: key is not UTF-8"))?;
            let row = body.take(dimension * 4, i)?;

            index.keys.push(key.to_string());
            index.vectors.extend(
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        if !body.data.is_empty() {
            return Err("trailing bytes after last row".into());
        }

        Ok(index)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, row: usize) -> Result<&'a [u8], String> {
        if self.data.len() < len {
            return Err(format!("row {row}: unexpected end of data"));
        }
        let (head, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(head)
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
