//! Bitpacked integer sequences for posting chunks
//!
//! Packs u32 values in 128-integer groups using a vertical (bit-interleaved)
//! layout, following Lemire & Boytsov (2015) "Decoding billions of integers
//! per second through vectorization". Each group stores bit i of all 128
//! integers together, so a group occupies exactly 128 * bit_width / 8 bytes
//! with no padding waste. Group bit widths are chosen per group from the
//! largest value in it.
//!
//! Two encodings are provided: plain, and delta for non-decreasing
//! sequences. The delta form stores gaps (first value kept as the first gap
//! against zero) and prefix-sums on unpack, so equal adjacent values are
//! legal and cost zero bits.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Number of integers per packed group.
pub const PACK_BLOCK_SIZE: usize = 128;

/// Compute bits needed for max value
#[inline]
pub fn bits_needed(max_val: u32) -> u8 {
    if max_val == 0 {
        0
    } else {
        32 - max_val.leading_zeros() as u8
    }
}

/// Pack 128 integers into the vertical layout at the end of `output`.
fn pack_group(values: &[u32; PACK_BLOCK_SIZE], bit_width: u8, output: &mut Vec<u8>) {
    if bit_width == 0 {
        return;
    }

    let total_bytes = PACK_BLOCK_SIZE * bit_width as usize / 8;
    let start = output.len();
    output.resize(start + total_bytes, 0);

    for bit_pos in 0..bit_width as usize {
        let byte_offset = start + bit_pos * (PACK_BLOCK_SIZE / 8);
        for (int_idx, &val) in values.iter().enumerate() {
            let bit = (val >> bit_pos) & 1;
            output[byte_offset + int_idx / 8] |= (bit as u8) << (int_idx % 8);
        }
    }
}

/// Unpack 128 integers from the vertical layout.
fn unpack_group(input: &[u8], bit_width: u8, output: &mut [u32; PACK_BLOCK_SIZE]) {
    output.fill(0);
    if bit_width == 0 {
        return;
    }

    // One byte holds bit `bit_pos` of 8 consecutive integers
    for bit_pos in 0..bit_width as usize {
        let byte_offset = bit_pos * (PACK_BLOCK_SIZE / 8);

        for byte_idx in 0..PACK_BLOCK_SIZE / 8 {
            let byte_val = input[byte_offset + byte_idx];
            let base_int = byte_idx * 8;

            output[base_int] |= (byte_val & 1) as u32 * (1 << bit_pos);
            output[base_int + 1] |= ((byte_val >> 1) & 1) as u32 * (1 << bit_pos);
            output[base_int + 2] |= ((byte_val >> 2) & 1) as u32 * (1 << bit_pos);
            output[base_int + 3] |= ((byte_val >> 3) & 1) as u32 * (1 << bit_pos);
            output[base_int + 4] |= ((byte_val >> 4) & 1) as u32 * (1 << bit_pos);
            output[base_int + 5] |= ((byte_val >> 5) & 1) as u32 * (1 << bit_pos);
            output[base_int + 6] |= ((byte_val >> 6) & 1) as u32 * (1 << bit_pos);
            output[base_int + 7] |= ((byte_val >> 7) & 1) as u32 * (1 << bit_pos);
        }
    }
}

/// An immutable packed sequence of u32 values.
///
/// Opaque to the rest of the crate: values go in through [`PackedInts::pack`]
/// or [`PackedInts::delta_pack`] and come back out through
/// [`PackedInts::unpack`] / [`PackedInts::unpack_into`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedInts {
    /// Number of packed values
    len: u32,
    /// Whether values are gap-coded
    delta: bool,
    /// Bit width of each 128-integer group
    widths: Vec<u8>,
    /// Concatenated group payloads
    data: Vec<u8>,
}

impl PackedInts {
    /// Pack an arbitrary sequence.
    pub fn pack(src: &[u32]) -> Self {
        Self::pack_groups(src, false)
    }

    /// Pack a non-decreasing sequence as gaps.
    ///
    /// Ordering violations are rejected in debug builds; in release builds
    /// the round-trip contract only holds for non-decreasing input.
    pub fn delta_pack(src: &[u32]) -> Self {
        debug_assert!(
            src.windows(2).all(|w| w[0] <= w[1]),
            "delta_pack input must be non-decreasing"
        );

        let mut gaps = Vec::with_capacity(src.len());
        let mut prev = 0u32;
        for &v in src {
            gaps.push(v.wrapping_sub(prev));
            prev = v;
        }
        Self::pack_groups(&gaps, true)
    }

    fn pack_groups(values: &[u32], delta: bool) -> Self {
        debug_assert!(values.len() <= u32::MAX as usize);

        let mut widths = Vec::with_capacity(values.len().div_ceil(PACK_BLOCK_SIZE));
        let mut data = Vec::new();
        let mut group = [0u32; PACK_BLOCK_SIZE];

        for chunk in values.chunks(PACK_BLOCK_SIZE) {
            group[..chunk.len()].copy_from_slice(chunk);
            group[chunk.len()..].fill(0);

            let width = bits_needed(chunk.iter().copied().max().unwrap_or(0));
            pack_group(&group, width, &mut data);
            widths.push(width);
        }

        Self {
            len: values.len() as u32,
            delta,
            widths,
            data,
        }
    }

    /// Number of packed values.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Approximate heap footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.widths.len() + self.data.len() + 8
    }

    /// Unpack into `dst`, resizing it to the packed length.
    pub fn unpack(&self, dst: &mut Vec<u32>) {
        dst.clear();
        dst.resize(self.len as usize, 0);
        self.unpack_into(dst);
    }

    /// Unpack into the prefix of `dst` without allocating.
    ///
    /// `dst` must hold at least [`PackedInts::len`] values. Returns the
    /// number of values written.
    pub fn unpack_into(&self, dst: &mut [u32]) -> usize {
        let n = self.len as usize;
        debug_assert!(dst.len() >= n);

        let mut group = [0u32; PACK_BLOCK_SIZE];
        let mut data_off = 0;
        for (g, &width) in self.widths.iter().enumerate() {
            let bytes = PACK_BLOCK_SIZE * width as usize / 8;
            unpack_group(&self.data[data_off..data_off + bytes], width, &mut group);
            data_off += bytes;

            let start = g * PACK_BLOCK_SIZE;
            let take = (n - start).min(PACK_BLOCK_SIZE);
            dst[start..start + take].copy_from_slice(&group[..take]);
        }

        if self.delta {
            let mut acc = 0u32;
            for v in dst[..n].iter_mut() {
                acc = acc.wrapping_add(*v);
                *v = acc;
            }
        }

        n
    }

    /// Serialize the packed sequence.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.len)?;
        writer.write_u8(self.delta as u8)?;
        writer.write_all(&self.widths)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Deserialize a packed sequence.
    pub fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = reader.read_u32::<LittleEndian>()?;
        let delta = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid delta flag {}", other),
                ));
            }
        };

        let ngroups = (len as usize).div_ceil(PACK_BLOCK_SIZE);
        let mut widths = vec![0u8; ngroups];
        reader.read_exact(&mut widths)?;
        if widths.iter().any(|&w| w > 32) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "group bit width exceeds 32",
            ));
        }

        let data_len: usize = widths
            .iter()
            .map(|&w| PACK_BLOCK_SIZE * w as usize / 8)
            .sum();
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data)?;

        Ok(Self {
            len,
            delta,
            widths,
            data,
        })
    }
}
