//! Index container and query planner.
//!
//! An [`Index`] owns the packed posting blocks, the sorted vocabulary, the
//! frequency permutation, and the character-frequency estimator. It is
//! immutable once built; concurrent searches with distinct
//! [`SearchResult`] objects need no synchronization.
//!
//! `search` classifies every query against the previous one held in the
//! result object. A continuation whose last token merely grows reuses the
//! retained posting set and completion window in place; everything else
//! runs the per-block intersection.

mod intersect;
mod merge;
#[cfg(test)]
mod tests;

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::result::{CompletionEntry, SearchResult};
use crate::structures::PackedInts;

use intersect::intersect;
use merge::merge;

/// Stream magic, "hyb1" little-endian.
const INDEX_MAGIC: u32 = 0x31627968;
/// Serialization format version.
const FORMAT_VERSION: u32 = 1;

/// A packed group of up to `chunk_size` postings: three parallel integer
/// arrays plus the largest document id, used to skip the chunk entirely
/// when the incoming result cursor is already past it.
pub(crate) struct Chunk {
    /// Delta-packed ascending document ids
    pub ids: PackedInts,
    /// Packed frequency-permutation indices of the posting words
    pub words: PackedInts,
    /// Packed normalized ranks
    pub ranks: PackedInts,
    /// Last document id in the chunk
    pub id_boundary: u32,
}

impl Chunk {
    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.ids.serialize(writer)?;
        self.words.serialize(writer)?;
        self.ranks.serialize(writer)?;
        writer.write_u32::<LittleEndian>(self.id_boundary)?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let ids = PackedInts::deserialize(reader)?;
        let words = PackedInts::deserialize(reader)?;
        let ranks = PackedInts::deserialize(reader)?;
        let id_boundary = reader.read_u32::<LittleEndian>()?;

        if ids.len() != words.len() || ids.len() != ranks.len() {
            return Err(Error::Corruption(format!(
                "chunk arrays disagree on length: {} ids, {} words, {} ranks",
                ids.len(),
                words.len(),
                ranks.len()
            )));
        }

        Ok(Self {
            ids,
            words,
            ranks,
            id_boundary,
        })
    }

    fn size_bytes(&self) -> usize {
        self.ids.size_bytes() + self.words.size_bytes() + self.ranks.size_bytes() + 4
    }
}

/// All postings for one contiguous range of the vocabulary, id-sorted
/// across the concatenated chunks.
pub(crate) struct PostingBlock {
    pub chunks: Vec<Chunk>,
    /// Number of postings in the block
    pub len: u32,
    /// Inclusive word-id range covered by the block
    pub bounds: (u32, u32),
    /// The boundary words themselves, for candidate selection
    pub word_bounds: (String, String),
}

impl PostingBlock {
    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.chunks.len() as u32)?;
        for chunk in &self.chunks {
            chunk.serialize(writer)?;
        }
        writer.write_u32::<LittleEndian>(self.len)?;
        writer.write_u32::<LittleEndian>(self.bounds.0)?;
        writer.write_u32::<LittleEndian>(self.bounds.1)?;
        write_string(writer, &self.word_bounds.0)?;
        write_string(writer, &self.word_bounds.1)?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let nchunks = reader.read_u32::<LittleEndian>()? as usize;
        let mut chunks = Vec::with_capacity(nchunks);
        for _ in 0..nchunks {
            chunks.push(Chunk::deserialize(reader)?);
        }
        let len = reader.read_u32::<LittleEndian>()?;
        let bounds = (
            reader.read_u32::<LittleEndian>()?,
            reader.read_u32::<LittleEndian>()?,
        );
        let word_bounds = (read_string(reader)?, read_string(reader)?);

        Ok(Self {
            chunks,
            len,
            bounds,
            word_bounds,
        })
    }

    fn size_bytes(&self) -> usize {
        let chunks: usize = self.chunks.iter().map(Chunk::size_bytes).sum();
        chunks + self.word_bounds.0.len() + self.word_bounds.1.len() + 12
    }
}

/// A group of searchable documents.
///
/// Built by [`crate::Builder`] or read back with [`Index::read`];
/// immutable thereafter.
pub struct Index {
    pub(crate) blocks: Vec<PostingBlock>,
    pub(crate) words: Arc<Vec<String>>,
    /// Maps frequency rank to word id
    pub(crate) freq_word: Vec<u32>,
    /// `char_freq[c][j]` bounds the postings whose word has byte c at
    /// position j, given that byte j-1 already matched
    pub(crate) char_freq: Vec<Vec<u32>>,
    size: usize,
}

impl Index {
    pub(crate) fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            words: Arc::new(Vec::new()),
            freq_word: Vec::new(),
            char_freq: Vec::new(),
            size: 0,
        }
    }

    pub(crate) fn assemble(
        blocks: Vec<PostingBlock>,
        words: Arc<Vec<String>>,
        freq_word: Vec<u32>,
        char_freq: Vec<Vec<u32>>,
    ) -> Self {
        let mut size: usize = blocks.iter().map(PostingBlock::size_bytes).sum();
        size += words.iter().map(|w| w.len() + 8).sum::<usize>();
        size += freq_word.len() * 4;
        size += char_freq.iter().map(|row| row.len() * 4).sum::<usize>();

        Self {
            blocks,
            words,
            freq_word,
            char_freq,
            size,
        }
    }

    /// Approximate size of the index in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Search the index, mutating `result` in place.
    ///
    /// `result` doubles as the previous result: when the new query refines
    /// the one already stored there, the search reuses the retained posting
    /// set instead of touching block data. Pass a result dedicated to this
    /// index and do not share it between concurrent searches.
    pub fn search<S: AsRef<str>>(&self, query: &[S], result: &mut SearchResult) {
        let (cont, refined_start) = continuation(&result.query, query);

        // A continuation of an empty result stays empty
        if cont && result.results.is_empty() {
            return;
        }
        if !cont {
            result.clear_hits();
            result.words = Arc::clone(&self.words);
        }

        let curr: Vec<String> = query.iter().map(|q| q.as_ref().to_string()).collect();

        let mut pquery: Option<String> = if cont { result.query.last().cloned() } else { None };
        for q in &curr[refined_start..] {
            let extends = matches!(&pquery, Some(p) if !p.is_empty() && q.starts_with(p.as_str()));
            if extends {
                self.refine(q, result);
            } else {
                self.search_token(q, result);
            }

            if result.results.is_empty() {
                break;
            }
            pquery = Some(q.clone());
        }

        result.query = curr;
    }

    /// Fast path: the previous processed token is a prefix of `q`, so the
    /// new word range is a sub-range of the current one. Slices the
    /// completion window and drops retained postings outside the range
    /// without unpacking any chunk.
    fn refine(&self, q: &str, result: &mut SearchResult) {
        let Some(prev_range) = result.wrange else {
            result.clear_hits();
            return;
        };

        match word_range(q, &self.words, prev_range.0 as usize) {
            Some((w0, w1)) => {
                result.comp_start += (w0 - prev_range.0) as usize;
                result.comp_len = (w1 - w0 + 1) as usize;
                result.wrange = Some((w0, w1));
                result.results.retain(|p| p.word >= w0 && p.word <= w1);
            }
            None => result.clear_hits(),
        }
    }

    /// Full per-block search for one token.
    fn search_token(&self, q: &str, result: &mut SearchResult) {
        // A block is a candidate if it contains the token or if the token
        // is a prefix of its lower boundary, which catches the run of
        // blocks following the one the token falls into.
        let candidates: Vec<&PostingBlock> = self
            .blocks
            .iter()
            .filter(|b| {
                let (lo, hi) = (&b.word_bounds.0, &b.word_bounds.1);
                (q >= lo.as_str() && q <= hi.as_str()) || lo.starts_with(q)
            })
            .collect();

        let Some(first) = candidates.first() else {
            result.clear_hits();
            return;
        };

        let Some((w0, w1)) = word_range(q, &self.words, first.bounds.0 as usize) else {
            result.clear_hits();
            return;
        };
        result.wrange = Some((w0, w1));

        // Seed one zero-hit completion per word in range, backed by the
        // grow-only buffer
        let rlen = (w1 - w0 + 1) as usize;
        if result.comp_buf.len() < rlen {
            result.comp_buf.resize(rlen, CompletionEntry::default());
        }
        result.comp_start = 0;
        result.comp_len = rlen;
        for (i, c) in result.comp_buf[..rlen].iter_mut().enumerate() {
            *c = CompletionEntry {
                word: w0 + i as u32,
                hits: 0,
            };
        }

        // Pre-size the output for the first token; later tokens shrink the
        // result set and grow amortized from empty
        let cout = if result.results.is_empty() {
            let bound: u64 = candidates.iter().map(|b| u64::from(b.len)).sum();
            calc_len(q, &self.char_freq).min(bound as usize)
        } else {
            0
        };

        let mut outputs: Vec<Vec<crate::result::Posting>> = Vec::with_capacity(candidates.len());
        for block in candidates {
            let posts = intersect(
                &result.results,
                &mut result.comp_buf[..rlen],
                cout,
                block,
                (w0, w1),
                &self.freq_word,
            );
            if !posts.is_empty() {
                outputs.push(posts);
            }
        }

        merge(&mut result.results, outputs);
    }

    /// Serialize the index.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;

        writer.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            block.serialize(writer)?;
        }

        writer.write_u32::<LittleEndian>(self.words.len() as u32)?;
        for word in self.words.iter() {
            write_string(writer, word)?;
        }

        writer.write_u32::<LittleEndian>(self.freq_word.len() as u32)?;
        for &w in &self.freq_word {
            writer.write_u32::<LittleEndian>(w)?;
        }

        let cols = self.char_freq.first().map_or(0, Vec::len);
        writer.write_u32::<LittleEndian>(self.char_freq.len() as u32)?;
        writer.write_u32::<LittleEndian>(cols as u32)?;
        for row in &self.char_freq {
            for &v in row {
                writer.write_u32::<LittleEndian>(v)?;
            }
        }

        writer.write_u64::<LittleEndian>(self.size as u64)?;
        Ok(())
    }

    /// Deserialize an index written by [`Index::write`].
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(Error::Serialization(format!(
                "bad magic {:#010x}, expected {:#010x}",
                magic, INDEX_MAGIC
            )));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported format version {}",
                version
            )));
        }

        let nblocks = reader.read_u32::<LittleEndian>()? as usize;
        let mut blocks = Vec::with_capacity(nblocks);
        for _ in 0..nblocks {
            blocks.push(PostingBlock::deserialize(reader)?);
        }

        let nwords = reader.read_u32::<LittleEndian>()? as usize;
        let mut words = Vec::with_capacity(nwords);
        for _ in 0..nwords {
            words.push(read_string(reader)?);
        }

        let nfreq = reader.read_u32::<LittleEndian>()? as usize;
        if nfreq != nwords {
            return Err(Error::Corruption(format!(
                "frequency permutation covers {} words, vocabulary has {}",
                nfreq, nwords
            )));
        }
        let mut freq_word = Vec::with_capacity(nfreq);
        for _ in 0..nfreq {
            freq_word.push(reader.read_u32::<LittleEndian>()?);
        }

        let rows = reader.read_u32::<LittleEndian>()? as usize;
        let cols = reader.read_u32::<LittleEndian>()? as usize;
        let mut char_freq = Vec::with_capacity(rows);
        for _ in 0..rows {
            let mut row = Vec::with_capacity(cols);
            for _ in 0..cols {
                row.push(reader.read_u32::<LittleEndian>()?);
            }
            char_freq.push(row);
        }

        let size = reader.read_u64::<LittleEndian>()? as usize;

        log::debug!(
            "read index: {} words, {} blocks, {} bytes",
            nwords,
            nblocks,
            size
        );

        Ok(Self {
            blocks,
            words: Arc::new(words),
            freq_word,
            char_freq,
            size,
        })
    }
}

/// Decide whether `curr` continues `prev`, and where the refined suffix
/// starts: the first token that differs from the previous query, or the
/// first appended token when every shared position is unchanged.
fn continuation<S: AsRef<str>>(prev: &[String], curr: &[S]) -> (bool, usize) {
    if prev.is_empty() || prev.len() > curr.len() {
        return (false, 0);
    }

    let mut refined = prev.len();
    for (i, p) in prev.iter().enumerate() {
        let c = curr[i].as_ref();
        if !c.starts_with(p.as_str()) {
            return (false, 0);
        }
        if refined == prev.len() && c != p.as_str() {
            refined = i;
        }
    }

    (true, refined)
}

/// Locate the inclusive word-id range of vocabulary words starting with
/// `query`, searching only `words[offset..]`.
fn word_range(query: &str, words: &[String], offset: usize) -> Option<(u32, u32)> {
    let tail = &words[offset..];
    let start = tail.partition_point(|w| w.as_str() < query);
    if start == tail.len() || !tail[start].starts_with(query) {
        return None;
    }

    // Byte-wise, no word extending the prefix can compare above the prefix
    // followed by the maximum scalar value
    let mut upper = String::with_capacity(query.len() + 4);
    upper.push_str(query);
    upper.push('\u{10FFFF}');
    let span = tail[start..].partition_point(|w| w.as_str() < upper.as_str());
    if span == 0 {
        return None;
    }
    let end = start + span - 1;

    Some(((start + offset) as u32, (end + offset) as u32))
}

/// Estimate the number of postings matching the query prefix from the
/// character-frequency table.
fn calc_len(query: &str, char_freq: &[Vec<u32>]) -> usize {
    let Some(first) = char_freq.first() else {
        return 0;
    };

    let mut cout = u32::MAX as usize;
    for (i, b) in query.bytes().enumerate().take(first.len()) {
        cout = cout.min(char_freq[b as usize][i] as usize);
    }
    cout
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| Error::Corruption(format!("non-UTF-8 word: {}", e)))
}
