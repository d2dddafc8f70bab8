//! Builder that turns documents into a packed index.
//!
//! Documents are buffered as (id, keywords, rank) records; `build` runs the
//! whole pipeline in one pass: rank normalization, last-writer-wins
//! conflict resolution, vocabulary and frequency-permutation construction,
//! prefix-respecting block partitioning, and chunk packing.

mod partitioner;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::index::{Chunk, Index, PostingBlock};
use crate::structures::PackedInts;

use partitioner::{char_frequencies, partition};

/// Default number of vocabulary blocks.
pub const DEFAULT_NUM_BLOCKS: usize = 5;
/// Default maximum number of postings per packed chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Build-time tuning knobs.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Target number of vocabulary blocks
    pub num_blocks: usize,
    /// Maximum postings per packed chunk
    pub chunk_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            num_blocks: DEFAULT_NUM_BLOCKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A buffered document record. Tombstones carry no rank and no keywords.
struct DocRecord {
    id: u64,
    words: Vec<String>,
    /// Caller-supplied rank; `None` marks a tombstone and sorts first
    rank: Option<u64>,
    /// Insertion counter deciding conflicts between records with equal ids
    seq: usize,
    /// Normalized rank, assigned during `build`
    norm: u32,
}

/// Accumulates documents and builds a searchable [`Index`].
///
/// `add` and `delete` only buffer; all work happens in [`Builder::build`].
/// Records with the same id resolve to the latest call, so
/// add-then-delete removes the document and delete-then-add keeps it.
pub struct Builder {
    docs: Vec<DocRecord>,
    config: BuilderConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Create an empty builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            docs: Vec::new(),
            config,
        }
    }

    /// Add a document given its id, search keywords, and rank.
    ///
    /// Keywords are copied and sorted; duplicates are kept and raise the
    /// word's collection frequency. A larger rank means a better hit.
    pub fn add<S: AsRef<str>>(&mut self, id: u64, keywords: &[S], rank: u64) {
        let mut words: Vec<String> = keywords.iter().map(|w| w.as_ref().to_string()).collect();
        words.sort_unstable();

        let seq = self.docs.len();
        self.docs.push(DocRecord {
            id,
            words,
            rank: Some(rank),
            seq,
            norm: 0,
        });
    }

    /// Remove a document given its id.
    pub fn delete(&mut self, id: u64) {
        let seq = self.docs.len();
        self.docs.push(DocRecord {
            id,
            words: Vec::new(),
            rank: None,
            seq,
            norm: 0,
        });
    }

    /// Build the index, consuming the builder.
    ///
    /// Returns [`Error::IntegerRange`] if a surviving document id or the
    /// record count does not fit in a u32.
    pub fn build(self) -> Result<Index> {
        let BuilderConfig {
            num_blocks,
            chunk_size,
        } = self.config;
        let num_blocks = num_blocks.max(1);
        let chunk_size = chunk_size.max(1);

        let mut records = self.docs;
        if records.len() > u32::MAX as usize {
            return Err(Error::IntegerRange {
                what: "record count",
                value: records.len() as u64,
            });
        }

        // Normalize ranks: the caller's arbitrary values compress to
        // [0, n) while preserving order. Tombstones sort first; they are
        // dropped below, before anything observes their normalized rank.
        records.sort_by(|a, b| a.rank.cmp(&b.rank));
        for (i, r) in records.iter_mut().enumerate() {
            r.norm = i as u32;
        }

        // Within one id the latest record wins
        records.sort_unstable_by(|a, b| a.id.cmp(&b.id).then(b.seq.cmp(&a.seq)));

        let mut survivors: Vec<usize> = Vec::new();
        let mut prev_id = None;
        for (i, r) in records.iter().enumerate() {
            if prev_id != Some(r.id) && r.rank.is_some() {
                survivors.push(i);
            }
            prev_id = Some(r.id);
        }

        // Collection frequency per distinct keyword
        let mut wordmap: FxHashMap<&str, u32> = FxHashMap::default();
        let mut npostings = 0u64;
        for &si in &survivors {
            let r = &records[si];
            if r.id > u64::from(u32::MAX) {
                return Err(Error::IntegerRange {
                    what: "document id",
                    value: r.id,
                });
            }
            for w in &r.words {
                *wordmap.entry(w.as_str()).or_insert(0) += 1;
                npostings += 1;
            }
        }
        if npostings == 0 {
            return Ok(Index::empty());
        }
        if npostings > u64::from(u32::MAX) {
            return Err(Error::IntegerRange {
                what: "posting count",
                value: npostings,
            });
        }

        // Lexicographic vocabulary; position is the word id
        let mut words: Vec<String> = wordmap.keys().map(|w| w.to_string()).collect();
        words.sort_unstable();
        let freqs: Vec<u32> = words.iter().map(|w| wordmap[w.as_str()]).collect();

        // Frequency-descending permutation and its inverse. Postings store
        // the inverse so frequent words pack into few bits.
        let mut freq_word: Vec<u32> = (0..words.len() as u32).collect();
        freq_word.sort_by_key(|&w| std::cmp::Reverse(freqs[w as usize]));
        let mut word_freq_idx = vec![0u32; words.len()];
        for (f, &w) in freq_word.iter().enumerate() {
            word_freq_idx[w as usize] = f as u32;
        }

        let nchars: usize = words.iter().map(|w| w.len()).sum();
        let avg_chars = nchars / words.len() + 1;

        let char_freq = char_frequencies(&words, &freqs, avg_chars);

        let spans = partition(&words, &freqs, num_blocks, avg_chars);
        let mut word_block = vec![0u32; words.len()];
        for (bi, s) in spans.iter().enumerate() {
            for w in &mut word_block[s.start..=s.end] {
                *w = bi as u32;
            }
        }

        log::debug!(
            "building index: {} postings, {} words, {} blocks",
            npostings,
            words.len(),
            spans.len()
        );

        // Route postings to blocks. Survivors are id-sorted, so each
        // block's arrays come out id-sorted as well.
        let word_ids: FxHashMap<&str, u32> = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_str(), i as u32))
            .collect();

        let mut ids: Vec<Vec<u32>> = spans
            .iter()
            .map(|s| Vec::with_capacity(s.postings as usize))
            .collect();
        let mut wfreqs: Vec<Vec<u32>> = spans
            .iter()
            .map(|s| Vec::with_capacity(s.postings as usize))
            .collect();
        let mut ranks: Vec<Vec<u32>> = spans
            .iter()
            .map(|s| Vec::with_capacity(s.postings as usize))
            .collect();

        for &si in &survivors {
            let r = &records[si];
            for w in &r.words {
                let wid = word_ids[w.as_str()];
                let b = word_block[wid as usize] as usize;
                ids[b].push(r.id as u32);
                wfreqs[b].push(word_freq_idx[wid as usize]);
                ranks[b].push(r.norm);
            }
        }

        // Chunk and pack each block
        let mut blocks = Vec::with_capacity(spans.len());
        for (((s, ids), wfreqs), ranks) in spans.iter().zip(&ids).zip(&wfreqs).zip(&ranks) {
            let mut chunks = Vec::with_capacity(ids.len().div_ceil(chunk_size));
            let mut off = 0;
            while off < ids.len() {
                let end = (off + chunk_size).min(ids.len());
                chunks.push(Chunk {
                    ids: PackedInts::delta_pack(&ids[off..end]),
                    words: PackedInts::pack(&wfreqs[off..end]),
                    ranks: PackedInts::pack(&ranks[off..end]),
                    id_boundary: ids[end - 1],
                });
                off = end;
            }

            blocks.push(PostingBlock {
                chunks,
                len: ids.len() as u32,
                bounds: (s.start as u32, s.end as u32),
                word_bounds: (words[s.start].clone(), words[s.end].clone()),
            });
        }

        Ok(Index::assemble(
            blocks,
            Arc::new(words),
            freq_word,
            char_freq,
        ))
    }
}
