//! Prefix-respecting block partitioning of the sorted vocabulary.
//!
//! The vocabulary is cut into a handful of contiguous blocks so that a
//! prefix query touches as few blocks as possible: a cut is only placed
//! where the shared prefix between neighbouring words breaks. Candidate cut
//! sequences are computed at every prefix depth up to the average word
//! length; the shallowest depth that still yields the requested number of
//! blocks wins, with depth 0 as the fallback.

/// A contiguous word-id range and the number of postings it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    /// First word id in the block, inclusive
    pub start: usize,
    /// Last word id in the block, inclusive
    pub end: usize,
    /// Total collection frequency of the words in the block
    pub postings: u64,
}

/// Partition the sorted vocabulary into roughly `num_blocks` blocks.
///
/// `freqs[w]` is the collection frequency of word `w`; the target block
/// weight is `total / num_blocks + 1` postings. Spans cover the whole
/// vocabulary and are pairwise disjoint.
pub(crate) fn partition(
    words: &[String],
    freqs: &[u32],
    num_blocks: usize,
    avg_chars: usize,
) -> Vec<BlockSpan> {
    debug_assert!(!words.is_empty());
    debug_assert_eq!(words.len(), freqs.len());

    let total: u64 = freqs.iter().map(|&f| u64::from(f)).sum();
    let block_size = total / num_blocks.max(1) as u64 + 1;

    let mut sum = vec![0u64; avg_chars];
    let mut start = vec![0usize; avg_chars];
    let mut cuts: Vec<Vec<BlockSpan>> = vec![Vec::new(); avg_chars];

    let mut prev = 0usize;
    for (i, w) in words.iter().enumerate() {
        let pw = words[prev].as_bytes();
        let wb = w.as_bytes();
        let minlen = pw.len().min(wb.len());

        // `prefix` tracks whether the previous word still shares a prefix
        // of length j+1 with the current one; once broken it stays broken
        // for every deeper level.
        let mut prefix = true;
        for j in 0..avg_chars {
            if !prefix || j >= minlen || pw[j] != wb[j] {
                prefix = false;
            }

            if sum[j] >= block_size && !prefix {
                cuts[j].push(BlockSpan {
                    start: start[j],
                    end: prev,
                    postings: sum[j],
                });
                sum[j] = 0;
                start[j] = i;
            }

            sum[j] += u64::from(freqs[i]);
        }

        prev = i;
    }

    // Close the final block at every depth
    let last = words.len() - 1;
    for j in 0..avg_chars {
        cuts[j].push(BlockSpan {
            start: start[j],
            end: last,
            postings: sum[j],
        });
    }

    let picked = (0..avg_chars)
        .find(|&j| cuts[j].len() >= num_blocks)
        .unwrap_or(0);
    cuts.swap_remove(picked)
}

/// Build the 256 x `avg_chars` character-frequency table.
///
/// `table[c][0]` sums the frequencies of words whose first byte is `c`.
/// For deeper positions, frequencies are first accumulated per
/// (byte, preceding byte) pair and `table[c][j]` keeps the maximum over the
/// preceding byte, so `table[q[j]][j]` upper-bounds the postings whose word
/// still agrees with the query at byte j after byte j-1 matched. The
/// minimum over query positions pre-sizes intersection output buffers.
pub(crate) fn char_frequencies(
    words: &[String],
    freqs: &[u32],
    avg_chars: usize,
) -> Vec<Vec<u32>> {
    let mut table = vec![vec![0u32; avg_chars]; 256];

    for (i, w) in words.iter().enumerate() {
        table[w.as_bytes()[0] as usize][0] += freqs[i];
    }

    for j in 1..avg_chars {
        let mut pairs = vec![0u32; 256 * 256];

        for (i, w) in words.iter().enumerate() {
            let b = w.as_bytes();
            if j < b.len() {
                pairs[b[j] as usize * 256 + b[j - 1] as usize] += freqs[i];
            }
        }

        for (c, row) in table.iter_mut().enumerate() {
            row[j] = pairs[c * 256..(c + 1) * 256].iter().copied().max().unwrap();
        }
    }

    table
}
