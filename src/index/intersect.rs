//! Per-block posting intersection.
//!
//! Walks one block's chunks in order, unpacking each into an aligned
//! scratch buffer and intersecting against the incoming result set with a
//! sorted merge on document id. The result cursor only moves forward, so a
//! block costs O(|results| + |block postings|). Chunks whose largest
//! document id falls below the cursor are skipped without unpacking.

use crate::index::PostingBlock;
use crate::result::{CompletionEntry, Posting};

/// Scratch slack so each of the three arrays can be advanced to a 16-byte
/// boundary.
const ALIGN_PAD: usize = 4;

/// Return the 16-byte-aligned tail of `buf`.
fn align16(buf: &mut [u32]) -> &mut [u32] {
    let off = buf.as_ptr().align_offset(16);
    buf.get_mut(off..).expect("scratch buffer cannot be aligned")
}

/// Intersect a block's postings with `results` (all postings when empty),
/// keeping those whose word falls in `wrange`. Tallies one hit per
/// distinct (document, word) pair per chunk into `comps`, which holds one
/// entry per word in the range. Emitted postings carry resolved word ids
/// and come out sorted by ascending document id.
pub(crate) fn intersect(
    results: &[Posting],
    comps: &mut [CompletionEntry],
    cout: usize,
    block: &PostingBlock,
    wrange: (u32, u32),
    freq_word: &[u32],
) -> Vec<Posting> {
    let (w0, w1) = wrange;

    let cap = block
        .chunks
        .iter()
        .map(|c| c.ids.len())
        .max()
        .unwrap_or(0);
    if cap == 0 {
        return Vec::new();
    }

    // The unpack destinations must start on a 16-byte boundary; carve
    // three aligned runs out of one over-allocated buffer
    let mut buffer = vec![0u32; (cap + ALIGN_PAD) * 3];
    let scratch = align16(&mut buffer);
    let (ids, scratch) = scratch.split_at_mut(cap);
    let scratch = align16(scratch);
    let (words, scratch) = scratch.split_at_mut(cap);
    let scratch = align16(scratch);
    let (ranks, _) = scratch.split_at_mut(cap);

    let mut out: Vec<Posting> = Vec::with_capacity(cout);
    let mut i = 0usize;

    for chunk in &block.chunks {
        if !results.is_empty() {
            if i >= results.len() {
                break;
            }
            if results[i].id > chunk.id_boundary {
                continue;
            }
        }

        let n = chunk.ids.unpack_into(ids);
        chunk.words.unpack_into(words);
        chunk.ranks.unpack_into(ranks);

        // Last emitted (id, word) pair, for completion-hit dedup. Scoped
        // to the chunk: a pair whose occurrences straddle a chunk
        // boundary counts once per chunk.
        let mut pid = None;

        if !results.is_empty() {
            let mut j = 0usize;
            while i < results.len() && j < n {
                let jid = ids[j];
                let rid = results[i].id;

                if rid < jid {
                    i += 1;
                } else if rid > jid {
                    j += 1;
                } else {
                    let wid = freq_word[words[j] as usize];
                    if wid >= w0 && wid <= w1 {
                        out.push(Posting {
                            id: rid,
                            word: wid,
                            rank: ranks[j],
                        });
                        if pid != Some((rid, wid)) {
                            comps[(wid - w0) as usize].hits += 1;
                        }
                        pid = Some((rid, wid));
                    }
                    j += 1;
                }
            }
        } else {
            for j in 0..n {
                let wid = freq_word[words[j] as usize];
                if wid >= w0 && wid <= w1 {
                    let id = ids[j];
                    out.push(Posting {
                        id,
                        word: wid,
                        rank: ranks[j],
                    });
                    if pid != Some((id, wid)) {
                        comps[(wid - w0) as usize].hits += 1;
                    }
                    pid = Some((id, wid));
                }
            }
        }
    }

    out
}
