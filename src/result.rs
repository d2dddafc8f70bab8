//! Search results and their ranked views.
//!
//! A [`SearchResult`] is both the output of a search and the input to the
//! next one: it keeps the query it answered, the matching postings, and the
//! completion window, so a query that refines the previous one can be
//! answered from the retained state. The backing buffers are reused across
//! searches; `results` truncates keeping its capacity and `comp_buf` only
//! ever grows.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::DocId;

/// A matching posting: document, resolved word id, normalized rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Posting {
    pub id: u32,
    pub word: u32,
    pub rank: u32,
}

/// One completion candidate inside the active word range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CompletionEntry {
    pub word: u32,
    pub hits: u32,
}

/// Reusable search state, externally owned.
///
/// Create one with [`SearchResult::new`] and pass it to every
/// [`crate::Index::search`] call against the same index. Reusing it across
/// queries enables the incremental fast path and amortizes allocations. A
/// single instance must not be shared between concurrent searches.
pub struct SearchResult {
    /// The query answered by the current state
    pub(crate) query: Vec<String>,
    /// Matching postings, sorted by ascending document id
    pub(crate) results: Vec<Posting>,
    /// Vocabulary shared from the index, for rendering completions
    pub(crate) words: Arc<Vec<String>>,
    /// Word-id range of the last query token
    pub(crate) wrange: Option<(u32, u32)>,
    /// Grow-only backing store for completion entries
    pub(crate) comp_buf: Vec<CompletionEntry>,
    /// Active completion window within `comp_buf`
    pub(crate) comp_start: usize,
    pub(crate) comp_len: usize,
}

impl Default for SearchResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchResult {
    pub fn new() -> Self {
        Self {
            query: Vec::new(),
            results: Vec::new(),
            words: Arc::new(Vec::new()),
            wrange: None,
            comp_buf: Vec::new(),
            comp_start: 0,
            comp_len: 0,
        }
    }

    /// Drop the hit state, keeping buffer capacity and the stored query.
    pub(crate) fn clear_hits(&mut self) {
        self.results.clear();
        self.wrange = None;
        self.comp_start = 0;
        self.comp_len = 0;
    }

    fn completion_window(&self) -> &[CompletionEntry] {
        &self.comp_buf[self.comp_start..self.comp_start + self.comp_len]
    }

    /// All matching document ids, best rank first.
    pub fn hits(&self) -> Hits {
        let mut posts: Vec<Posting> = Vec::with_capacity(self.results.len());
        let mut prev = None;
        for p in &self.results {
            if prev != Some(p.id) {
                posts.push(*p);
                prev = Some(p.id);
            }
        }

        posts.sort_unstable_by(|a, b| b.rank.cmp(&a.rank));
        Hits { posts, pos: 0 }
    }

    /// The `k` best-ranked matching document ids, best first.
    pub fn top_hits(&self, k: usize) -> Hits {
        if k == 0 {
            return Hits {
                posts: Vec::new(),
                pos: 0,
            };
        }

        let mut heap: BinaryHeap<ByRank> = BinaryHeap::with_capacity(k + 1);
        let mut prev = None;
        for p in &self.results {
            if prev == Some(p.id) {
                continue;
            }
            prev = Some(p.id);

            if heap.len() < k {
                heap.push(ByRank(*p));
            } else if p.rank > heap.peek().unwrap().0.rank {
                heap.pop();
                heap.push(ByRank(*p));
            }
        }

        let mut posts: Vec<Posting> = heap.into_iter().map(|e| e.0).collect();
        posts.sort_unstable_by(|a, b| b.rank.cmp(&a.rank));
        Hits { posts, pos: 0 }
    }

    /// All completions of the last query token, most hits first, ties by
    /// word. Iteration stops at the first completion without hits.
    pub fn completions(&self) -> Completions {
        let mut entries = self.completion_window().to_vec();
        entries.sort_unstable_by(|a, b| b.hits.cmp(&a.hits).then(a.word.cmp(&b.word)));

        Completions {
            entries,
            words: Arc::clone(&self.words),
            pos: 0,
        }
    }

    /// The `k` best completions of the last query token, in the same order
    /// as [`SearchResult::completions`].
    pub fn top_completions(&self, k: usize) -> Completions {
        if k == 0 {
            return Completions {
                entries: Vec::new(),
                words: Arc::clone(&self.words),
                pos: 0,
            };
        }

        let mut heap: BinaryHeap<ByWorst> = BinaryHeap::with_capacity(k + 1);
        for &c in self.completion_window() {
            if heap.len() < k {
                heap.push(ByWorst(c));
            } else if ByWorst(c) < *heap.peek().unwrap() {
                heap.pop();
                heap.push(ByWorst(c));
            }
        }

        let mut entries: Vec<CompletionEntry> = heap.into_iter().map(|e| e.0).collect();
        entries.sort_unstable_by(|a, b| b.hits.cmp(&a.hits).then(a.word.cmp(&b.word)));

        Completions {
            entries,
            words: Arc::clone(&self.words),
            pos: 0,
        }
    }
}

/// Reversed rank ordering so the heap peek is the worst kept hit.
struct ByRank(Posting);

impl PartialEq for ByRank {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank == other.0.rank
    }
}

impl Eq for ByRank {}

impl PartialOrd for ByRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByRank {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.rank.cmp(&self.0.rank)
    }
}

/// Orders completions worst-first under the output order (hits descending,
/// word ascending), so eviction keeps exactly the k-prefix even on tied
/// hit counts.
struct ByWorst(CompletionEntry);

impl PartialEq for ByWorst {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for ByWorst {}

impl PartialOrd for ByWorst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByWorst {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .hits
            .cmp(&self.0.hits)
            .then(self.0.word.cmp(&other.0.word))
    }
}

/// Iterator over matching document ids, best rank first.
pub struct Hits {
    posts: Vec<Posting>,
    pos: usize,
}

impl Iterator for Hits {
    type Item = DocId;

    fn next(&mut self) -> Option<DocId> {
        let p = self.posts.get(self.pos)?;
        self.pos += 1;
        Some(p.id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.posts.len() - self.pos;
        (rest, Some(rest))
    }
}

/// A word completing the last query token, with the number of
/// (document, word) pairs backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub word: String,
    pub hits: u32,
}

/// Iterator over completions, most hits first, ties by ascending word.
pub struct Completions {
    entries: Vec<CompletionEntry>,
    words: Arc<Vec<String>>,
    pos: usize,
}

impl Iterator for Completions {
    type Item = Completion;

    fn next(&mut self) -> Option<Completion> {
        let e = self.entries.get(self.pos)?;
        if e.hits == 0 {
            return None;
        }
        self.pos += 1;

        Some(Completion {
            word: self.words[e.word as usize].clone(),
            hits: e.hits,
        })
    }
}
