//! k-way merge of per-block posting runs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::result::Posting;

/// Heap entry; the reversed ordering turns `BinaryHeap` into a min-heap on
/// document id.
struct MergeEntry {
    id: u32,
    run: usize,
    idx: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.id.cmp(&self.id)
    }
}

/// Merge id-sorted posting runs into `results` by ascending document id,
/// preserving duplicates. The relative order of equal-id postings from
/// different runs is unspecified. A single run is moved, not copied.
pub(crate) fn merge(results: &mut Vec<Posting>, mut runs: Vec<Vec<Posting>>) {
    if runs.len() == 1 {
        *results = runs.pop().unwrap();
        return;
    }

    let mut heap = BinaryHeap::with_capacity(runs.len());
    for (r, run) in runs.iter().enumerate() {
        if let Some(first) = run.first() {
            heap.push(MergeEntry {
                id: first.id,
                run: r,
                idx: 0,
            });
        }
    }

    let mut out = std::mem::take(results);
    out.clear();

    while let Some(e) = heap.pop() {
        let run = &runs[e.run];
        out.push(run[e.idx]);

        if e.idx + 1 < run.len() {
            heap.push(MergeEntry {
                id: run[e.idx + 1].id,
                run: e.run,
                idx: e.idx + 1,
            });
        }
    }

    *results = out;
}
