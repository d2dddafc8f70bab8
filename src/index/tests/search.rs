use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::builder::Builder;
use crate::result::SearchResult;
use crate::Index;

fn collect_hits(result: &SearchResult) -> Vec<u32> {
    result.hits().collect()
}

fn collect_completions(result: &SearchResult) -> Vec<(String, u32)> {
    result.completions().map(|c| (c.word, c.hits)).collect()
}

#[test]
fn test_incremental_prefix_query() {
    let mut b = Builder::new();
    b.add(1, &["alien"], 1);
    b.add(2, &["alice"], 2);
    b.add(3, &["bob"], 3);
    let index = b.build().unwrap();

    let mut result = SearchResult::new();

    index.search(&["a"], &mut result);
    assert_eq!(collect_hits(&result), vec![2, 1]);
    assert_eq!(
        collect_completions(&result),
        vec![("alice".to_string(), 1), ("alien".to_string(), 1)]
    );

    // Growing the prefix one character at a time refines in place
    for q in ["al", "ali"] {
        index.search(&[q], &mut result);
        assert_eq!(collect_hits(&result), vec![2, 1], "query {:?}", q);
        assert_eq!(
            collect_completions(&result),
            vec![("alice".to_string(), 1), ("alien".to_string(), 1)]
        );
    }

    index.search(&["alie"], &mut result);
    assert_eq!(collect_hits(&result), vec![1]);
    assert_eq!(
        collect_completions(&result),
        vec![("alien".to_string(), 1)]
    );

    // Repeating the query verbatim changes nothing
    index.search(&["alien"], &mut result);
    assert_eq!(collect_hits(&result), vec![1]);

    index.search(&["alienx"], &mut result);
    assert_eq!(collect_hits(&result), Vec::<u32>::new());
    assert_eq!(collect_completions(&result), Vec::new());
}

#[test]
fn test_multi_word_query() {
    let mut b = Builder::new();
    b.add(7, &["answer", "universe", "life"], 0);
    let index = b.build().unwrap();

    let mut result = SearchResult::new();
    index.search(&["u", "l"], &mut result);
    assert_eq!(collect_hits(&result), vec![7]);
    assert_eq!(collect_completions(&result), vec![("life".to_string(), 1)]);

    index.search(&["univ", "li"], &mut result);
    assert_eq!(collect_hits(&result), vec![7]);
    assert_eq!(collect_completions(&result), vec![("life".to_string(), 1)]);
}

#[test]
fn test_multi_word_narrowing() {
    let mut b = Builder::new();
    b.add(1, &["red", "apple"], 1);
    b.add(2, &["red", "berry"], 2);
    b.add(3, &["green", "apple"], 3);
    let index = b.build().unwrap();

    let mut result = SearchResult::new();
    index.search(&["red", "a"], &mut result);
    assert_eq!(collect_hits(&result), vec![1]);
    assert_eq!(collect_completions(&result), vec![("apple".to_string(), 1)]);

    // Appending a token that matches nothing empties the result
    index.search(&["red", "a", "z"], &mut result);
    assert_eq!(collect_hits(&result), Vec::<u32>::new());

    // A continuation of an empty result stays empty without touching blocks
    index.search(&["red", "ap", "z"], &mut result);
    assert_eq!(collect_hits(&result), Vec::<u32>::new());
}

#[test]
fn test_search_empty_index() {
    let index = Builder::new().build().unwrap();

    let mut result = SearchResult::new();
    index.search(&["abc"], &mut result);
    assert_eq!(result.hits().count(), 0);
    assert_eq!(result.completions().count(), 0);

    index.search(&["abcd"], &mut result);
    assert_eq!(result.hits().count(), 0);
}

#[test]
fn test_search_empty_query() {
    let mut b = Builder::new();
    b.add(1, &["word"], 0);
    let index = b.build().unwrap();

    let mut result = SearchResult::new();
    index.search(&[] as &[&str], &mut result);
    assert_eq!(result.hits().count(), 0);
}

#[test]
fn test_out_of_vocabulary_never_fails() {
    let mut b = Builder::new();
    b.add(1, &["alpha", "beta"], 0);
    let index = b.build().unwrap();

    let mut result = SearchResult::new();
    for q in ["zzz", "alphax", "b", "betaa", ""] {
        index.search(&[q], &mut result);
        let _ = result.hits().count();
        let _ = result.completions().count();
    }
}

// ---- Randomized comparison against a brute-force reference ----

struct TestDoc {
    id: u32,
    rank: u64,
    words: Vec<String>,
}

fn generate_corpus(rng: &mut StdRng, ndocs: usize) -> Vec<TestDoc> {
    // A small alphabet forces shared prefixes across the vocabulary
    let vocab: Vec<String> = (0..50)
        .map(|_| {
            let len = rng.gen_range(2..6);
            (0..len)
                .map(|_| (b'a' + rng.gen_range(0..5)) as char)
                .collect()
        })
        .collect();

    (0..ndocs)
        .map(|i| {
            let nwords = rng.gen_range(1..=6);
            let words = (0..nwords)
                .map(|_| vocab[rng.gen_range(0..vocab.len())].clone())
                .collect();
            TestDoc {
                id: i as u32,
                rank: (ndocs - i) as u64,
                words,
            }
        })
        .collect()
}

fn doc_matches(query: &[&str], words: &[String]) -> bool {
    !query.is_empty()
        && query
            .iter()
            .all(|q| words.iter().any(|w| w.starts_with(q)))
}

/// Reference search: hits by descending rank, completions of the last
/// token by (hits desc, word asc).
fn brute_force(docs: &[TestDoc], query: &[&str]) -> (Vec<u32>, Vec<(String, u32)>) {
    let mut matched: Vec<&TestDoc> = docs
        .iter()
        .filter(|d| doc_matches(query, &d.words))
        .collect();
    matched.sort_by(|a, b| b.rank.cmp(&a.rank));
    let hits: Vec<u32> = matched.iter().map(|d| d.id).collect();

    let last = query.last().unwrap();
    let mut counts: std::collections::BTreeMap<&str, u32> = std::collections::BTreeMap::new();
    for d in &matched {
        let mut seen: Vec<&str> = Vec::new();
        for w in &d.words {
            if w.starts_with(last) && !seen.contains(&w.as_str()) {
                seen.push(w);
                *counts.entry(w).or_insert(0) += 1;
            }
        }
    }
    let mut comps: Vec<(String, u32)> = counts
        .into_iter()
        .map(|(w, h)| (w.to_string(), h))
        .collect();
    comps.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    (hits, comps)
}

fn build_index(docs: &[TestDoc]) -> Index {
    let mut b = Builder::new();
    for d in docs {
        b.add(u64::from(d.id), &d.words, d.rank);
    }
    b.build().unwrap()
}

/// All character prefixes of a document's text that end inside a token.
fn prefix_queries(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    (0..chars.len())
        .filter(|&i| !chars[i].is_whitespace())
        .map(|i| chars[..=i].iter().collect())
        .collect()
}

#[test]
fn test_search_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    let docs = generate_corpus(&mut rng, 80);
    let index = build_index(&docs);

    let mut reused = SearchResult::new();
    for d in docs.iter().step_by(3) {
        let text = d.words.join(" ");
        for prefix in prefix_queries(&text) {
            let query: Vec<&str> = prefix.split_whitespace().collect();

            // Incremental path: the result object is reused across the
            // growing prefixes of one document and across documents
            index.search(&query, &mut reused);

            // Fresh path answers must be identical (continuation
            // equivalence)
            let mut fresh = SearchResult::new();
            index.search(&query, &mut fresh);

            let (want_hits, want_comps) = brute_force(&docs, &query);
            assert_eq!(collect_hits(&reused), want_hits, "query {:?}", query);
            assert_eq!(collect_hits(&fresh), want_hits, "query {:?}", query);
            assert_eq!(
                collect_completions(&reused),
                want_comps,
                "query {:?}",
                query
            );
            assert_eq!(collect_completions(&fresh), want_comps, "query {:?}", query);

            // Top-k views are the k-prefix of the full views
            let top: Vec<u32> = reused.top_hits(want_hits.len()).collect();
            assert_eq!(top, want_hits);
            let top3: Vec<u32> = reused.top_hits(3).collect();
            assert_eq!(top3[..], want_hits[..want_hits.len().min(3)]);

            let topc: Vec<(String, u32)> = reused
                .top_completions(want_comps.len())
                .map(|c| (c.word, c.hits))
                .collect();
            assert_eq!(topc, want_comps);
        }
    }
}

#[test]
fn test_block_structure_invariants() {
    let mut rng = StdRng::seed_from_u64(7);
    let docs = generate_corpus(&mut rng, 120);
    let index = build_index(&docs);

    // Blocks partition the word-id space in order
    assert_eq!(index.blocks.first().unwrap().bounds.0, 0);
    assert_eq!(
        index.blocks.last().unwrap().bounds.1 as usize,
        index.words.len() - 1
    );
    for pair in index.blocks.windows(2) {
        assert_eq!(pair[0].bounds.1 + 1, pair[1].bounds.0);
    }

    for block in &index.blocks {
        assert_eq!(
            block.word_bounds.0,
            index.words[block.bounds.0 as usize],
            "lower boundary word"
        );
        assert_eq!(
            block.word_bounds.1,
            index.words[block.bounds.1 as usize],
            "upper boundary word"
        );

        // Document ids are non-decreasing across the concatenated chunks
        let mut prev = 0u32;
        let mut total = 0;
        for chunk in &block.chunks {
            let mut ids = Vec::new();
            chunk.ids.unpack(&mut ids);
            assert_eq!(*ids.last().unwrap(), chunk.id_boundary);
            for &id in &ids {
                assert!(id >= prev, "doc ids must not decrease");
                prev = id;
            }
            total += ids.len();
        }
        assert_eq!(total, block.len as usize);
    }

    // The frequency permutation and its inverse agree
    for (f, &w) in index.freq_word.iter().enumerate() {
        assert!((w as usize) < index.words.len(), "freq_word[{}] in range", f);
    }
}
