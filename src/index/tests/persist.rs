use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::builder::Builder;
use crate::error::Error;
use crate::result::SearchResult;
use crate::Index;

fn sample_index() -> Index {
    let mut rng = StdRng::seed_from_u64(99);
    let mut b = Builder::new();
    for i in 0..200u64 {
        let nwords = rng.gen_range(1..=5);
        let words: Vec<String> = (0..nwords)
            .map(|_| {
                let len = rng.gen_range(2..7);
                (0..len)
                    .map(|_| (b'a' + rng.gen_range(0..6)) as char)
                    .collect()
            })
            .collect();
        b.add(i, &words, 1000 - i);
    }
    b.delete(13);
    b.add(7, &["rewritten", "entry"], 2000);
    b.build().unwrap()
}

fn answers(index: &Index, queries: &[&[&str]]) -> Vec<(Vec<u32>, Vec<(String, u32)>)> {
    queries
        .iter()
        .map(|q| {
            let mut result = SearchResult::new();
            index.search(q, &mut result);
            (
                result.hits().collect(),
                result.completions().map(|c| (c.word, c.hits)).collect(),
            )
        })
        .collect()
}

#[test]
fn test_roundtrip_answers_identically() {
    let index = sample_index();

    let mut buffer = Vec::new();
    index.write(&mut buffer).unwrap();
    let restored = Index::read(&mut &buffer[..]).unwrap();

    assert_eq!(restored.size(), index.size());
    assert_eq!(restored.words, index.words);

    let queries: Vec<&[&str]> = vec![
        &["a"],
        &["ab"],
        &["b", "c"],
        &["rewr"],
        &["rewritten", "en"],
        &["zzz"],
        &["f", "a", "c"],
    ];
    assert_eq!(answers(&index, &queries), answers(&restored, &queries));
}

#[test]
fn test_roundtrip_empty_index() {
    let index = Builder::new().build().unwrap();

    let mut buffer = Vec::new();
    index.write(&mut buffer).unwrap();
    let restored = Index::read(&mut &buffer[..]).unwrap();

    let mut result = SearchResult::new();
    restored.search(&["x"], &mut result);
    assert_eq!(result.hits().count(), 0);
}

#[test]
fn test_read_rejects_bad_magic() {
    let index = sample_index();
    let mut buffer = Vec::new();
    index.write(&mut buffer).unwrap();
    buffer[0] ^= 0xff;

    assert!(matches!(
        Index::read(&mut &buffer[..]),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn test_read_rejects_unknown_version() {
    let index = sample_index();
    let mut buffer = Vec::new();
    index.write(&mut buffer).unwrap();
    buffer[4] = 0xfe;

    assert!(matches!(
        Index::read(&mut &buffer[..]),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn test_read_rejects_truncated_stream() {
    let index = sample_index();
    let mut buffer = Vec::new();
    index.write(&mut buffer).unwrap();
    buffer.truncate(buffer.len() / 2);

    assert!(Index::read(&mut &buffer[..]).is_err());
}
