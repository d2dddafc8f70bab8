//! hyb - autocompletion search over a succinct inverted index
//!
//! Implements the HYB structure from Bast & Weber, "Type Less, Find More:
//! Fast Autocompletion Search with a Succinct Index" (SIGIR 2006). Given a
//! multi-word query whose last token is a prefix, the index returns the
//! matching document IDs ranked by a caller-supplied rank, together with the
//! vocabulary words completing the last token ranked by hit count.
//!
//! This library provides:
//! - A builder that turns (id, keywords, rank) documents into a compact,
//!   block-partitioned index, with overwrite and delete semantics
//! - Bitpacked posting chunks (128-integer vertical layout, delta-coded
//!   document IDs)
//! - Incremental search: a query that refines the previous one reuses the
//!   previous result set instead of touching block data
//! - Top-k hit and completion views backed by bounded min-heaps
//! - Byte-stream serialization of the built index
//!
//! The caller pre-tokenizes documents and queries; the index performs no
//! linguistic processing and compares strings byte-wise.
//!
//! ```
//! use hyb::{Builder, SearchResult};
//!
//! let mut builder = Builder::new();
//! builder.add(1, &["alien"], 1);
//! builder.add(2, &["alice"], 2);
//! let index = builder.build().unwrap();
//!
//! let mut result = SearchResult::new();
//! index.search(&["ali"], &mut result);
//! let ids: Vec<u32> = result.hits().collect();
//! assert_eq!(ids, vec![2, 1]);
//! ```

pub mod builder;
pub mod error;
pub mod index;
pub mod result;
pub mod structures;

pub use builder::{Builder, BuilderConfig};
pub use error::{Error, Result};
pub use index::Index;
pub use result::{Completion, Completions, Hits, SearchResult};
pub use structures::PackedInts;

/// Document identifier as stored in postings.
pub type DocId = u32;
/// Position of a word in the lexicographically sorted vocabulary.
pub type WordId = u32;
/// Normalized document rank; larger means better.
pub type Rank = u32;
