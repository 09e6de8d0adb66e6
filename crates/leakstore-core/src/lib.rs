//! Leakstore Core Types
//!
//! Shared data model for the leakstore toolchain - the pieces every other
//! crate agrees on:
//!
//! - [`Pointer`] / [`SearchHit`]: location references into part files
//! - [`BucketLayout`]: on-disk naming conventions for bucket directories
//! - [`FrequencyTable`]: key -> count statistics with order-independent merge
//! - [`Error`]: the common error taxonomy (`NotFound`, `MalformedInput`,
//!   `CorruptPointer`)
//!
//! ## The data model in one paragraph
//!
//! Harvested text records live in numbered, append-only part files grouped
//! into bucket directories. A search index stores only lightweight location
//! pointers (bucket, part, byte offset) plus a few searchable fields, never
//! the record text itself. Everything in this crate exists to make those
//! pointers unambiguous: the layout says where a part file lives, a pointer
//! says where a line starts inside it, and the frequency table summarizes
//! the derived keys of the offset index.

pub mod error;
pub mod freq;
pub mod layout;
pub mod pointer;

pub use error::{Error, Result};
pub use freq::{derive_tld, FrequencyTable};
pub use layout::BucketLayout;
pub use pointer::{Pointer, SearchHit};
