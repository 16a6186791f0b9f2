//! # edito-crdt — WOOT sequence CRDT for collaborative text editing
//!
//! Implements the WOOT (WithOut Operational Transformation) algorithm:
//! every character carries an immutable globally unique identity plus the
//! identities of the characters it was generated between. Concurrent
//! inserts into the same region are ordered by the identity total order,
//! so replicas converge regardless of delivery order.
//!
//! ```
//! use edito_crdt::Document;
//!
//! let mut doc = Document::with_site(1);
//! doc.generate_insert(1, "h").unwrap();
//! doc.generate_insert(2, "i").unwrap();
//! assert_eq!(doc.content(), "hi");
//! ```
//!
//! The engine is pure and single-threaded per instance: no I/O, no
//! logging, no interior mutability. Failed operations return an error and
//! leave the document untouched.
//!
//! Reference: Oster et al. — Data Consistency for P2P Collaborative
//! Editing, CSCW 2006

pub mod document;

pub use document::{Character, Document, DocumentError, Site, END_ID, START_ID};
