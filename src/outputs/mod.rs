//! Where crawled articles end up.
//!
//! # Submodules
//!
//! - [`artifact`]: URL lists and one text artifact per article on disk
//! - [`elastic`]: optional Elasticsearch index fed with each written artifact
//!
//! The artifact text is the contract between the two: the index sink parses
//! it back with [`crate::models::parse_artifact`].

pub mod artifact;
pub mod elastic;
