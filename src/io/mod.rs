//! # I/O Module
//!
//! File reading boundaries. Converts catalog text files into the in-memory
//! [`History`](crate::data::History).

pub mod catalog;

pub use catalog::{parse_catalog, read_catalog};
