// src/lib.rs

//! Fiscal document ingestion library.
//!
//! Normalizes NFC-e receipts from two heterogeneous sources — an uploaded
//! federal-schema XML file, or a SEFAZ verification page — into one canonical
//! record shape, then stores each physical document at most once.

pub mod adapters;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod utils;
