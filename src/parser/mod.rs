// src/parser/mod.rs

//! Parsers that turn raw document bytes into the canonical model.

mod xml;

pub use xml::parse_xml;
