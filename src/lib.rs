//! Explore the UDM security-event schema and generate parser mappings for it.
//!
//! `udm-mapgen` loads a catalog of UDM record definitions, hydrates the event
//! and entity roots into browsable trees, classifies dotted target paths
//! against them, and turns a list of source → target field mappings into a
//! Logstash-style parser configuration.
//!
//! # Features
//!
//! - Hydrates recursive record references with an ancestor-chain cycle guard
//! - Resolves target paths case-insensitively against either root schema
//! - Detects repeated fields and repeated ancestors, including multi-level
//!   repetition
//! - Emits a per-mapping statement pattern (rename, convert, date, merge into
//!   a repeated parent, or a field-specific template)
//! - Deterministic output: identical mappings produce byte-identical text
//!
//! # Usage
//!
//! ```no_run
//! use udm_mapgen::classify::PathClassifier;
//! use udm_mapgen::codegen::{self, FieldMapping};
//! use udm_mapgen::sample::SourceValueKind;
//!
//! let catalog = udm_mapgen::schema::builtin_catalog()?;
//! let classifier = PathClassifier::new(&catalog);
//! let mappings = vec![
//!     FieldMapping::new("ts", "metadata.event_timestamp", SourceValueKind::String),
//!     FieldMapping::new("rule", "security_result.rule_name", SourceValueKind::String),
//! ];
//! let parser = codegen::generate(&mappings, &classifier);
//! print!("{}", parser.text);
//! # Ok::<(), udm_mapgen::error::Error>(())
//! ```

pub mod classify;
pub mod codegen;
pub mod error;
pub mod hydrate;
pub mod sample;
pub mod schema;
pub mod stanza;
pub mod type_map;
