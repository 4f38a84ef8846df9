//! Parser configuration generation from field mappings.
//!
//! Each mapping (source key → target schema path) is classified against the
//! catalog and placed in exactly one bucket. The bucket decides the statement
//! pattern emitted for it:
//!
//! | Bucket | Pattern |
//! |--------|---------|
//! | `Template` | the target field's pre-authored snippet |
//! | `NestedInRepeated` | build a temp object, coerce it, merge it into the repeated ancestor, remove leftovers |
//! | `SelfRepeated` | rename an array source, merge a scalar source |
//! | `RawArray` | rename guarded by an existence check |
//! | `Timestamp` | `date` block over ISO-8601 / UNIX / UNIX_MS |
//! | `Numeric` | `convert` then rename |
//! | `Plain` | rename |
//!
//! Groups are emitted per bucket inside a fixed preamble and epilogue. The
//! output carries no timestamp: identical input produces identical text.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::{Classification, PathClassifier};
use crate::error::{Error, Result};
use crate::sample::{SampleField, SourceValueKind, kind_of};
use crate::stanza::{DateFormat, Statement, render_filter};
use crate::type_map::{ValueType, infer_type_from_path_heuristics};

/// Output when no mapping has a target path.
pub const NO_MAPPINGS_COMMENT: &str = "# No mappings defined. Add at least one field mapping.\n";

const HEADER: &str = "# Logstash Parser Configuration\n\n";
const RAW_MESSAGE_FIELD: &str = "message";
const JSON_ERROR_TAG: &str = "error_json_parse_failed";
const TIMESTAMP_ERROR_TAG: &str = "error_timestamp_parse_failed";

/// One source field mapped to a target schema path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Key into the input sample.
    #[serde(alias = "sourcePath")]
    pub source_path: String,

    /// Dotted target path, not yet checked against the schema.
    #[serde(default, alias = "targetPath", alias = "udmPath")]
    pub target_path: String,

    #[serde(default, alias = "sourceValueKind", alias = "sourceType")]
    pub source_value_kind: SourceValueKind,
}

impl FieldMapping {
    pub fn new(
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        source_value_kind: SourceValueKind,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            source_value_kind,
        }
    }

    /// A mapping whose source kind is taken from the sample, defaulting to
    /// `String` when the sample has no such field.
    pub fn from_sample(
        fields: &[SampleField],
        source_path: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        let source_path = source_path.into();
        let kind = kind_of(fields, &source_path).unwrap_or_default();
        Self::new(source_path, target_path, kind)
    }

    /// Whether the mapping has a non-blank target path.
    pub fn has_target(&self) -> bool {
        !self.target_path.trim().is_empty()
    }
}

/// Parses `source=target`. The kind defaults to `String`.
impl FromStr for FieldMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (source, target) = s
            .split_once('=')
            .ok_or_else(|| Error::Mapping(format!("expected SOURCE=TARGET, got '{s}'")))?;
        let source = source.trim();
        if source.is_empty() {
            return Err(Error::Mapping(format!("empty source path in '{s}'")));
        }
        Ok(Self::new(source, target.trim(), SourceValueKind::default()))
    }
}

/// The statement pattern a mapping is generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Template,
    Timestamp,
    Numeric,
    Plain,
    SelfRepeated,
    NestedInRepeated,
    RawArray,
}

impl Bucket {
    /// Order in which bucket groups appear in the output.
    pub const OUTPUT_ORDER: [Bucket; 7] = [
        Bucket::Template,
        Bucket::Timestamp,
        Bucket::Numeric,
        Bucket::Plain,
        Bucket::SelfRepeated,
        Bucket::NestedInRepeated,
        Bucket::RawArray,
    ];

    fn heading(self) -> &'static str {
        match self {
            Bucket::Template => "Apply field-specific mapping templates",
            Bucket::Timestamp => "Parse timestamp fields",
            Bucket::Numeric => "Convert and map numeric fields",
            Bucket::Plain => "Map string fields",
            Bucket::SelfRepeated => "Map to repeated UDM fields",
            Bucket::NestedInRepeated => "Map fields nested in repeated parent objects",
            Bucket::RawArray => "Handle array fields",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bucket::Template => "template",
            Bucket::Timestamp => "timestamp",
            Bucket::Numeric => "numeric",
            Bucket::Plain => "plain",
            Bucket::SelfRepeated => "self-repeated",
            Bucket::NestedInRepeated => "nested-in-repeated",
            Bucket::RawArray => "raw-array",
        })
    }
}

/// A mapping together with every decision made about it.
#[derive(Debug, Clone)]
pub struct PlannedMapping<'m> {
    pub mapping: &'m FieldMapping,
    pub classification: Classification,
    pub bucket: Bucket,
    /// Declared schema type, or the path heuristic when none is declared.
    pub target_type: ValueType,
}

impl PlannedMapping<'_> {
    fn is_numeric(&self) -> bool {
        self.mapping.source_value_kind == SourceValueKind::Number || self.target_type.is_numeric()
    }

    /// Statements for this mapping, in emission order.
    pub fn statements(&self) -> Vec<Statement> {
        let mut out = Vec::new();
        if !self.classification.resolved {
            out.push(Statement::comment(format!(
                "Note: '{}' is not a known {} field; mapping inferred from the {} source value",
                self.mapping.target_path.trim(),
                self.classification.root,
                self.mapping.source_value_kind
            )));
        }
        match self.bucket {
            Bucket::Template => self.template_statements(&mut out),
            Bucket::Timestamp => self.timestamp_statements(&mut out),
            Bucket::Numeric => self.numeric_statements(&mut out),
            Bucket::Plain => self.plain_statements(&mut out),
            Bucket::SelfRepeated => self.self_repeated_statements(&mut out),
            Bucket::NestedInRepeated => self.nested_statements(&mut out),
            Bucket::RawArray => self.raw_array_statements(&mut out),
        }
        out
    }

    fn source(&self) -> &str {
        &self.mapping.source_path
    }

    fn target(&self) -> &str {
        &self.classification.qualified_path
    }

    // ── Per-bucket patterns ───────────────────────────────────────────────

    fn template_statements(&self, out: &mut Vec<Statement>) {
        let template = self
            .classification
            .mapping_template
            .as_deref()
            .unwrap_or_default();
        out.push(Statement::comment(format!(
            "Template mapping: {} -> {}",
            self.source(),
            self.target()
        )));
        out.push(Statement::Raw(
            template
                .replace("{{source}}", self.source())
                .replace("{{target}}", self.target()),
        ));
    }

    fn timestamp_statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::Date {
            source: self.source().to_string(),
            formats: DateFormat::ALL.to_vec(),
            target: self.target().to_string(),
            on_error: TIMESTAMP_ERROR_TAG.to_string(),
        });
    }

    fn numeric_statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::convert(
            self.source(),
            self.target_type.convert_type(),
        ));
        out.push(Statement::rename(self.source(), self.target()));
    }

    fn plain_statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::rename(self.source(), self.target()));
    }

    fn self_repeated_statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::comment(format!(
            "Repeated field: {} -> {}",
            self.source(),
            self.target()
        )));
        if self.mapping.source_value_kind == SourceValueKind::Array {
            out.push(Statement::comment("Source is already an array, direct rename"));
            out.push(Statement::rename(self.source(), self.target()));
        } else {
            out.push(Statement::comment(
                "Source is a single value, merge creates array automatically",
            ));
            out.push(Statement::merge(self.target(), self.source()));
        }
        out.push(Statement::Blank);
    }

    fn nested_statements(&self, out: &mut Vec<Statement>) {
        let c = &self.classification;
        let (Some(ancestor), Some(qualified_ancestor), Some(relative)) = (
            c.repeated_ancestor_path.as_deref(),
            c.qualified_ancestor_path.as_deref(),
            c.relative_path_from_ancestor.as_deref(),
        ) else {
            // Bucket selection guarantees a repeated ancestor.
            self.plain_statements(out);
            return;
        };

        if c.is_multi_level_repeated() {
            out.push(Statement::comment(format!(
                "Unsupported: {} -> {} sits under more than one repeated field ({}, {})",
                self.source(),
                self.target(),
                ancestor,
                c.deeper_repeated_ancestors.join(", ")
            )));
            out.push(Statement::comment(
                "Build the innermost object, merge it into its sequence, then merge that parent object into the outer sequence by hand",
            ));
            out.push(Statement::comment(format!(
                "Source field '{}' was left in place",
                self.source()
            )));
            out.push(Statement::Blank);
            return;
        }

        let temp_object = temp_object_name(ancestor);
        let temp_field = if relative.is_empty() {
            temp_object.clone()
        } else {
            format!("{temp_object}.{relative}")
        };

        out.push(Statement::comment(format!(
            "Field nested in repeated parent: {} -> {}",
            self.source(),
            self.target()
        )));
        out.push(Statement::comment(format!(
            "Parent '{ancestor}' is repeated, so we build an object and merge it"
        )));
        out.push(Statement::replace(
            temp_field.as_str(),
            format!("%{{{}}}", self.source()),
        ));
        if self.is_numeric() {
            out.push(Statement::convert(
                temp_field.as_str(),
                self.target_type.convert_type(),
            ));
        }
        out.push(Statement::merge(qualified_ancestor, temp_object.as_str()));
        out.push(Statement::remove_fields([self.source(), temp_object.as_str()]));
        out.push(Statement::Blank);
    }

    fn raw_array_statements(&self, out: &mut Vec<Statement>) {
        out.push(Statement::comment(format!(
            "Array field: {} -> {}",
            self.source(),
            self.target()
        )));
        out.push(Statement::comment(
            "Note: Review the source array structure and adjust as needed",
        ));
        out.push(Statement::If {
            field: self.source().to_string(),
            body: vec![Statement::rename(self.source(), self.target())],
        });
    }
}

/// Scratch object used to assemble one element of a repeated ancestor.
///
/// `event.security_result` → `temp_event_security_result_obj`.
pub fn temp_object_name(ancestor_path: &str) -> String {
    format!("temp_{}_obj", ancestor_path.replace('.', "_"))
}

/// Pick the bucket for a classified mapping.
///
/// Strict precedence: explicit template, repeated ancestor, self-repeated
/// target, array source, timestamp target, numeric target or source, plain.
/// A template is ignored under a repeated ancestor, where the value has to be
/// merged in as part of an element rather than written to a fixed path.
pub fn select_bucket(
    mapping: &FieldMapping,
    classification: &Classification,
    target_type: ValueType,
) -> Bucket {
    if classification.mapping_template.is_some() && !classification.has_repeated_ancestor() {
        Bucket::Template
    } else if classification.has_repeated_ancestor() {
        Bucket::NestedInRepeated
    } else if classification.is_self_repeated {
        Bucket::SelfRepeated
    } else if mapping.source_value_kind == SourceValueKind::Array {
        Bucket::RawArray
    } else if target_type == ValueType::Timestamp {
        Bucket::Timestamp
    } else if target_type.is_numeric() || mapping.source_value_kind == SourceValueKind::Number {
        Bucket::Numeric
    } else {
        Bucket::Plain
    }
}

/// Classify and bucket every mapping that has a target path, preserving
/// input order.
///
/// A source key feeds at most one mapping: generated statements move or
/// remove it, so later mappings for the same key are dropped.
pub fn plan<'m>(
    mappings: &'m [FieldMapping],
    classifier: &PathClassifier<'_>,
) -> Vec<PlannedMapping<'m>> {
    let mut seen = HashSet::new();
    mappings
        .iter()
        .filter(|m| m.has_target())
        .filter(|m| {
            let first = seen.insert(m.source_path.as_str());
            if !first {
                tracing::warn!(
                    source_path = %m.source_path,
                    target_path = m.target_path.trim(),
                    "source already mapped, skipping duplicate mapping"
                );
            }
            first
        })
        .map(|mapping| {
            let target_path = mapping.target_path.trim();
            let classification = classifier.classify(target_path);
            let target_type = classification
                .declared_type
                .unwrap_or_else(|| infer_type_from_path_heuristics(target_path));
            let bucket = select_bucket(mapping, &classification, target_type);
            tracing::debug!(
                source_path = %mapping.source_path,
                target_path,
                %bucket,
                %target_type,
                resolved = classification.resolved,
                "planned mapping"
            );
            PlannedMapping {
                mapping,
                classification,
                bucket,
                target_type,
            }
        })
        .collect()
}

/// Statistics collected during generation for reporting.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub mappings_generated: usize,
    pub empty_targets_skipped: usize,
    /// Mappings dropped because an earlier mapping uses the same source key.
    pub duplicate_sources_skipped: usize,
    pub unresolved_targets: usize,
    pub multi_level_repeated: usize,
    pub template: usize,
    pub timestamp: usize,
    pub numeric: usize,
    pub plain: usize,
    pub self_repeated: usize,
    pub nested_in_repeated: usize,
    pub raw_array: usize,
}

impl GenerationStats {
    fn record(&mut self, planned: &PlannedMapping<'_>) {
        self.mappings_generated += 1;
        if !planned.classification.resolved {
            self.unresolved_targets += 1;
        }
        if planned.bucket == Bucket::NestedInRepeated
            && planned.classification.is_multi_level_repeated()
        {
            self.multi_level_repeated += 1;
        }
        let counter = match planned.bucket {
            Bucket::Template => &mut self.template,
            Bucket::Timestamp => &mut self.timestamp,
            Bucket::Numeric => &mut self.numeric,
            Bucket::Plain => &mut self.plain,
            Bucket::SelfRepeated => &mut self.self_repeated,
            Bucket::NestedInRepeated => &mut self.nested_in_repeated,
            Bucket::RawArray => &mut self.raw_array,
        };
        *counter += 1;
    }

    /// Mappings generated in `bucket`.
    pub fn count(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Template => self.template,
            Bucket::Timestamp => self.timestamp,
            Bucket::Numeric => self.numeric,
            Bucket::Plain => self.plain,
            Bucket::SelfRepeated => self.self_repeated,
            Bucket::NestedInRepeated => self.nested_in_repeated,
            Bucket::RawArray => self.raw_array,
        }
    }
}

/// Generated parser text plus what went into it.
#[derive(Debug, Clone)]
pub struct GeneratedParser {
    pub text: String,
    pub stats: GenerationStats,
}

/// Generate a parser configuration for `mappings`.
///
/// Mappings without a target path, and repeat uses of a source key, are
/// skipped; when none remain the output is [`NO_MAPPINGS_COMMENT`] alone.
pub fn generate(mappings: &[FieldMapping], classifier: &PathClassifier<'_>) -> GeneratedParser {
    let planned = plan(mappings, classifier);

    let targeted = mappings.iter().filter(|m| m.has_target()).count();
    let mut stats = GenerationStats {
        empty_targets_skipped: mappings.len() - targeted,
        duplicate_sources_skipped: targeted - planned.len(),
        ..GenerationStats::default()
    };

    if planned.is_empty() {
        return GeneratedParser {
            text: NO_MAPPINGS_COMMENT.to_string(),
            stats,
        };
    }

    let mut body = preamble();
    for bucket in Bucket::OUTPUT_ORDER {
        let members: Vec<_> = planned.iter().filter(|p| p.bucket == bucket).collect();
        if members.is_empty() {
            continue;
        }
        body.push(Statement::Blank);
        body.push(Statement::comment(bucket.heading()));
        for member in members {
            stats.record(member);
            body.extend(member.statements());
        }
    }
    body.extend(epilogue());

    GeneratedParser {
        text: format!("{HEADER}{}", render_filter(&body)),
        stats,
    }
}

// ── Fixed preamble and epilogue ────────────────────────────────────────

fn preamble() -> Vec<Statement> {
    vec![
        Statement::comment("Parse the incoming JSON message"),
        Statement::Json {
            source: RAW_MESSAGE_FIELD.to_string(),
            on_error: JSON_ERROR_TAG.to_string(),
        },
    ]
}

fn epilogue() -> Vec<Statement> {
    vec![
        Statement::Blank,
        Statement::comment("Finalize the event structure"),
        Statement::merge("@output", "event"),
        Statement::Blank,
        Statement::comment("Clean up temporary fields"),
        Statement::remove_fields([RAW_MESSAGE_FIELD]),
    ]
}
