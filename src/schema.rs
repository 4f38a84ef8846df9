//! UDM schema catalog types, loading, and validation.
//!
//! A catalog is a set of named records (type name → ordered field list). Two
//! of the records are distinguished as roots: the event schema and the entity
//! schema. Fields reference other records by type name instead of nesting
//! them inline, which is what makes hydration necessary.
//!
//! The catalog is immutable once built and is shared by reference with the
//! hydrator and the path classifier.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The bundled catalog covering the commonly mapped part of the UDM.
const BUILTIN_CATALOG: &str = include_str!("../data/udm_catalog.json");

/// One of the two independent root schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Root {
    Event,
    Entity,
}

impl Root {
    pub const ALL: [Root; 2] = [Root::Event, Root::Entity];

    /// Leading path segment that selects this root (e.g. `"event"`).
    pub fn name(self) -> &'static str {
        match self {
            Root::Event => "event",
            Root::Entity => "entity",
        }
    }

    /// Field namespace generated statements write into.
    pub fn namespace(self) -> &'static str {
        match self {
            Root::Event => "event.idm.read_only_udm",
            Root::Entity => "event.idm.entity",
        }
    }

    /// Record name used when a catalog document does not name its roots.
    fn default_record(self) -> &'static str {
        match self {
            Root::Event => "Event",
            Root::Entity => "Entity",
        }
    }

    /// Qualify a root-relative dotted path with this root's namespace.
    ///
    /// `Root::Event.qualify("metadata.product_name")` →
    /// `"event.idm.read_only_udm.metadata.product_name"`.
    pub fn qualify(self, relative: &str) -> String {
        if relative.is_empty() {
            self.namespace().to_string()
        } else {
            format!("{}.{relative}", self.namespace())
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Root {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Root::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown root '{s}' (expected 'event' or 'entity')"))
    }
}

/// A single field definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaNode {
    /// Field name, unique (case-insensitively) among its siblings.
    pub name: String,

    /// Record type name (e.g. `"Noun"`) or primitive tag (e.g. `"string"`,
    /// `"int64"`, `"google.protobuf.Timestamp"`).
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,

    /// Whether the field holds a sequence of its declared type.
    #[serde(default)]
    pub repeated: bool,

    #[serde(default)]
    pub description: String,

    /// Acceptable values when the field is an enumeration.
    #[serde(default, alias = "enumValues")]
    pub enum_values: Vec<String>,

    /// Use cases that treat this field as significant. Used for filtering only.
    #[serde(default, alias = "keyFieldInfo", alias = "keyFieldUseCases")]
    pub key_field_use_cases: BTreeSet<String>,

    /// Inline children. Absent when the type names a catalog record.
    #[serde(default)]
    pub children: Option<Vec<SchemaNode>>,

    /// Pre-authored parser snippet overriding generator inference. Supports
    /// the `{{source}}` and `{{target}}` placeholders.
    #[serde(
        default,
        alias = "logstashMapping",
        alias = "explicitMappingTemplate"
    )]
    pub mapping_template: Option<String>,
}

impl SchemaNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_children(mut self, children: Vec<SchemaNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_use_cases<I, S>(mut self, use_cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_field_use_cases = use_cases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mapping_template(mut self, template: impl Into<String>) -> Self {
        self.mapping_template = Some(template.into());
        self
    }
}

/// Names of the records that serve as roots.
#[derive(Debug, Deserialize)]
struct RootRecords {
    #[serde(default = "default_event_record")]
    event: String,
    #[serde(default = "default_entity_record")]
    entity: String,
}

impl Default for RootRecords {
    fn default() -> Self {
        Self {
            event: default_event_record(),
            entity: default_entity_record(),
        }
    }
}

fn default_event_record() -> String {
    Root::Event.default_record().to_string()
}

fn default_entity_record() -> String {
    Root::Entity.default_record().to_string()
}

/// On-disk catalog document.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    roots: RootRecords,

    records: BTreeMap<String, Vec<SchemaNode>>,
}

/// Immutable catalog of named records plus the two root nodes.
///
/// Built once, then shared read-only by every hydration and classification
/// call. It holds no interior mutability and can be shared across threads.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    version: Option<String>,
    records: BTreeMap<String, Vec<SchemaNode>>,
    event_root: SchemaNode,
    entity_root: SchemaNode,
}

impl TypeCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Catalog version string, if the document declared one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of named records, roots included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// The template field list for a record type.
    pub fn template(&self, type_name: &str) -> Option<&[SchemaNode]> {
        self.records.get(type_name).map(Vec::as_slice)
    }

    /// Whether `type_name` names a catalog record rather than a primitive.
    pub fn is_record(&self, type_name: &str) -> bool {
        self.records.contains_key(type_name)
    }

    /// The synthetic root node for a root schema. Its type is the root record.
    pub fn root_node(&self, root: Root) -> &SchemaNode {
        match root {
            Root::Event => &self.event_root,
            Root::Entity => &self.entity_root,
        }
    }

    /// The fields reachable one level below `node`.
    ///
    /// A type that names a catalog record wins over inline children, so
    /// classification behaves the same on raw and hydrated trees.
    pub fn fields_of<'a>(&'a self, node: &'a SchemaNode) -> &'a [SchemaNode] {
        node.type_name
            .as_deref()
            .and_then(|t| self.template(t))
            .or(node.children.as_deref())
            .unwrap_or(&[])
    }

    fn from_document(doc: CatalogDocument) -> Result<Self> {
        CatalogBuilder {
            version: doc.version,
            event_record: Some(doc.roots.event),
            entity_record: Some(doc.roots.entity),
            records: doc.records,
        }
        .build()
    }
}

/// Incremental constructor for a [`TypeCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    version: Option<String>,
    event_record: Option<String>,
    entity_record: Option<String>,
    records: BTreeMap<String, Vec<SchemaNode>>,
}

impl CatalogBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add (or replace) a named record.
    pub fn record(mut self, name: impl Into<String>, fields: Vec<SchemaNode>) -> Self {
        self.records.insert(name.into(), fields);
        self
    }

    /// Use a record other than `Event` / `Entity` as a root.
    pub fn root_record(mut self, root: Root, record: impl Into<String>) -> Self {
        match root {
            Root::Event => self.event_record = Some(record.into()),
            Root::Entity => self.entity_record = Some(record.into()),
        }
        self
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> Result<TypeCatalog> {
        let event_record = self
            .event_record
            .unwrap_or_else(|| Root::Event.default_record().to_string());
        let entity_record = self
            .entity_record
            .unwrap_or_else(|| Root::Entity.default_record().to_string());

        for (root, record) in [(Root::Event, &event_record), (Root::Entity, &entity_record)] {
            if !self.records.contains_key(record) {
                return Err(Error::MissingRoot {
                    root: root.name().to_string(),
                    record: record.clone(),
                });
            }
        }

        for (name, fields) in &self.records {
            validate_fields(name, name, fields, &self.records)?;
        }

        let root_node = |root: Root, record: String| {
            SchemaNode::new(root.name())
                .typed(record)
                .describe(format!("Root of the {} schema.", root.name()))
        };

        Ok(TypeCatalog {
            version: self.version,
            event_root: root_node(Root::Event, event_record),
            entity_root: root_node(Root::Entity, entity_record),
            records: self.records,
        })
    }
}

/// Check sibling uniqueness and the children-or-record-type rule, recursing
/// into inline children.
fn validate_fields(
    record: &str,
    path: &str,
    fields: &[SchemaNode],
    records: &BTreeMap<String, Vec<SchemaNode>>,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(Error::Catalog {
                record: record.to_string(),
                message: format!("field without a name under '{path}'"),
            });
        }
        if !seen.insert(field.name.to_ascii_lowercase()) {
            return Err(Error::Catalog {
                record: record.to_string(),
                message: format!(
                    "sibling names under '{path}' must be unique ignoring case: '{}'",
                    field.name
                ),
            });
        }

        let Some(children) = &field.children else {
            continue;
        };
        let child_path = format!("{path}.{}", field.name);
        if let Some(type_name) = field.type_name.as_deref() {
            if records.contains_key(type_name) {
                return Err(Error::Catalog {
                    record: record.to_string(),
                    message: format!(
                        "'{child_path}' has inline children and also references record '{type_name}'"
                    ),
                });
            }
        }
        validate_fields(record, &child_path, children, records)?;
    }
    Ok(())
}

/// Parse a catalog document from JSON text.
pub fn parse_catalog(json: &str) -> Result<TypeCatalog> {
    let doc: CatalogDocument = serde_json::from_str(json)?;
    TypeCatalog::from_document(doc)
}

/// Load a catalog document from disk.
pub fn load_catalog(path: &Path) -> Result<TypeCatalog> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_catalog(&content)
}

/// The catalog bundled with the crate.
pub fn builtin_catalog() -> Result<TypeCatalog> {
    parse_catalog(BUILTIN_CATALOG)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_catalog_json() -> &'static str {
        r#"{
            "version": "test",
            "records": {
                "Event": [
                    { "name": "metadata", "type": "Metadata" },
                    { "name": "security_result", "type": "SecurityResult", "repeated": true }
                ],
                "Entity": [
                    { "name": "entity", "type": "Noun" }
                ],
                "Metadata": [
                    { "name": "product_name", "type": "string", "keyFieldInfo": ["Identity"] },
                    {
                        "name": "event_type",
                        "type": "enum",
                        "enumValues": ["GENERIC_EVENT", "USER_LOGIN"]
                    }
                ],
                "SecurityResult": [
                    { "name": "confidence", "type": "integer" }
                ],
                "Noun": [
                    { "name": "hostname", "type": "string" }
                ]
            }
        }"#
    }

    #[test]
    fn parse_minimal_catalog() {
        let catalog = parse_catalog(minimal_catalog_json()).unwrap();
        assert_eq!(catalog.version(), Some("test"));
        assert_eq!(catalog.len(), 5);
        assert!(catalog.is_record("Noun"));
        assert!(!catalog.is_record("string"));
    }

    #[test]
    fn original_key_spellings_are_accepted() {
        let catalog = parse_catalog(minimal_catalog_json()).unwrap();
        let metadata = catalog.template("Metadata").unwrap();
        assert!(metadata[0].key_field_use_cases.contains("Identity"));
        assert_eq!(metadata[1].enum_values, vec!["GENERIC_EVENT", "USER_LOGIN"]);
    }

    #[test]
    fn root_nodes_reference_root_records() {
        let catalog = parse_catalog(minimal_catalog_json()).unwrap();
        let event = catalog.root_node(Root::Event);
        assert_eq!(event.name, "event");
        assert_eq!(event.type_name.as_deref(), Some("Event"));
        assert_eq!(catalog.fields_of(event).len(), 2);
        assert_eq!(catalog.fields_of(catalog.root_node(Root::Entity)).len(), 1);
    }

    #[test]
    fn missing_root_record_is_rejected() {
        let err = TypeCatalog::builder()
            .record("Event", vec![])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingRoot { ref record, .. } if record == "Entity"));
    }

    #[test]
    fn custom_root_records() {
        let catalog = TypeCatalog::builder()
            .record("UdmEvent", vec![SchemaNode::new("x").typed("string")])
            .record("UdmEntity", vec![])
            .root_record(Root::Event, "UdmEvent")
            .root_record(Root::Entity, "UdmEntity")
            .build()
            .unwrap();
        assert_eq!(catalog.fields_of(catalog.root_node(Root::Event))[0].name, "x");
    }

    #[test]
    fn case_insensitive_sibling_duplicates_are_rejected() {
        let err = TypeCatalog::builder()
            .record(
                "Event",
                vec![
                    SchemaNode::new("hostname").typed("string"),
                    SchemaNode::new("HostName").typed("string"),
                ],
            )
            .record("Entity", vec![])
            .build()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Event"));
        assert!(msg.contains("HostName"));
    }

    #[test]
    fn duplicates_inside_inline_children_are_rejected() {
        let err = TypeCatalog::builder()
            .record(
                "Event",
                vec![SchemaNode::new("extra").with_children(vec![
                    SchemaNode::new("a"),
                    SchemaNode::new("A"),
                ])],
            )
            .record("Entity", vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Event.extra"));
    }

    #[test]
    fn inline_children_with_record_type_are_rejected() {
        let err = TypeCatalog::builder()
            .record(
                "Event",
                vec![
                    SchemaNode::new("principal")
                        .typed("Noun")
                        .with_children(vec![SchemaNode::new("ip")]),
                ],
            )
            .record("Entity", vec![])
            .record("Noun", vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Event.principal"));
    }

    #[test]
    fn root_parses_case_insensitively() {
        assert_eq!("Entity".parse::<Root>().unwrap(), Root::Entity);
        assert_eq!("event".parse::<Root>().unwrap(), Root::Event);
        assert!("asset".parse::<Root>().is_err());
    }

    #[test]
    fn qualify_uses_root_namespace() {
        assert_eq!(
            Root::Event.qualify("metadata.product_name"),
            "event.idm.read_only_udm.metadata.product_name"
        );
        assert_eq!(
            Root::Entity.qualify("entity.hostname"),
            "event.idm.entity.entity.hostname"
        );
        assert_eq!(Root::Event.qualify(""), "event.idm.read_only_udm");
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = builtin_catalog().unwrap();
        for record in ["Event", "Entity", "Metadata", "Noun", "SecurityResult", "Process"] {
            assert!(catalog.is_record(record), "missing {record}");
        }
        assert_eq!(catalog.record_names().count(), catalog.len());
    }
}
