//! End-to-end integration tests for udm-mapgen.
//!
//! Most tests build a small catalog in code; a few run against the bundled
//! UDM catalog to check that it hydrates and classifies cleanly.

use std::io::Write;

use proptest::prelude::*;

use udm_mapgen::classify::PathClassifier;
use udm_mapgen::codegen::{self, Bucket, FieldMapping, NO_MAPPINGS_COMMENT};
use udm_mapgen::error::Error;
use udm_mapgen::hydrate::{self, HydratedNode, MAX_HYDRATION_DEPTH};
use udm_mapgen::sample::{self, SourceValueKind};
use udm_mapgen::schema::{self, Root, SchemaNode, TypeCatalog};

/// Event with a plain `metadata` record and a repeated `security_result`.
fn test_catalog() -> TypeCatalog {
    TypeCatalog::builder()
        .version("test")
        .record(
            "Event",
            vec![
                SchemaNode::new("metadata").typed("Metadata"),
                SchemaNode::new("security_result")
                    .typed("SecurityResult")
                    .repeated(),
            ],
        )
        .record(
            "Entity",
            vec![SchemaNode::new("entity").with_children(vec![
                SchemaNode::new("hostname").typed("string"),
            ])],
        )
        .record(
            "Metadata",
            vec![
                SchemaNode::new("product_name").typed("string"),
                SchemaNode::new("event_timestamp").typed("google.protobuf.Timestamp"),
            ],
        )
        .record(
            "SecurityResult",
            vec![SchemaNode::new("confidence").typed("integer")],
        )
        .build()
        .expect("test catalog should build")
}

fn mutate_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| {
            ["rename =>", "replace =>", "convert =>", "merge =>", "remove_field =>"]
                .iter()
                .any(|op| l.starts_with(op))
        })
        .collect()
}

#[test]
fn hydrated_record_reference_is_expanded() {
    let catalog = test_catalog();
    let event = hydrate::hydrate_root(&catalog, Root::Event).unwrap();

    let metadata = event.child("metadata").unwrap();
    let names: Vec<_> = metadata.children.iter().map(HydratedNode::name).collect();
    assert_eq!(names, vec!["product_name", "event_timestamp"]);
    assert!(!metadata.cycle_cut);
}

#[test]
fn repeated_ancestor_is_reported_relative_to_root() {
    let catalog = test_catalog();
    let c = PathClassifier::new(&catalog).classify("event.security_result.confidence");

    assert!(c.resolved);
    assert_eq!(c.repeated_ancestor_path.as_deref(), Some("event.security_result"));
    assert_eq!(
        c.qualified_ancestor_path.as_deref(),
        Some("event.idm.read_only_udm.security_result")
    );
    assert_eq!(c.relative_path_from_ancestor.as_deref(), Some("confidence"));
}

#[test]
fn nested_numeric_mapping_builds_converts_merges_and_cleans_up() {
    let catalog = test_catalog();
    let mappings = [FieldMapping::new(
        "risk_score",
        "event.security_result.confidence",
        SourceValueKind::String,
    )];
    let out = codegen::generate(&mappings, &PathClassifier::new(&catalog));

    assert_eq!(
        mutate_lines(&out.text),
        vec![
            r#"replace => { "temp_event_security_result_obj.confidence" => "%{risk_score}" }"#,
            r#"convert => { "temp_event_security_result_obj.confidence" => "integer" }"#,
            r#"merge => { "event.idm.read_only_udm.security_result" => "temp_event_security_result_obj" }"#,
            r#"remove_field => ["risk_score", "temp_event_security_result_obj"]"#,
            r#"merge => { "@output" => "event" }"#,
            r#"remove_field => ["message"]"#,
        ]
    );
    assert!(!out.text.contains(r#"convert => { "risk_score""#));
    assert_eq!(out.stats.count(Bucket::NestedInRepeated), 1);
}

#[test]
fn timestamp_mapping_is_a_date_block_without_rename() {
    let catalog = test_catalog();
    let mappings = [FieldMapping::new(
        "ts",
        "event.metadata.event_timestamp",
        SourceValueKind::String,
    )];
    let out = codegen::generate(&mappings, &PathClassifier::new(&catalog));

    assert!(out.text.contains(
        "  date {\n    match => [\"ts\", \"ISO8601\", \"UNIX\", \"UNIX_MS\"]\n    target => \"event.idm.read_only_udm.metadata.event_timestamp\"\n"
    ));
    assert!(!out.text.contains("rename"));
    assert_eq!(out.stats.timestamp, 1);
}

#[test]
fn empty_mapping_list_yields_only_the_comment() {
    let catalog = test_catalog();
    let out = codegen::generate(&[], &PathClassifier::new(&catalog));
    assert_eq!(out.text, NO_MAPPINGS_COMMENT);
    assert_eq!(out.stats.mappings_generated, 0);
}

#[test]
fn generated_text_has_fixed_frame() {
    let catalog = test_catalog();
    let mappings = [FieldMapping::new(
        "product",
        "metadata.product_name",
        SourceValueKind::String,
    )];
    let text = codegen::generate(&mappings, &PathClassifier::new(&catalog)).text;

    assert!(text.starts_with("# Logstash Parser Configuration\n\nfilter {\n"));
    assert!(text.contains("  json {\n    source => \"message\"\n"));
    assert!(text.contains("  # Map string fields\n"));
    assert!(text.contains("  # Finalize the event structure\n"));
    assert!(text.ends_with("    remove_field => [\"message\"]\n  }\n}\n"));
}

#[test]
fn generation_is_deterministic() {
    let catalog = schema::builtin_catalog().unwrap();
    let classifier = PathClassifier::new(&catalog);
    let mappings = vec![
        FieldMapping::new("ts", "metadata.event_timestamp", SourceValueKind::String),
        FieldMapping::new("rule", "security_result.rule_name", SourceValueKind::String),
        FieldMapping::new("ip", "principal.ip", SourceValueKind::String),
        FieldMapping::new("bytes", "network.sent_bytes", SourceValueKind::Number),
    ];
    let first = codegen::generate(&mappings, &classifier);
    let second = codegen::generate(&mappings, &classifier);
    assert_eq!(first.text, second.text);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn sample_to_parser_end_to_end() {
    let catalog = schema::builtin_catalog().unwrap();
    let classifier = PathClassifier::new(&catalog);
    let fields = sample::extract_fields(
        r#"{
            "ts": "2024-05-01T12:00:00Z",
            "src_ip": "10.0.0.1",
            "bytes": 1024,
            "rule": "brute-force",
            "score": 0.7,
            "hosts": ["a", "b"],
            "action": "login"
        }"#,
    )
    .unwrap();

    let pairs = [
        ("ts", "metadata.event_timestamp"),
        ("src_ip", "principal.ip"),
        ("bytes", "network.sent_bytes"),
        ("rule", "security_result.rule_name"),
        ("score", "security_result.risk_score"),
        ("hosts", "principal.hostname"),
        ("action", "metadata.event_type"),
        ("unused", ""),
    ];
    let mappings: Vec<_> = pairs
        .iter()
        .map(|(s, t)| FieldMapping::from_sample(&fields, *s, *t))
        .collect();

    let out = codegen::generate(&mappings, &classifier);
    let stats = &out.stats;
    assert_eq!(stats.mappings_generated, 7);
    assert_eq!(stats.empty_targets_skipped, 1);
    assert_eq!(stats.timestamp, 1);
    assert_eq!(stats.self_repeated, 1);
    assert_eq!(stats.numeric, 1);
    assert_eq!(stats.nested_in_repeated, 2);
    assert_eq!(stats.raw_array, 1);
    assert_eq!(stats.template, 1);
    assert_eq!(stats.unresolved_targets, 0);

    let text = &out.text;
    assert!(text.contains(r#"merge => { "event.idm.read_only_udm.principal.ip" => "src_ip" }"#));
    assert!(text.contains(r#"convert => { "temp_event_security_result_obj.risk_score" => "float" }"#));
    assert!(text.contains("  if [hosts] {\n"));
    assert!(text.contains(r#"uppercase => [ "action" ]"#));

    // Groups appear in a fixed order regardless of input order.
    let order: Vec<_> = [
        "# Apply field-specific mapping templates",
        "# Parse timestamp fields",
        "# Convert and map numeric fields",
        "# Map to repeated UDM fields",
        "# Map fields nested in repeated parent objects",
        "# Handle array fields",
    ]
    .iter()
    .map(|h| text.find(h).unwrap_or_else(|| panic!("missing {h}")))
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn multi_level_repetition_is_flagged_not_generated() {
    let catalog = schema::builtin_catalog().unwrap();
    let mappings = [FieldMapping::new(
        "label_key",
        "security_result.detection_fields.key",
        SourceValueKind::String,
    )];
    let out = codegen::generate(&mappings, &PathClassifier::new(&catalog));
    assert_eq!(out.stats.multi_level_repeated, 1);
    assert!(out.text.contains("# Unsupported: label_key -> "));
    assert!(!out.text.contains("%{label_key}"));
}

#[test]
fn one_source_feeds_only_its_first_mapping() {
    let catalog = schema::builtin_catalog().unwrap();
    let mappings = [
        FieldMapping::new("rule", "metadata.description", SourceValueKind::String),
        FieldMapping::new("rule", "security_result.rule_name", SourceValueKind::String),
    ];
    let out = codegen::generate(&mappings, &PathClassifier::new(&catalog));

    assert_eq!(out.stats.duplicate_sources_skipped, 1);
    assert_eq!(out.stats.plain, 1);
    assert_eq!(out.stats.nested_in_repeated, 0);
    assert_eq!(
        mutate_lines(&out.text)[0],
        r#"rename => { "rule" => "event.idm.read_only_udm.metadata.description" }"#
    );
    assert!(!out.text.contains("%{rule}"));
}

#[test]
fn namespaced_path_with_root_segment_resolves() {
    let catalog = schema::builtin_catalog().unwrap();
    let c = PathClassifier::new(&catalog)
        .classify("event.idm.read_only_udm.event.metadata.product_name");
    assert!(c.resolved);
    assert_eq!(c.qualified_path, "event.idm.read_only_udm.metadata.product_name");
}

#[test]
fn builtin_catalog_hydrates_both_roots() {
    let catalog = schema::builtin_catalog().unwrap();
    let tree = hydrate::hydrate_schema(&catalog);

    assert!(!tree.event.is_placeholder());
    assert!(!tree.entity.is_placeholder());
    assert!(tree.event.find("metadata.event_timestamp").is_some());
    assert!(tree.entity.find("entity.hostname").is_some());

    let parent = tree
        .event
        .find("principal.process.parent_process")
        .expect("recursive field should be present");
    assert!(parent.cycle_cut);
    assert!(parent.children.is_empty());
}

#[test]
fn every_hydrated_leaf_classifies_to_itself() {
    let catalog = schema::builtin_catalog().unwrap();
    let classifier = PathClassifier::new(&catalog);
    let tree = hydrate::hydrate_schema(&catalog);

    for root in Root::ALL {
        let root_node = tree.root(root);
        for path in root_node.leaf_paths() {
            let c = classifier.classify(&path);
            assert!(c.resolved, "{path} should resolve");
            assert_eq!(c.root, root, "{path}");
            assert_eq!(c.canonical_path, path);

            if !c.has_repeated_ancestor() {
                let relative = path.split_once('.').map_or("", |(_, rest)| rest);
                let leaf = root_node.find(relative).unwrap();
                assert_eq!(c.is_self_repeated, leaf.is_repeated(), "{path}");
            }
        }
    }
}

#[test]
fn classification_ignores_case() {
    let catalog = schema::builtin_catalog().unwrap();
    let c = PathClassifier::new(&catalog).classify("EVENT.Security_Result.Rule_Name");
    assert!(c.resolved);
    assert_eq!(c.canonical_path, "event.security_result.rule_name");
}

#[test]
fn runaway_nesting_falls_back_to_placeholder() {
    let mut builder = TypeCatalog::builder()
        .record("Event", vec![SchemaNode::new("deep").typed("T0")])
        .record("Entity", vec![SchemaNode::new("id").typed("string")]);
    for i in 0..=MAX_HYDRATION_DEPTH + 1 {
        builder = builder.record(
            format!("T{i}"),
            vec![SchemaNode::new("next").typed(format!("T{}", i + 1))],
        );
    }
    let catalog = builder.build().unwrap();

    let err = hydrate::hydrate_root(&catalog, Root::Event).unwrap_err();
    assert!(matches!(err, Error::Hydration { .. }));

    let tree = hydrate::hydrate_schema(&catalog);
    assert!(tree.event.is_placeholder());
    assert_eq!(tree.event.name(), "Error");
    assert!(!tree.entity.is_placeholder());
}

#[test]
fn catalog_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "version": "disk",
            "records": {{
                "Event": [{{"name": "metadata", "type": "Metadata"}}],
                "Entity": [{{"name": "entity", "type": "string"}}],
                "Metadata": [{{"name": "product_name", "type": "string"}}]
            }}
        }}"#
    )
    .unwrap();

    let catalog = schema::load_catalog(file.path()).unwrap();
    assert_eq!(catalog.version(), Some("disk"));
    assert!(
        PathClassifier::new(&catalog)
            .classify("metadata.product_name")
            .resolved
    );
}

#[test]
fn missing_catalog_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = schema::load_catalog(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn mappings_file_round_trips_through_generation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"source_path": "p", "target_path": "metadata.product_name"}},
            {{"sourcePath": "t", "targetPath": "metadata.event_timestamp", "sourceValueKind": "string"}}
        ]"#
    )
    .unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let mappings: Vec<FieldMapping> = serde_json::from_str(&content).unwrap();
    let catalog = test_catalog();
    let out = codegen::generate(&mappings, &PathClassifier::new(&catalog));
    assert_eq!(out.stats.plain, 1);
    assert_eq!(out.stats.timestamp, 1);
}

// ── Properties ─────────────────────────────────────────────────────────

const GRAPH_SIZE: usize = 5;

/// Catalog whose records T0..T4 reference each other along `edges`.
fn graph_catalog(edges: &[Vec<usize>]) -> TypeCatalog {
    let mut builder = TypeCatalog::builder()
        .record("Event", vec![SchemaNode::new("a").typed("T0")])
        .record("Entity", vec![SchemaNode::new("b").typed("T1").repeated()]);
    for (i, targets) in edges.iter().enumerate() {
        let fields = targets
            .iter()
            .enumerate()
            .map(|(j, t)| SchemaNode::new(format!("f{j}")).typed(format!("T{t}")))
            .chain(std::iter::once(SchemaNode::new("leaf").typed("string")))
            .collect();
        builder = builder.record(format!("T{i}"), fields);
    }
    builder.build().unwrap()
}

/// No record type repeats along any root-to-node chain, except on a cut node.
fn assert_no_repeated_type<'a>(node: &HydratedNode<'a>, chain: &mut Vec<&'a str>) {
    let t = node.type_name();
    if let Some(t) = t {
        if node.cycle_cut {
            assert!(chain.contains(&t));
            assert!(node.children.is_empty());
            return;
        }
        assert!(!chain.contains(&t), "{t} expanded twice on one chain");
        chain.push(t);
    }
    for child in &node.children {
        assert_no_repeated_type(child, chain);
    }
    if t.is_some() {
        chain.pop();
    }
}

proptest! {
    #[test]
    fn hydration_terminates_on_any_reference_graph(
        edges in prop::collection::vec(prop::collection::vec(0..GRAPH_SIZE, 0..3), GRAPH_SIZE)
    ) {
        let catalog = graph_catalog(&edges);
        for root in Root::ALL {
            let tree = hydrate::hydrate_root(&catalog, root).unwrap();
            assert_no_repeated_type(&tree, &mut Vec::new());
        }
    }

    #[test]
    fn classify_never_panics(path in "\\PC{0,60}") {
        let catalog = test_catalog();
        let c = PathClassifier::new(&catalog).classify(&path);
        if c.resolved {
            prop_assert!(c.qualified_path.starts_with(c.root.namespace()));
        }
    }

    #[test]
    fn dotted_paths_classify_consistently(
        segments in prop::collection::vec("[a-zA-Z_]{1,12}", 0..6)
    ) {
        let catalog = schema::builtin_catalog().unwrap();
        let classifier = PathClassifier::new(&catalog);
        let path = segments.join(".");
        let c = classifier.classify(&path);
        prop_assert_eq!(classifier.resolve(&path).is_some(), c.resolved);
        if c.has_repeated_ancestor() {
            prop_assert!(c.relative_path_from_ancestor.is_some());
            prop_assert!(c.qualified_ancestor_path.is_some());
        }
    }
}
