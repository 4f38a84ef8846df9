//! Path classification against the catalog.
//!
//! Given a dotted target path, walks the root schema it names and reports
//! where the target sits structurally: whether it resolves at all, whether it
//! is itself repeated, and whether it lives under a repeated ancestor (and if
//! so, where that ancestor is and the path relative to it).
//!
//! Classification never fails. Unknown segments stop the walk and leave
//! `resolved = false`; the generator then works from the source value alone.

use serde::Serialize;

use crate::schema::{Root, SchemaNode, TypeCatalog};
use crate::type_map::{ValueType, declared_value_type};

/// Outcome of the root-selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootSelection<'p> {
    pub root: Root,
    /// `false` when the path named no root and `Event` was assumed.
    pub explicit: bool,
    /// The path with the namespace prefix or root segment removed.
    pub remainder: &'p str,
}

/// Pick the root schema a target path refers to.
///
/// Tried in order: a full output namespace prefix
/// (`event.idm.read_only_udm.` / `event.idm.entity.`), then a leading
/// `event` / `entity` segment. Anything else defaults to `Event`.
pub fn select_root(path: &str) -> RootSelection<'_> {
    let path = path.trim();

    for root in Root::ALL {
        if let Some(rest) = strip_prefix_ignore_case(path, root.namespace()) {
            if let Some(rest) = rest.strip_prefix('.') {
                return RootSelection {
                    root,
                    explicit: true,
                    remainder: rest,
                };
            }
        }
    }

    let (head, rest) = path.split_once('.').unwrap_or((path, ""));
    for root in Root::ALL {
        if head.eq_ignore_ascii_case(root.name()) {
            return RootSelection {
                root,
                explicit: true,
                remainder: rest,
            };
        }
    }

    RootSelection {
        root: Root::Event,
        explicit: false,
        remainder: path,
    }
}

fn strip_prefix_ignore_case<'p>(s: &'p str, prefix: &str) -> Option<&'p str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

/// Where a target path sits in the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub root: Root,
    pub root_explicit: bool,

    /// Every segment matched a schema field.
    pub resolved: bool,

    /// Root-prefixed dotted path, in catalog spelling where resolved.
    pub canonical_path: String,

    /// The path generated statements write to.
    pub qualified_path: String,

    /// The leaf is declared repeated and no ancestor is.
    pub is_self_repeated: bool,

    /// Root-prefixed path of the shallowest repeated ancestor.
    pub repeated_ancestor_path: Option<String>,

    /// Namespace-qualified form of `repeated_ancestor_path`.
    pub qualified_ancestor_path: Option<String>,

    /// The target path relative to the repeated ancestor.
    pub relative_path_from_ancestor: Option<String>,

    /// Repeated ancestors below the shallowest one. Non-empty means the
    /// target needs multi-level sequence construction.
    pub deeper_repeated_ancestors: Vec<String>,

    /// Value type declared by the schema for the leaf, if primitive.
    pub declared_type: Option<ValueType>,

    /// Explicit template attached to the leaf field.
    pub mapping_template: Option<String>,
}

impl Classification {
    pub fn has_repeated_ancestor(&self) -> bool {
        self.repeated_ancestor_path.is_some()
    }

    pub fn is_multi_level_repeated(&self) -> bool {
        !self.deeper_repeated_ancestors.is_empty()
    }
}

/// Classifies target paths against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct PathClassifier<'a> {
    catalog: &'a TypeCatalog,
}

impl<'a> PathClassifier<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a TypeCatalog {
        self.catalog
    }

    /// The field a target path resolves to, if any.
    pub fn resolve(&self, target_path: &str) -> Option<&'a SchemaNode> {
        let walk = self.walk(target_path);
        walk.resolved.then_some(walk.leaf).flatten()
    }

    /// Classify a dotted target path.
    pub fn classify(&self, target_path: &str) -> Classification {
        let walk = self.walk(target_path);
        let root = walk.root;

        let join = |segments: &[String]| {
            std::iter::once(root.name())
                .chain(segments.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(".")
        };

        let (repeated_ancestor_path, qualified_ancestor_path, relative_path_from_ancestor) =
            match walk.repeated_ancestors.first() {
                Some(&i) => (
                    Some(join(&walk.segments[..=i])),
                    Some(root.qualify(&walk.segments[..=i].join("."))),
                    Some(walk.segments[i + 1..].join(".")),
                ),
                None => (None, None, None),
            };

        let deeper_repeated_ancestors = walk
            .repeated_ancestors
            .iter()
            .skip(1)
            .map(|&i| join(&walk.segments[..=i]))
            .collect::<Vec<_>>();
        if !deeper_repeated_ancestors.is_empty() {
            tracing::warn!(
                target_path,
                ancestors = ?deeper_repeated_ancestors,
                "target sits under more than one repeated ancestor"
            );
        }

        let leaf = walk.leaf.filter(|_| walk.resolved);
        let is_self_repeated =
            repeated_ancestor_path.is_none() && leaf.is_some_and(|node| node.repeated);
        let declared_type = leaf.and_then(|node| {
            let type_name = node.type_name.as_deref().unwrap_or_default();
            if self.catalog.is_record(type_name) {
                return None;
            }
            declared_value_type(type_name, !node.enum_values.is_empty())
        });

        Classification {
            root,
            root_explicit: walk.root_explicit,
            resolved: walk.resolved,
            canonical_path: join(&walk.segments),
            qualified_path: root.qualify(&walk.segments.join(".")),
            is_self_repeated,
            repeated_ancestor_path,
            qualified_ancestor_path,
            relative_path_from_ancestor,
            deeper_repeated_ancestors,
            declared_type,
            mapping_template: leaf.and_then(|node| node.mapping_template.clone()),
        }
    }

    fn walk(&self, target_path: &str) -> Walk<'a> {
        let selection = select_root(target_path);
        let mut raw: Vec<&str> = selection
            .remainder
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let root_fields = self.catalog.fields_of(self.catalog.root_node(selection.root));
        // `event.idm.read_only_udm.event.x` repeats the root name; drop it
        // unless the root really has a field by that name.
        let redundant_root = raw.first().is_some_and(|first| {
            first.eq_ignore_ascii_case(selection.root.name())
                && !root_fields.iter().any(|f| f.name.eq_ignore_ascii_case(first))
        });
        if redundant_root {
            raw.remove(0);
        }

        let mut walk = Walk {
            root: selection.root,
            root_explicit: selection.explicit,
            // A bare root names no field.
            resolved: !raw.is_empty(),
            segments: Vec::with_capacity(raw.len()),
            repeated_ancestors: Vec::new(),
            leaf: None,
        };

        let mut level = root_fields;
        for (i, segment) in raw.iter().enumerate() {
            let Some(node) = level.iter().find(|c| c.name.eq_ignore_ascii_case(segment)) else {
                tracing::debug!(target_path, segment, "segment not found in schema");
                walk.resolved = false;
                walk.segments
                    .extend(raw[i..].iter().map(|s| s.to_string()));
                break;
            };
            walk.segments.push(node.name.clone());

            if i + 1 == raw.len() {
                walk.leaf = Some(node);
                break;
            }
            if node.repeated {
                walk.repeated_ancestors.push(i);
            }
            level = self.catalog.fields_of(node);
        }

        walk
    }
}

/// Raw result of walking a path through the catalog.
struct Walk<'a> {
    root: Root,
    root_explicit: bool,
    resolved: bool,
    segments: Vec<String>,
    /// Indices into `segments` of repeated non-leaf fields, shallowest first.
    repeated_ancestors: Vec<usize>,
    leaf: Option<&'a SchemaNode>,
}
