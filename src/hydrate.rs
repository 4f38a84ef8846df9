//! Schema hydration: expand record references into a fully materialized tree.
//!
//! A hydrated node borrows its field definition from the [`TypeCatalog`];
//! only the child lists are newly allocated. A node whose record type already
//! appears on its own ancestor chain is cut (kept, but given no children),
//! which bounds the tree for recursive types such as `Process.parent_process`
//! or `Resource → Attribute → Cloud → Resource`.

use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::schema::{Root, SchemaNode, TypeCatalog};

/// Nesting depth past which hydration gives up.
pub const MAX_HYDRATION_DEPTH: usize = 64;

static ERROR_NODE: LazyLock<SchemaNode> = LazyLock::new(|| {
    SchemaNode::new("Error").describe("The schema could not be hydrated.")
});

/// A field definition together with its materialized children.
#[derive(Debug, Clone)]
pub struct HydratedNode<'a> {
    pub field: &'a SchemaNode,
    pub children: Vec<HydratedNode<'a>>,
    /// The field's type was already on the ancestor chain; children omitted.
    pub cycle_cut: bool,
}

/// Both root trees, ready for display and search.
#[derive(Debug, Clone)]
pub struct HydratedSchema<'a> {
    pub event: HydratedNode<'a>,
    pub entity: HydratedNode<'a>,
}

impl<'a> HydratedSchema<'a> {
    pub fn root(&self, root: Root) -> &HydratedNode<'a> {
        match root {
            Root::Event => &self.event,
            Root::Entity => &self.entity,
        }
    }
}

/// Options for pruning a hydrated tree to the parts a viewer should show.
#[derive(Debug, Clone, Default)]
pub struct TreeFilter {
    /// Case-insensitive substring matched against field names.
    pub search: Option<String>,
    /// Key-field use case the field must be tagged with.
    pub use_case: Option<String>,
}

impl TreeFilter {
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.use_case.is_none()
    }

    fn matches(&self, node: &HydratedNode<'_>) -> bool {
        let search_ok = self
            .search
            .as_deref()
            .is_none_or(|q| node.name().to_lowercase().contains(&q.to_lowercase()));
        let use_case_ok = self
            .use_case
            .as_deref()
            .is_none_or(|u| node.field.key_field_use_cases.contains(u));
        search_ok && use_case_ok
    }
}

impl<'a> HydratedNode<'a> {
    /// A leaf named `Error`, substituted when hydration fails.
    pub fn placeholder() -> HydratedNode<'static> {
        HydratedNode {
            field: &ERROR_NODE,
            children: Vec::new(),
            cycle_cut: false,
        }
    }

    pub fn name(&self) -> &'a str {
        &self.field.name
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.field.type_name.as_deref()
    }

    pub fn is_repeated(&self) -> bool {
        self.field.repeated
    }

    pub fn is_placeholder(&self) -> bool {
        std::ptr::eq(self.field, &*ERROR_NODE)
    }

    /// Direct child by name, ignoring case.
    pub fn child(&self, name: &str) -> Option<&HydratedNode<'a>> {
        self.children
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Descendant at a dotted path relative to this node.
    pub fn find(&self, path: &str) -> Option<&HydratedNode<'a>> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(HydratedNode::node_count).sum::<usize>()
    }

    /// Whether this node or any descendant has a name containing `query`.
    pub fn contains_match(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.contains_match_lower(&query)
    }

    fn contains_match_lower(&self, query: &str) -> bool {
        self.name().to_lowercase().contains(query)
            || self.children.iter().any(|c| c.contains_match_lower(query))
    }

    /// Whether this node or any descendant is a key field for `use_case`.
    pub fn contains_key_field(&self, use_case: &str) -> bool {
        self.field.key_field_use_cases.contains(use_case)
            || self.children.iter().any(|c| c.contains_key_field(use_case))
    }

    /// The subtree pruned to nodes that match `filter` and their ancestors.
    ///
    /// Returns `None` when nothing in the subtree matches. An empty filter
    /// keeps everything.
    pub fn filtered(&self, filter: &TreeFilter) -> Option<HydratedNode<'a>> {
        if filter.is_empty() {
            return Some(self.clone());
        }
        let children: Vec<_> = self
            .children
            .iter()
            .filter_map(|c| c.filtered(filter))
            .collect();
        if children.is_empty() && !filter.matches(self) {
            return None;
        }
        Some(HydratedNode {
            field: self.field,
            children,
            cycle_cut: self.cycle_cut,
        })
    }

    /// Dotted paths of every leaf, prefixed with this node's name.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths(self.name(), &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, path: &str, out: &mut Vec<String>) {
        if self.children.is_empty() {
            out.push(path.to_string());
            return;
        }
        for child in &self.children {
            child.collect_leaf_paths(&format!("{path}.{}", child.name()), out);
        }
    }
}

/// Hydrate `node` with an empty ancestor chain.
pub fn hydrate<'a>(catalog: &'a TypeCatalog, node: &'a SchemaNode) -> Result<HydratedNode<'a>> {
    hydrate_with_chain(catalog, node, &[])
}

/// Hydrate `node` as if it sat below fields of the `ancestors` types.
///
/// Types on the chain are not expanded again, which lets a caller hydrate a
/// subtree lazily without re-entering a record it is already inside. Depth
/// is counted from `node`.
pub fn hydrate_with_chain<'a>(
    catalog: &'a TypeCatalog,
    node: &'a SchemaNode,
    ancestors: &[&'a str],
) -> Result<HydratedNode<'a>> {
    let mut chain = ancestors.to_vec();
    hydrate_node(catalog, node, &mut chain, 0, node.name.as_str())
}

/// Hydrate one root schema.
pub fn hydrate_root(catalog: &TypeCatalog, root: Root) -> Result<HydratedNode<'_>> {
    hydrate(catalog, catalog.root_node(root))
}

/// Hydrate both roots, substituting the `Error` placeholder for any root
/// that fails. Never returns an error.
pub fn hydrate_schema(catalog: &TypeCatalog) -> HydratedSchema<'_> {
    let hydrate_or_placeholder = |root: Root| {
        hydrate_root(catalog, root).unwrap_or_else(|e| {
            tracing::warn!(root = %root, error = %e, "hydration failed, using placeholder tree");
            HydratedNode::placeholder()
        })
    };
    HydratedSchema {
        event: hydrate_or_placeholder(Root::Event),
        entity: hydrate_or_placeholder(Root::Entity),
    }
}

fn hydrate_node<'a>(
    catalog: &'a TypeCatalog,
    node: &'a SchemaNode,
    chain: &mut Vec<&'a str>,
    depth: usize,
    path: &str,
) -> Result<HydratedNode<'a>> {
    let type_name = node.type_name.as_deref();

    if let Some(t) = type_name {
        if chain.contains(&t) {
            tracing::debug!(path, type_name = t, "type already on ancestor chain, not expanding");
            return Ok(HydratedNode {
                field: node,
                children: Vec::new(),
                cycle_cut: true,
            });
        }
    }

    if depth >= MAX_HYDRATION_DEPTH {
        return Err(Error::Hydration {
            path: path.to_string(),
            message: format!("nesting exceeds {MAX_HYDRATION_DEPTH} levels"),
        });
    }

    let fields: &'a [SchemaNode] = match &node.children {
        Some(children) => children,
        None => type_name.and_then(|t| catalog.template(t)).unwrap_or(&[]),
    };

    if let Some(t) = type_name {
        chain.push(t);
    }
    let children = fields
        .iter()
        .map(|child| {
            let child_path = format!("{path}.{}", child.name);
            hydrate_node(catalog, child, chain, depth + 1, &child_path)
        })
        .collect::<Result<Vec<_>>>();
    if type_name.is_some() {
        chain.pop();
    }

    Ok(HydratedNode {
        field: node,
        children: children?,
        cycle_cut: false,
    })
}
