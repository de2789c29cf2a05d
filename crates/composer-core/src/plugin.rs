use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Attrs, Document, ElementNode, Node, Point, Selection, TextNode};
use crate::ops::{Op, Path};

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub hidden: bool,
    pub handler: std::sync::Arc<
        dyn Fn(&mut crate::core::Editor, Option<serde_json::Value>) -> Result<(), CommandError>
            + Send
            + Sync,
    >,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(
            &mut crate::core::Editor,
            Option<serde_json::Value>,
        ) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            hidden: false,
            handler: std::sync::Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: std::sync::Arc<
        dyn Fn(
                &crate::core::Editor,
                Option<serde_json::Value>,
            ) -> Result<serde_json::Value, QueryError>
            + Send
            + Sync,
    >,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
    /// Isolated nodes are structural shells (e.g. a single column): wrap and
    /// lift commands never remove them or move content across their boundary.
    #[serde(default)]
    pub isolated: bool,
    /// Declared attribute defaults. Every styling attribute has a concrete,
    /// renderable default; parse and normalize fill these in when missing.
    #[serde(default)]
    pub defaults: Attrs,
}

impl NodeSpec {
    fn plain(kind: &str, role: NodeRole, is_void: bool, children: ChildConstraint) -> Self {
        Self {
            kind: kind.to_string(),
            role,
            is_void,
            children,
            isolated: false,
            defaults: Attrs::default(),
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op>;
}

#[derive(Debug, Clone)]
pub struct TransactionPreview {
    pub doc: Document,
    pub selection: Selection,
}

pub trait BlockPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct SchemaRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl SchemaRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn BlockPlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// The full composer block set: text blocks plus the custom content
    /// blocks (banner, card, button, column layout, divider).
    pub fn composer() -> Self {
        let plugins: Vec<Box<dyn BlockPlugin>> = vec![
            Box::new(ParagraphPlugin),
            Box::new(HeadingPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(DividerPlugin),
            Box::new(BannerPlugin),
            Box::new(CardPlugin),
            Box::new(ButtonPlugin),
            Box::new(ColumnLayoutPlugin),
        ];
        Self::new(plugins).expect("composer registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn BlockPlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn spec(&self, kind: &str) -> Option<&NodeSpec> {
        self.node_specs.get(kind)
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    /// Declared defaults for a kind; empty for kinds without styling attrs.
    pub fn default_attrs(&self, kind: &str) -> Attrs {
        self.node_specs
            .get(kind)
            .map(|spec| spec.defaults.clone())
            .unwrap_or_default()
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            ops.extend(pass.run(doc, self));
        }
        ops
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

pub(crate) fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    walk(&doc.children, &mut Vec::new())
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = first_text_descendant(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        let node = &children[ix];
        match node {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: point.offset.min(t.text.len()),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
            Node::Void(_) => {
                break;
            }
        }
    }

    let node = node_at_path(doc, &resolved_path)?;
    match node {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: point.offset.min(t.text.len()),
        }),
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => None,
    }
}

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    if path.is_empty() {
        return None;
    }

    let mut node = doc.children.get(path[0])?;
    for &ix in path.iter().skip(1) {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub(crate) fn children_at_path<'a>(doc: &'a Document, parent_path: &[usize]) -> Option<&'a [Node]> {
    if parent_path.is_empty() {
        return Some(&doc.children);
    }
    match node_at_path(doc, parent_path)? {
        Node::Element(el) => Some(&el.children),
        Node::Void(_) | Node::Text(_) => None,
    }
}

/// Longest prefix of `path` that resolves to an element of `kind`.
pub(crate) fn ancestor_element_path(doc: &Document, path: &[usize], kind: &str) -> Option<Path> {
    if path.is_empty() {
        return None;
    }

    for len in (1..=path.len()).rev() {
        let candidate = &path[..len];
        if let Some(Node::Element(el)) = node_at_path(doc, candidate) {
            if el.kind == kind {
                return Some(candidate.to_vec());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Text blocks
// ---------------------------------------------------------------------------

struct ParagraphPlugin;

impl BlockPlugin for ParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::plain(
            "paragraph",
            NodeRole::Block,
            false,
            ChildConstraint::InlineOnly,
        )]
    }
}

struct HeadingPlugin;

impl BlockPlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let mut spec = NodeSpec::plain("heading", NodeRole::Block, false, ChildConstraint::InlineOnly);
        spec.defaults
            .insert("level".to_string(), Value::Number(1.into()));
        vec![spec]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("heading.set", "Heading", |editor, args| {
                let level = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1)
                    .clamp(1, 6);

                let Some((_, block_path)) = editor.selection().anchor.path.split_last() else {
                    return Ok(());
                };
                let block_path = block_path.to_vec();
                let Some(Node::Element(el)) = node_at_path(editor.doc(), &block_path) else {
                    return Ok(());
                };
                if el.kind != "paragraph" && el.kind != "heading" {
                    return Ok(());
                }

                let node = Node::Element(ElementNode {
                    kind: "heading".to_string(),
                    attrs: {
                        let mut attrs = Attrs::default();
                        attrs.insert("level".to_string(), Value::Number(level.into()));
                        attrs
                    },
                    children: el.children.clone(),
                });

                let selection_after = editor.selection().clone();
                let tx = crate::ops::Transaction::new(vec![
                    Op::RemoveNode {
                        path: block_path.clone(),
                    },
                    Op::InsertNode {
                        path: block_path,
                        node,
                    },
                ])
                .selection_after(selection_after)
                .source("command:heading.set");

                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to set heading: {e:?}")))
            })
            .description("Turn the current block into a heading.")
            .keywords(["heading", "title", "h1", "h2", "h3", "big"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec {
            id: "heading.active_level".to_string(),
            handler: std::sync::Arc::new(|editor, _args| {
                let Some((_, block_path)) = editor.selection().anchor.path.split_last() else {
                    return Ok(Value::Null);
                };
                match node_at_path(editor.doc(), block_path) {
                    Some(Node::Element(el)) if el.kind == "heading" => Ok(el
                        .attrs
                        .get("level")
                        .cloned()
                        .unwrap_or(Value::Number(1.into()))),
                    _ => Ok(Value::Null),
                }
            }),
        }]
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, _registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);

                if el.kind == "heading" {
                    let level = el.attrs.get("level").and_then(|v| v.as_u64());
                    let fixed = level.unwrap_or(1).clamp(1, 6);
                    if level != Some(fixed) {
                        let mut set = Attrs::default();
                        set.insert("level".to_string(), Value::Number(fixed.into()));
                        ops.push(Op::SetNodeAttrs {
                            path: path.clone(),
                            patch: crate::core::AttrPatch {
                                set,
                                remove: Vec::new(),
                            },
                        });
                    }
                } else {
                    walk(&el.children, path, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct DividerPlugin;

impl BlockPlugin for DividerPlugin {
    fn id(&self) -> &'static str {
        "divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::plain(
            "divider",
            NodeRole::Block,
            true,
            ChildConstraint::None,
        )]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("divider.insert", "Divider", |editor, _args| {
                crate::commands::insert_templated_fragment(editor, Node::divider(), None);
                Ok(())
            })
            .description("Insert a horizontal divider.")
            .keywords(["divider", "separator", "hr", "line", "horizontal rule"]),
        ]
    }
}

// ---------------------------------------------------------------------------
// Core normalize passes
// ---------------------------------------------------------------------------

struct CoreNormalizePlugin;

impl BlockPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureInlineBlocksHaveTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &SchemaRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct EnsureInlineBlocksHaveTextLeaf;

impl NormalizePass for EnsureInlineBlocksHaveTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &SchemaRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or(ChildConstraint::Any);

                if spec_children == ChildConstraint::InlineOnly {
                    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                    if !has_text {
                        let mut insert_path = path.clone();
                        insert_path.push(0);
                        ops.push(Op::InsertNode {
                            path: insert_path,
                            node: Node::Text(TextNode {
                                text: String::new(),
                            }),
                        });
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &SchemaRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or_else(|| {
                        if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                            ChildConstraint::InlineOnly
                        } else {
                            ChildConstraint::Any
                        }
                    });

                if spec_children == ChildConstraint::InlineOnly {
                    if el.children.len() >= 2 {
                        let mut ix = el.children.len();
                        while ix > 0 {
                            ix -= 1;
                            let Node::Text(_) = &el.children[ix] else {
                                continue;
                            };

                            let mut start = ix;
                            while start > 0 {
                                let Some(Node::Text(_)) = el.children.get(start - 1) else {
                                    break;
                                };
                                start -= 1;
                            }

                            if start == ix {
                                continue;
                            }

                            let Some(Node::Text(first)) = el.children.get(start) else {
                                continue;
                            };
                            let mut appended = String::new();
                            for node in el.children.iter().take(ix + 1).skip(start + 1) {
                                if let Node::Text(t) = node {
                                    appended.push_str(&t.text);
                                }
                            }

                            if !appended.is_empty() {
                                let mut insert_text_path = path.clone();
                                insert_text_path.push(start);
                                ops.push(Op::InsertText {
                                    path: insert_text_path,
                                    offset: first.text.len(),
                                    text: appended,
                                });
                            }

                            for remove_ix in (start + 1..=ix).rev() {
                                let mut remove_path = path.clone();
                                remove_path.push(remove_ix);
                                ops.push(Op::RemoveNode { path: remove_path });
                            }

                            ix = start;
                        }
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);

        ops
    }
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

pub const BANNER_TYPES: [&str; 4] = ["info", "warning", "success", "error"];

pub fn banner_default_attrs() -> Attrs {
    let mut attrs = Attrs::default();
    attrs.insert(
        "banner_type".to_string(),
        Value::String("info".to_string()),
    );
    attrs
}

pub fn banner_node(banner_type: &str, children: Vec<Node>) -> Node {
    let banner_type = if BANNER_TYPES.contains(&banner_type) {
        banner_type
    } else {
        "info"
    };
    let mut attrs = Attrs::default();
    attrs.insert(
        "banner_type".to_string(),
        Value::String(banner_type.to_string()),
    );
    Node::Element(ElementNode {
        kind: "banner".to_string(),
        attrs,
        children: if children.is_empty() {
            vec![Node::paragraph("")]
        } else {
            children
        },
    })
}

struct BannerPlugin;

impl BlockPlugin for BannerPlugin {
    fn id(&self) -> &'static str {
        "banner"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let mut spec = NodeSpec::plain("banner", NodeRole::Block, false, ChildConstraint::BlockOnly);
        spec.defaults = banner_default_attrs();
        vec![spec]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeBannerStructure)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("banner.wrap", "Banner", |editor, args| {
                let banner_type = args
                    .as_ref()
                    .and_then(|v| v.get("banner_type"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("info")
                    .to_string();

                let mut attrs = Attrs::default();
                attrs.insert("banner_type".to_string(), Value::String(banner_type));
                crate::commands::toggle_wrap(editor, "banner", attrs);
                Ok(())
            })
            .description("Wrap the selection in a callout banner, or lift it back out.")
            .keywords(["banner", "callout", "info", "warning", "success", "error"]),
            CommandSpec::new("banner.set_type", "Set banner type", |editor, args| {
                let banner_type = args
                    .as_ref()
                    .and_then(|v| v.get("banner_type"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("info")
                    .to_string();

                let mut attrs = Attrs::default();
                attrs.insert("banner_type".to_string(), Value::String(banner_type));
                crate::commands::update_attributes(editor, "banner", attrs);
                Ok(())
            })
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "banner.is_active".to_string(),
                handler: std::sync::Arc::new(|editor, _args| {
                    let is_active = ancestor_element_path(
                        editor.doc(),
                        &editor.selection().anchor.path,
                        "banner",
                    )
                    .is_some();
                    Ok(Value::Bool(is_active))
                }),
            },
            QuerySpec {
                id: "banner.active_type".to_string(),
                handler: std::sync::Arc::new(|editor, _args| {
                    let Some(path) = ancestor_element_path(
                        editor.doc(),
                        &editor.selection().anchor.path,
                        "banner",
                    ) else {
                        return Ok(Value::Null);
                    };
                    let Some(Node::Element(el)) = node_at_path(editor.doc(), &path) else {
                        return Ok(Value::Null);
                    };
                    Ok(el
                        .attrs
                        .get("banner_type")
                        .cloned()
                        .unwrap_or(Value::String("info".to_string())))
                }),
            },
        ]
    }
}

struct NormalizeBannerStructure;

impl NormalizePass for NormalizeBannerStructure {
    fn id(&self) -> &'static str {
        "banner.normalize_structure"
    }

    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn gather_text(node: &Node, out: &mut String) {
            match node {
                Node::Text(t) => out.push_str(&t.text),
                Node::Element(el) => {
                    for child in &el.children {
                        gather_text(child, out);
                    }
                }
                Node::Void(_) => {}
            }
        }

        fn normalize_container(
            children: &[Node],
            parent_path: &mut Vec<usize>,
            registry: &SchemaRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                if el.kind == "banner" {
                    let mut banner_path = parent_path.clone();
                    banner_path.push(ix);

                    if el.children.is_empty() {
                        let mut path = banner_path.clone();
                        path.push(0);
                        ops.push(Op::InsertNode {
                            path,
                            node: Node::paragraph(""),
                        });
                    }

                    // Banners hold paragraphs only; anything else is folded
                    // down to a paragraph carrying the same text.
                    for (child_ix, child) in el.children.iter().enumerate() {
                        let is_paragraph =
                            matches!(child, Node::Element(p) if p.kind == "paragraph");
                        if is_paragraph {
                            continue;
                        }

                        let mut text = String::new();
                        gather_text(child, &mut text);

                        let mut child_path = banner_path.clone();
                        child_path.push(child_ix);
                        ops.push(Op::RemoveNode {
                            path: child_path.clone(),
                        });
                        ops.push(Op::InsertNode {
                            path: child_path,
                            node: Node::paragraph(text),
                        });
                    }

                    let banner_type = el.attrs.get("banner_type").and_then(|v| v.as_str());
                    let valid = banner_type.is_some_and(|t| BANNER_TYPES.contains(&t));
                    if !valid {
                        let mut set = Attrs::default();
                        set.insert(
                            "banner_type".to_string(),
                            Value::String("info".to_string()),
                        );
                        ops.push(Op::SetNodeAttrs {
                            path: banner_path,
                            patch: crate::core::AttrPatch {
                                set,
                                remove: Vec::new(),
                            },
                        });
                    }
                }
            }

            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                let spec_children = registry
                    .spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or(ChildConstraint::Any);
                if spec_children == ChildConstraint::InlineOnly || el.children.is_empty() {
                    continue;
                }

                parent_path.push(ix);
                normalize_container(&el.children, parent_path, registry, ops);
                parent_path.pop();
            }
        }

        normalize_container(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

pub fn card_default_attrs() -> Attrs {
    let mut attrs = Attrs::default();
    attrs.insert(
        "background_color".to_string(),
        Value::String("#ffffff".to_string()),
    );
    attrs.insert(
        "border_radius".to_string(),
        Value::String("8px".to_string()),
    );
    attrs.insert("padding".to_string(), Value::String("16px".to_string()));
    attrs.insert(
        "border_color".to_string(),
        Value::String("#e2e8f0".to_string()),
    );
    attrs.insert("border_width".to_string(), Value::String("1px".to_string()));
    attrs.insert(
        "border_style".to_string(),
        Value::String("solid".to_string()),
    );
    attrs.insert(
        "text_color".to_string(),
        Value::String("#1a202c".to_string()),
    );
    attrs
}

pub fn card_node(attrs: Attrs, children: Vec<Node>) -> Node {
    let mut merged = card_default_attrs();
    merged.extend(attrs);
    Node::Element(ElementNode {
        kind: "card".to_string(),
        attrs: merged,
        children: if children.is_empty() {
            vec![Node::paragraph("")]
        } else {
            children
        },
    })
}

struct CardPlugin;

impl BlockPlugin for CardPlugin {
    fn id(&self) -> &'static str {
        "card"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let mut spec = NodeSpec::plain("card", NodeRole::Block, false, ChildConstraint::BlockOnly);
        spec.defaults = card_default_attrs();
        vec![spec]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeCardStructure)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("card.insert", "Card", |editor, args| {
                let attrs = attrs_from_args(args.as_ref());
                crate::commands::insert_templated_fragment(
                    editor,
                    card_node(attrs, Vec::new()),
                    None,
                );
                Ok(())
            })
            .description("Insert a styled content card.")
            .keywords(["card", "box", "panel", "container"]),
            CommandSpec::new("card.update", "Update card", |editor, args| {
                let attrs = attrs_from_args(args.as_ref());
                crate::commands::update_attributes(editor, "card", attrs);
                Ok(())
            })
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "card.is_active".to_string(),
                handler: std::sync::Arc::new(|editor, _args| {
                    let is_active = ancestor_element_path(
                        editor.doc(),
                        &editor.selection().anchor.path,
                        "card",
                    )
                    .is_some();
                    Ok(Value::Bool(is_active))
                }),
            },
            QuerySpec {
                id: "card.active_attrs".to_string(),
                handler: std::sync::Arc::new(|editor, _args| active_attrs(editor, "card")),
            },
        ]
    }
}

struct NormalizeCardStructure;

impl NormalizePass for NormalizeCardStructure {
    fn id(&self) -> &'static str {
        "card.normalize_structure"
    }

    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op> {
        normalize_styled_container(doc, registry, "card", card_default_attrs)
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

pub const BUTTON_ALIGNMENTS: [&str; 3] = ["left", "center", "right"];

pub fn button_default_attrs() -> Attrs {
    let mut attrs = Attrs::default();
    attrs.insert("url".to_string(), Value::String("#".to_string()));
    attrs.insert("target".to_string(), Value::String("_blank".to_string()));
    attrs.insert("alignment".to_string(), Value::String("left".to_string()));
    attrs.insert(
        "background_color".to_string(),
        Value::String("#4f46e5".to_string()),
    );
    attrs.insert(
        "text_color".to_string(),
        Value::String("#ffffff".to_string()),
    );
    attrs.insert(
        "border_color".to_string(),
        Value::String("transparent".to_string()),
    );
    attrs.insert("border_width".to_string(), Value::String("0px".to_string()));
    attrs.insert(
        "border_style".to_string(),
        Value::String("solid".to_string()),
    );
    attrs.insert(
        "border_radius".to_string(),
        Value::String("6px".to_string()),
    );
    attrs.insert(
        "padding".to_string(),
        Value::String("10px 20px".to_string()),
    );
    attrs
}

pub fn button_node(label: &str, attrs: Attrs) -> Node {
    let mut merged = button_default_attrs();
    merged.extend(attrs);
    Node::Element(ElementNode {
        kind: "button".to_string(),
        attrs: merged,
        children: vec![Node::Text(TextNode {
            text: label.to_string(),
        })],
    })
}

struct ButtonPlugin;

impl BlockPlugin for ButtonPlugin {
    fn id(&self) -> &'static str {
        "button"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let mut spec =
            NodeSpec::plain("button", NodeRole::Block, false, ChildConstraint::InlineOnly);
        spec.defaults = button_default_attrs();
        vec![spec]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeButtonAttrs)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("button.insert", "Button", |editor, args| {
                let label = args
                    .as_ref()
                    .and_then(|v| v.get("label"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Click me")
                    .to_string();
                let attrs = attrs_from_args(args.as_ref().and_then(|v| v.get("attrs")));
                crate::commands::insert_templated_fragment(editor, button_node(&label, attrs), None);
                Ok(())
            })
            .description("Insert a call-to-action button.")
            .keywords(["button", "link", "cta", "action"]),
            CommandSpec::new("button.update", "Update button", |editor, args| {
                let attrs = attrs_from_args(args.as_ref());
                crate::commands::update_attributes(editor, "button", attrs);
                Ok(())
            })
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec {
                id: "button.is_active".to_string(),
                handler: std::sync::Arc::new(|editor, _args| {
                    let is_active = ancestor_element_path(
                        editor.doc(),
                        &editor.selection().anchor.path,
                        "button",
                    )
                    .is_some();
                    Ok(Value::Bool(is_active))
                }),
            },
            QuerySpec {
                id: "button.active_attrs".to_string(),
                handler: std::sync::Arc::new(|editor, _args| active_attrs(editor, "button")),
            },
        ]
    }
}

struct NormalizeButtonAttrs;

impl NormalizePass for NormalizeButtonAttrs {
    fn id(&self) -> &'static str {
        "button.normalize_attrs"
    }

    fn run(&self, doc: &Document, _registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);

                if el.kind == "button" {
                    let mut set = Attrs::default();
                    for (key, default) in button_default_attrs() {
                        if !el.attrs.contains_key(&key) {
                            set.insert(key, default);
                        }
                    }
                    let alignment = el.attrs.get("alignment").and_then(|v| v.as_str());
                    if let Some(alignment) = alignment {
                        if !BUTTON_ALIGNMENTS.contains(&alignment) {
                            set.insert(
                                "alignment".to_string(),
                                Value::String("left".to_string()),
                            );
                        }
                    }
                    if !set.is_empty() {
                        ops.push(Op::SetNodeAttrs {
                            path: path.clone(),
                            patch: crate::core::AttrPatch {
                                set,
                                remove: Vec::new(),
                            },
                        });
                    }
                } else {
                    walk(&el.children, path, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

pub const MIN_COLUMNS: usize = 2;
pub const MAX_COLUMNS: usize = 4;

pub fn column_node(children: Vec<Node>) -> Node {
    Node::Element(ElementNode {
        kind: "column".to_string(),
        attrs: Attrs::default(),
        children: if children.is_empty() {
            vec![Node::paragraph("")]
        } else {
            children
        },
    })
}

pub fn column_block_node(cols: usize) -> Node {
    let cols = cols.clamp(MIN_COLUMNS, MAX_COLUMNS);
    Node::Element(ElementNode {
        kind: "column_block".to_string(),
        attrs: Attrs::default(),
        children: (0..cols).map(|_| column_node(Vec::new())).collect(),
    })
}

struct ColumnLayoutPlugin;

impl BlockPlugin for ColumnLayoutPlugin {
    fn id(&self) -> &'static str {
        "column_layout"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let column_block = NodeSpec::plain(
            "column_block",
            NodeRole::Block,
            false,
            ChildConstraint::BlockOnly,
        );
        let mut column =
            NodeSpec::plain("column", NodeRole::Block, false, ChildConstraint::BlockOnly);
        column.isolated = true;
        vec![column_block, column]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeColumnLayout)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("columns.insert", "Columns", |editor, args| {
                let cols = args
                    .as_ref()
                    .and_then(|v| v.get("columns"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(2)
                    .clamp(MIN_COLUMNS as u64, MAX_COLUMNS as u64) as usize;

                crate::commands::insert_templated_fragment(editor, column_block_node(cols), None);
                Ok(())
            })
            .description("Insert a multi-column layout container.")
            .keywords(["columns", "layout", "grid", "multi-column"]),
            CommandSpec::new("columns.unwrap", "Unwrap columns", |editor, _args| {
                crate::commands::lift_out(editor, "column_block");
                Ok(())
            })
            .description("Unwrap the nearest column layout.")
            .keywords(["columns", "layout", "unwrap"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec {
            id: "columns.is_active".to_string(),
            handler: std::sync::Arc::new(|editor, _args| {
                let is_active = ancestor_element_path(
                    editor.doc(),
                    &editor.selection().anchor.path,
                    "column_block",
                )
                .is_some();
                Ok(Value::Bool(is_active))
            }),
        }]
    }
}

struct NormalizeColumnLayout;

impl NormalizePass for NormalizeColumnLayout {
    fn id(&self) -> &'static str {
        "columns.normalize_layout"
    }

    fn run(&self, doc: &Document, registry: &SchemaRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn normalize_container(
            children: &[Node],
            parent_kind: Option<&str>,
            parent_path: &mut Vec<usize>,
            registry: &SchemaRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                // A column outside its layout shell loses the shell: splice
                // its children into the surrounding container.
                if el.kind == "column" && parent_kind != Some("column_block") {
                    let mut column_path = parent_path.clone();
                    column_path.push(ix);
                    ops.push(Op::RemoveNode {
                        path: column_path.clone(),
                    });
                    let blocks = if el.children.is_empty() {
                        vec![Node::paragraph("")]
                    } else {
                        el.children.clone()
                    };
                    for (i, block) in blocks.into_iter().enumerate() {
                        let mut path = parent_path.clone();
                        path.push(ix + i);
                        ops.push(Op::InsertNode { path, node: block });
                    }
                    continue;
                }

                if el.kind == "column_block" {
                    let mut block_path = parent_path.clone();
                    block_path.push(ix);

                    // Ensure the wrapper structure: column_block -> column -> blocks.
                    let mut all_columns = true;
                    for (child_ix, child) in el.children.iter().enumerate() {
                        let is_column = matches!(child, Node::Element(col) if col.kind == "column");
                        if is_column {
                            continue;
                        }
                        all_columns = false;

                        let mut child_path = block_path.clone();
                        child_path.push(child_ix);

                        ops.push(Op::RemoveNode {
                            path: child_path.clone(),
                        });
                        ops.push(Op::InsertNode {
                            path: child_path,
                            node: column_node(vec![child.clone()]),
                        });
                    }

                    if el.children.len() < MIN_COLUMNS {
                        for insert_ix in el.children.len()..MIN_COLUMNS {
                            let mut insert_path = block_path.clone();
                            insert_path.push(insert_ix);
                            ops.push(Op::InsertNode {
                                path: insert_path,
                                node: column_node(Vec::new()),
                            });
                        }
                    }

                    // Merge one overflow column per pass into its left
                    // neighbour; the normalize loop reruns until the count
                    // settles inside the allowed range.
                    if all_columns && el.children.len() > MAX_COLUMNS {
                        let last_ix = el.children.len() - 1;
                        if let Some(Node::Element(last_col)) = el.children.get(last_ix) {
                            let mut remove_path = block_path.clone();
                            remove_path.push(last_ix);
                            ops.push(Op::RemoveNode { path: remove_path });

                            let target_ix = last_ix - 1;
                            let target_len = match el.children.get(target_ix) {
                                Some(Node::Element(col)) => col.children.len(),
                                _ => 0,
                            };
                            for (i, block) in last_col.children.iter().enumerate() {
                                let mut path = block_path.clone();
                                path.push(target_ix);
                                path.push(target_len + i);
                                ops.push(Op::InsertNode {
                                    path,
                                    node: block.clone(),
                                });
                            }
                        }
                    }

                    for (col_ix, col_node) in el.children.iter().enumerate() {
                        let Node::Element(col_el) = col_node else {
                            continue;
                        };
                        if col_el.kind != "column" {
                            continue;
                        }
                        if col_el.children.is_empty() {
                            let mut insert_path = block_path.clone();
                            insert_path.push(col_ix);
                            insert_path.push(0);
                            ops.push(Op::InsertNode {
                                path: insert_path,
                                node: Node::paragraph(""),
                            });
                        }
                    }
                }
            }

            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                let spec_children = registry
                    .spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or(ChildConstraint::Any);
                if spec_children == ChildConstraint::InlineOnly || el.children.is_empty() {
                    continue;
                }

                parent_path.push(ix);
                normalize_container(&el.children, Some(el.kind.as_str()), parent_path, registry, ops);
                parent_path.pop();
            }
        }

        normalize_container(&doc.children, None, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Repairs a styled block container: an empty one gets a paragraph, and any
/// declared attribute missing from the node is filled with its default.
fn normalize_styled_container(
    doc: &Document,
    registry: &SchemaRegistry,
    kind: &str,
    defaults: fn() -> Attrs,
) -> Vec<Op> {
    let mut ops = Vec::new();

    fn walk(
        children: &[Node],
        path: &mut Vec<usize>,
        registry: &SchemaRegistry,
        kind: &str,
        defaults: fn() -> Attrs,
        ops: &mut Vec<Op>,
    ) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);

            if el.kind == kind {
                if el.children.is_empty() {
                    let mut insert_path = path.clone();
                    insert_path.push(0);
                    ops.push(Op::InsertNode {
                        path: insert_path,
                        node: Node::paragraph(""),
                    });
                }

                let mut set = Attrs::default();
                for (key, default) in defaults() {
                    if !el.attrs.contains_key(&key) {
                        set.insert(key, default);
                    }
                }
                if !set.is_empty() {
                    ops.push(Op::SetNodeAttrs {
                        path: path.clone(),
                        patch: crate::core::AttrPatch {
                            set,
                            remove: Vec::new(),
                        },
                    });
                }
            }

            let spec_children = registry
                .spec(&el.kind)
                .map(|s| s.children.clone())
                .unwrap_or(ChildConstraint::Any);
            if spec_children != ChildConstraint::InlineOnly && !el.children.is_empty() {
                walk(&el.children, path, registry, kind, defaults, ops);
            }

            path.pop();
        }
    }

    walk(
        &doc.children,
        &mut Vec::new(),
        registry,
        kind,
        defaults,
        &mut ops,
    );
    ops
}

fn active_attrs(editor: &crate::core::Editor, kind: &str) -> Result<Value, QueryError> {
    let Some(path) = ancestor_element_path(editor.doc(), &editor.selection().anchor.path, kind)
    else {
        return Ok(Value::Null);
    };
    let Some(Node::Element(el)) = node_at_path(editor.doc(), &path) else {
        return Ok(Value::Null);
    };
    serde_json::to_value(&el.attrs)
        .map_err(|err| QueryError::new(format!("Failed to encode attrs: {err}")))
}

fn attrs_from_args(args: Option<&Value>) -> Attrs {
    args.and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Attrs>()
        })
        .unwrap_or_default()
}
