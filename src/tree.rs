//! Parsed source trees consumed by the engine
//!
//! Parsing happens upstream. The engine only needs a tree of nodes it can
//! walk, query for locations and climb through enclosing declarations, so the
//! tree is stored as a flat arena indexed by [`NodeId`].
//!
//! Trees are either built in memory with [`TreeBuilder`] or loaded from the
//! JSON form an external parser emits:
//!
//! ```json
//! {
//!   "path": "src/Foo.kt",
//!   "root": {
//!     "kind": "file",
//!     "span": { "start_line": 1, "end_line": 40 },
//!     "children": [
//!       { "kind": "class", "name": "Foo", "annotations": [{ "name": "Suppress", "args": ["LongMethod"] }] }
//!     ]
//!   }
//! }
//! ```

use crate::diagnostic::Location;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading a serialized tree
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tree parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Invalid tree: {0}")]
    Invalid(String),
}

/// Index of a node inside its [`SyntaxTree`]
pub type NodeId = usize;

/// Syntactic kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Class,
    Object,
    Function,
    Property,
    Parameter,
    Lambda,
    Block,
    Call,
    Expression,
    #[default]
    Other,
}

impl NodeKind {
    /// Declarations own an entity signature segment and can carry suppression markers
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Object
                | NodeKind::Function
                | NodeKind::Property
                | NodeKind::Parameter
                | NodeKind::Lambda
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Object => "object",
            NodeKind::Function => "function",
            NodeKind::Property => "property",
            NodeKind::Parameter => "parameter",
            NodeKind::Lambda => "lambda",
            NodeKind::Block => "block",
            NodeKind::Call => "call",
            NodeKind::Expression => "expression",
            NodeKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(NodeKind::File),
            "class" | "interface" => Ok(NodeKind::Class),
            "object" => Ok(NodeKind::Object),
            "function" | "fun" | "method" => Ok(NodeKind::Function),
            "property" | "field" => Ok(NodeKind::Property),
            "parameter" | "param" => Ok(NodeKind::Parameter),
            "lambda" | "closure" => Ok(NodeKind::Lambda),
            "block" => Ok(NodeKind::Block),
            "call" => Ok(NodeKind::Call),
            "expression" | "expr" => Ok(NodeKind::Expression),
            "other" => Ok(NodeKind::Other),
            _ => Err(format!("Unknown node kind: {}", s)),
        }
    }
}

/// Source range of a node (lines and columns are 1-based, offsets are byte offsets)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Span {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
            start_offset: 0,
            end_offset: 0,
        }
    }

    /// Span covering whole lines, starting at column 1
    pub fn lines(start_line: usize, end_line: usize) -> Self {
        Self::new(start_line, 1, end_line, 1)
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    /// Number of lines touched by the span
    pub fn line_count(&self) -> usize {
        if self.end_line < self.start_line {
            return 0;
        }
        self.end_line - self.start_line + 1
    }
}

/// A marker attached to a declaration, e.g. `@Suppress("LongMethod")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Annotation {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub annotations: Vec<Annotation>,
    pub span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }

    pub fn is_anonymous_declaration(&self) -> bool {
        self.kind.is_declaration() && self.name().is_none()
    }
}

/// Serialized node, nested the way parsers usually emit trees
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    #[serde(default)]
    path: Option<PathBuf>,
    root: NodeSpec,
}

/// The parsed form of one source file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    path: PathBuf,
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    /// Load a serialized tree from a JSON file
    ///
    /// When the document carries no `path`, the tree is attributed to the
    /// serialized file itself.
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, path)
    }

    pub fn from_json(content: &str, origin: &Path) -> Result<Self, TreeError> {
        let file: TreeFile = serde_json::from_str(content).map_err(|e| TreeError::Parse {
            file: origin.display().to_string(),
            message: e.to_string(),
        })?;

        if file.root.kind != NodeKind::File {
            return Err(TreeError::Invalid(format!(
                "root of {} must be a file node, found '{}'",
                origin.display(),
                file.root.kind
            )));
        }

        let path = file.path.unwrap_or_else(|| origin.to_path_buf());
        Ok(Self::from_spec(path, &file.root))
    }

    /// Build a tree from a nested node description
    pub fn from_spec(path: impl Into<PathBuf>, root: &NodeSpec) -> Self {
        let mut builder = TreeBuilder::new(path, root.span);
        builder.nodes[0].name = root.name.clone();
        builder.nodes[0].annotations = root.annotations.clone();

        let mut stack: Vec<(NodeId, &NodeSpec)> = root
            .children
            .iter()
            .rev()
            .map(|child| (0, child))
            .collect();

        while let Some((parent, spec)) = stack.pop() {
            let id = builder.add(parent, spec.kind, spec.name.as_deref(), spec.span);
            builder.nodes[id].annotations = spec.annotations.clone();
            for child in spec.children.iter().rev() {
                stack.push((id, child));
            }
        }

        builder.build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| self.path.to_string_lossy())
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Get a node by id
    ///
    /// Ids are only handed out by the tree itself, so an unknown id is a bug.
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// The node itself followed by every enclosing node up to the root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).map(|_| id),
        }
    }

    /// Depth-first pre-order walk over the whole tree
    pub fn walk(&self) -> Walk<'_> {
        self.walk_from(self.root())
    }

    /// Depth-first pre-order walk over the subtree rooted at `id`
    pub fn walk_from(&self, id: NodeId) -> Walk<'_> {
        Walk {
            tree: self,
            stack: if id < self.nodes.len() { vec![id] } else { Vec::new() },
        }
    }

    /// Nearest declaration containing the node, the node itself included
    pub fn enclosing_declaration(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|a| self.nodes[*a].kind.is_declaration())
    }

    pub fn location(&self, id: NodeId) -> Location {
        let span = self.get(id).map(|n| n.span).unwrap_or_default();
        Location::new(self.path.clone(), span)
    }

    /// Lines of code covered by the file node
    pub fn line_count(&self) -> usize {
        self.nodes[0].span.line_count()
    }
}

/// Iterator produced by [`SyntaxTree::ancestors`]
pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

/// Iterator produced by [`SyntaxTree::walk`]
pub struct Walk<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.tree.nodes[current].children.iter().rev().copied());
        Some(current)
    }
}

/// Incremental builder for in-memory trees
pub struct TreeBuilder {
    path: PathBuf,
    nodes: Vec<SyntaxNode>,
}

impl TreeBuilder {
    /// Start a tree whose file node covers `span`
    pub fn new(path: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            path: path.into(),
            nodes: vec![SyntaxNode {
                kind: NodeKind::File,
                name: None,
                annotations: Vec::new(),
                span,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// Append a child node to `parent` and return its id
    pub fn add(&mut self, parent: NodeId, kind: NodeKind, name: Option<&str>, span: Span) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SyntaxNode {
            kind,
            name: name.map(String::from),
            annotations: Vec::new(),
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn annotate(&mut self, node: NodeId, annotation: Annotation) -> &mut Self {
        self.nodes[node].annotations.push(annotation);
        self
    }

    pub fn build(self) -> SyntaxTree {
        SyntaxTree {
            path: self.path,
            nodes: self.nodes,
        }
    }
}
