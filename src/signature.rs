//! Entity signatures
//!
//! A signature names the declaration a finding belongs to, e.g.
//! `Outer.inner(a, b)`. It feeds the baseline id, so it is derived from
//! structure only: names, parameter names and the position of anonymous
//! declarations among their siblings. Line numbers, columns and offsets are
//! never read, which keeps signatures stable when unrelated code moves.

use crate::tree::{NodeId, NodeKind, SyntaxTree};

/// Signature of the declaration enclosing `node`
///
/// The file root (or anything outside every declaration) is identified by
/// the file name alone.
pub fn entity_signature(tree: &SyntaxTree, node: NodeId) -> String {
    let mut declarations: Vec<NodeId> = tree
        .ancestors(node)
        .filter(|id| tree.node(*id).kind.is_declaration())
        .collect();

    if declarations.is_empty() {
        return tree.file_name().into_owned();
    }

    declarations.reverse();
    declarations
        .into_iter()
        .map(|id| segment(tree, id))
        .collect::<Vec<_>>()
        .join(".")
}

/// Signature segment contributed by one declaration
fn segment(tree: &SyntaxTree, id: NodeId) -> String {
    let node = tree.node(id);
    let Some(name) = node.name() else {
        return format!("<anonymous#{}>", anonymous_ordinal(tree, id));
    };

    if node.kind == NodeKind::Function {
        let params: Vec<&str> = node
            .children()
            .iter()
            .map(|c| tree.node(*c))
            .filter(|c| c.kind == NodeKind::Parameter)
            .map(|c| c.name().unwrap_or("_"))
            .collect();
        format!("{}({})", name, params.join(", "))
    } else {
        name.to_string()
    }
}

/// Declaration that directly owns `id`, or `None` at file level
fn owner(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    tree.parent(id)
        .and_then(|parent| tree.enclosing_declaration(parent))
}

/// Pre-order position of an anonymous declaration among the anonymous
/// declarations sharing its owner
fn anonymous_ordinal(tree: &SyntaxTree, id: NodeId) -> usize {
    let owner_id = owner(tree, id);
    let start = owner_id.unwrap_or_else(|| tree.root());

    tree.walk_from(start)
        .filter(|n| *n != start || owner_id.is_none())
        .filter(|n| tree.node(*n).is_anonymous_declaration() && owner(tree, *n) == owner_id)
        .position(|n| n == id)
        .unwrap_or(0)
}
