//! In-place rewriting of declarative trees.

use super::DNode;

/// Apply `modifier` to every node in `node`'s tree for which `predicate`
/// holds, parents before their children.
///
/// Children of both element and widget descriptions are visited; a
/// modifier that replaces a node's children sees its own replacements
/// visited afterwards.
pub fn decorate<M, P>(node: &mut DNode, mut modifier: M, predicate: P)
where
    M: FnMut(&mut DNode),
    P: Fn(&DNode) -> bool,
{
    walk(node, &mut modifier, &predicate);
}

/// [`decorate`] without a predicate.
pub fn decorate_all<M>(node: &mut DNode, modifier: M)
where
    M: FnMut(&mut DNode),
{
    decorate(node, modifier, |_| true);
}

fn walk<M, P>(node: &mut DNode, modifier: &mut M, predicate: &P)
where
    M: FnMut(&mut DNode),
    P: Fn(&DNode) -> bool,
{
    if predicate(node) {
        modifier(node);
    }
    if let Some(children) = node.children_mut() {
        for child in children.iter_mut() {
            walk(child, modifier, predicate);
        }
    }
}
