//! Document order.
//!
//! Ranks are assigned by one pre-order walk: a node, then its namespace
//! declarations, then its attributes, then its children. The document node's
//! tree is walked first; detached subtrees follow in arena order so that the
//! order stays total. The ranks are cached on the document and dropped by
//! every structural mutation.

use std::cmp::Ordering;

use super::{Document, NodeId};

impl Document {
    fn ranks(&self) -> &[u32] {
        self.order.get_or_init(|| {
            tracing::debug!(nodes = self.node_count(), "rebuilding document order");
            let mut ranks = vec![u32::MAX; self.nodes.len()];
            let mut next = 0u32;
            let mut stack = Vec::new();
            let roots = std::iter::once(self.root).chain(
                (1..self.nodes.len())
                    .map(NodeId::from_index)
                    .filter(|&id| id != self.root && self.parent(id).is_none()),
            );
            for top in roots {
                stack.push(top);
                while let Some(id) = stack.pop() {
                    ranks[id.as_index()] = next;
                    next += 1;
                    let children: Vec<NodeId> = self.children(id).collect();
                    stack.extend(children.into_iter().rev());
                    stack.extend(self.attributes(id).iter().rev());
                    stack.extend(self.namespace_declarations(id).iter().rev());
                }
            }
            ranks
        })
    }

    /// Returns the position of a node in document order.
    ///
    /// Ranks are only comparable between nodes of the same document state;
    /// any mutation may renumber them.
    #[must_use]
    pub fn order_rank(&self, id: NodeId) -> u32 {
        self.ranks()[id.as_index()]
    }

    /// Compares two nodes by document order. Equal only for the same node.
    #[must_use]
    pub fn compare_order(&self, a: NodeId, b: NodeId) -> Ordering {
        let ranks = self.ranks();
        ranks[a.as_index()].cmp(&ranks[b.as_index()])
    }

    /// Sorts nodes into document order and removes duplicates.
    pub fn sort_document_order(&self, nodes: &mut Vec<NodeId>) {
        let ranks = self.ranks();
        nodes.sort_unstable_by_key(|id| ranks[id.as_index()]);
        nodes.dedup();
    }

    /// Returns the siblings after `id`, in document order.
    ///
    /// Empty for nodes without a parent and for attribute and namespace nodes.
    #[must_use]
    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        if self.is_owned_not_child(id) {
            return Vec::new();
        }
        std::iter::successors(self.next_sibling(id), |&s| self.next_sibling(s)).collect()
    }

    /// Returns the siblings before `id`, in document order.
    ///
    /// Empty for nodes without a parent and for attribute and namespace nodes.
    #[must_use]
    pub fn preceding_siblings(&self, id: NodeId) -> Vec<NodeId> {
        if self.is_owned_not_child(id) {
            return Vec::new();
        }
        let mut nodes: Vec<NodeId> =
            std::iter::successors(self.prev_sibling(id), |&s| self.prev_sibling(s)).collect();
        nodes.reverse();
        nodes
    }

    /// Returns every node after `id` in document order that is not one of
    /// its descendants, excluding attribute and namespace nodes.
    ///
    /// For an attribute or namespace node the owner's descendants follow it.
    #[must_use]
    pub fn following(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        if self.is_owned_not_child(id) {
            let Some(owner) = self.parent(id) else {
                return result;
            };
            result.extend(self.descendants(owner));
            current = owner;
        }
        if self.parent(current).is_none() {
            return result;
        }
        for anc in self.ancestors(current) {
            let mut sibling = self.next_sibling(anc);
            while let Some(s) = sibling {
                result.push(s);
                result.extend(self.descendants(s));
                sibling = self.next_sibling(s);
            }
        }
        result
    }

    /// Returns every node before `id` in document order that is not one of
    /// its ancestors, excluding attribute and namespace nodes.
    #[must_use]
    pub fn preceding(&self, id: NodeId) -> Vec<NodeId> {
        let mut current = id;
        if self.is_owned_not_child(id) {
            match self.parent(id) {
                Some(owner) => current = owner,
                None => return Vec::new(),
            }
        }
        if self.parent(current).is_none() {
            return Vec::new();
        }
        // Built nearest-first, then flipped.
        let mut result = Vec::new();
        for anc in self.ancestors(current) {
            let mut sibling = self.prev_sibling(anc);
            while let Some(s) = sibling {
                let mut subtree: Vec<NodeId> = self.descendants(s).collect();
                subtree.reverse();
                result.extend(subtree);
                result.push(s);
                sibling = self.prev_sibling(s);
            }
        }
        result.reverse();
        result
    }

    /// Returns `true` if `node` is `ancestor` or lies below it (through
    /// children, attributes, or namespace declarations).
    #[must_use]
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::name::QName;
    use pretty_assertions::assert_eq;

    /// `<a x=".."><b><b1/></b><c/><d><d1/></d></a>`
    fn sample() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.add_element(root, QName::local("a")).unwrap();
        let x = doc.set_attribute(a, QName::local("x"), "1").unwrap();
        let b = doc.add_element(a, QName::local("b")).unwrap();
        let b1 = doc.add_element(b, QName::local("b1")).unwrap();
        let c = doc.add_element(a, QName::local("c")).unwrap();
        let d = doc.add_element(a, QName::local("d")).unwrap();
        let d1 = doc.add_element(d, QName::local("d1")).unwrap();
        (doc, vec![root, a, x, b, b1, c, d, d1])
    }

    #[test]
    fn test_rank_is_preorder_with_attributes_after_owner() {
        let (doc, nodes) = sample();
        let ranks: Vec<u32> = nodes.iter().map(|&n| doc.order_rank(n)).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_sort_and_dedup() {
        let (doc, n) = sample();
        let mut v = vec![n[7], n[3], n[2], n[7], n[0]];
        doc.sort_document_order(&mut v);
        assert_eq!(v, vec![n[0], n[2], n[3], n[7]]);
    }

    #[test]
    fn test_compare_is_total_with_detached() {
        let (mut doc, n) = sample();
        let loose = doc.create_element(QName::local("loose"));
        assert_eq!(doc.compare_order(n[7], loose), Ordering::Less);
        assert_eq!(doc.compare_order(loose, loose), Ordering::Equal);
    }

    #[test]
    fn test_mutation_invalidates_ranks() {
        let (mut doc, n) = sample();
        assert_eq!(doc.compare_order(n[5], n[6]), Ordering::Less);
        doc.detach(n[5]);
        doc.append_child(n[1], n[5]).unwrap();
        assert_eq!(doc.compare_order(n[5], n[6]), Ordering::Greater);
    }

    #[test]
    fn test_following_and_preceding() {
        let (doc, n) = sample();
        let (b, b1, c, d, d1) = (n[3], n[4], n[5], n[6], n[7]);
        assert_eq!(doc.following(b), vec![c, d, d1]);
        assert_eq!(doc.following(b1), vec![c, d, d1]);
        assert_eq!(doc.preceding(d1), vec![b, b1, c]);
        assert_eq!(doc.preceding(c), vec![b, b1]);
        assert!(doc.following(n[0]).is_empty());
    }

    #[test]
    fn test_following_of_attribute_includes_owner_content() {
        let (doc, n) = sample();
        let x = n[2];
        assert_eq!(doc.following(x), n[3..].to_vec());
        assert!(doc.preceding(x).is_empty());
    }

    #[test]
    fn test_sibling_axes() {
        let (doc, n) = sample();
        let (b, c, d) = (n[3], n[5], n[6]);
        assert_eq!(doc.following_siblings(b), vec![c, d]);
        assert_eq!(doc.preceding_siblings(d), vec![b, c]);
        assert!(doc.following_siblings(n[2]).is_empty());
        assert!(doc.preceding_siblings(n[0]).is_empty());
    }
}
