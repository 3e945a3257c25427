//! Rule lookup within a mode.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::tree::{Document, NodeId, NodeType};
use crate::xpath::XPathError;

use super::pattern::Pattern;
use super::rule::{Rule, RuleId};

/// The rules sharing one mode name.
///
/// Node-test rules that name a local name are bucketed by node type and
/// name, other node-test rules by node type alone. Expression rules are
/// tried for every node.
#[derive(Debug, Default)]
pub struct Mode {
    name: Option<String>,
    by_name: HashMap<(usize, String), Vec<Arc<Rule>>>,
    by_type: [Vec<Arc<Rule>>; NodeType::ALL.len()],
    any: Vec<Arc<Rule>>,
}

impl Mode {
    pub(crate) fn new(name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_owned),
            ..Self::default()
        }
    }

    /// The mode's name, `None` for the default mode.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn insert(&mut self, rule: Arc<Rule>) {
        match rule.pattern() {
            Pattern::NodeTest(test) => match test.local_name() {
                Some(local) => {
                    for ty in test.node_types() {
                        self.by_name
                            .entry((ty.index(), local.to_owned()))
                            .or_default()
                            .push(Arc::clone(&rule));
                    }
                }
                None => {
                    for ty in test.node_types() {
                        self.by_type[ty.index()].push(Arc::clone(&rule));
                    }
                }
            },
            Pattern::Expression(_) => self.any.push(rule),
        }
    }

    pub(crate) fn remove(&mut self, id: RuleId) -> bool {
        let before = self.len();
        let keep = |rule: &Arc<Rule>| rule.id() != id;
        self.by_name.values_mut().for_each(|rules| rules.retain(keep));
        self.by_name.retain(|_, rules| !rules.is_empty());
        self.by_type.iter_mut().for_each(|rules| rules.retain(keep));
        self.any.retain(keep);
        self.len() != before
    }

    /// Number of rules. A rule filed under several node types counts once;
    /// each union alternative counts on its own.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut seen = HashSet::new();
        self.by_name
            .values()
            .flatten()
            .chain(self.by_type.iter().flatten())
            .chain(&self.any)
            .filter(|rule| seen.insert(Arc::as_ptr(rule)))
            .count()
    }

    /// Returns `true` if the mode has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the rule to fire for `node`: the matching rule with the highest
    /// priority, and among equal priorities the one registered last.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors from expression patterns that had to be
    /// tried.
    pub fn matching_rule(
        &self,
        doc: &Document,
        node: NodeId,
    ) -> Result<Option<&Arc<Rule>>, XPathError> {
        let ty = doc.node_type(node);
        let mut candidates: Vec<&Arc<Rule>> = self.by_type[ty.index()].iter().collect();
        if let Some(named) = self.by_name.get(&(ty.index(), doc.local_name(node).to_owned())) {
            candidates.extend(named);
        }
        candidates.extend(&self.any);
        candidates.sort_by(|a, b| precedence(b, a));

        for rule in candidates {
            if rule.pattern().matches(doc, node)? {
                tracing::trace!(node = %doc.describe(node), pattern = %rule.pattern(), "rule matched");
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

fn precedence(a: &Rule, b: &Rule) -> Ordering {
    a.priority()
        .total_cmp(&b.priority())
        .then(a.sequence().cmp(&b.sequence()))
}
