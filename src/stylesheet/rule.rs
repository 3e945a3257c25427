//! Rules and the rule manager.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::tree::NodeId;

use super::mode::Mode;
use super::pattern::Pattern;
use super::{Processor, StylesheetError};

/// What a rule does when it fires.
///
/// Closures of the right shape are actions:
///
/// ```
/// use xmlweave::stylesheet::{Pattern, Processor, Rule, StylesheetError};
/// use xmlweave::NodeId;
///
/// let rule = Rule::new(
///     Pattern::compile("title").unwrap(),
///     |p: &mut Processor<'_>, node: NodeId| -> Result<(), StylesheetError> {
///         let text = p.document().text_content(node);
///         p.write(&text.to_uppercase());
///         Ok(())
///     },
/// );
/// assert_eq!(rule.priority(), 0.0);
/// ```
pub trait Action: Send + Sync {
    /// Runs the action for `node`.
    ///
    /// # Errors
    ///
    /// Whatever the action returns is passed to the caller of
    /// [`super::Stylesheet::run`] unchanged.
    fn fire(&self, processor: &mut Processor<'_>, node: NodeId) -> Result<(), StylesheetError>;
}

impl<F> Action for F
where
    F: Fn(&mut Processor<'_>, NodeId) -> Result<(), StylesheetError> + Send + Sync,
{
    fn fire(&self, processor: &mut Processor<'_>, node: NodeId) -> Result<(), StylesheetError> {
        self(processor, node)
    }
}

/// Identifies a registered rule, including all of its union alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u64);

/// A pattern, an action, a priority and an optional mode.
#[derive(Clone)]
pub struct Rule {
    pattern: Pattern,
    action: Arc<dyn Action>,
    priority: f64,
    mode: Option<String>,
    id: RuleId,
    sequence: u64,
}

impl Rule {
    /// Creates a rule in the default mode with the pattern's default priority.
    pub fn new(pattern: Pattern, action: impl Action + 'static) -> Self {
        Self::with_action(pattern, Arc::new(action))
    }

    pub(crate) fn with_action(pattern: Pattern, action: Arc<dyn Action>) -> Self {
        let priority = pattern.default_priority();
        Self {
            pattern,
            action,
            priority,
            mode: None,
            id: RuleId(0),
            sequence: 0,
        }
    }

    /// Overrides the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Places the rule in a named mode.
    #[must_use]
    pub fn in_mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_owned());
        self
    }

    /// The rule's pattern.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The rule's priority.
    #[must_use]
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// The rule's mode, `None` for the default mode.
    #[must_use]
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// The id assigned at registration.
    #[must_use]
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Registration order; later rules win priority ties.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn action(&self) -> &Arc<dyn Action> {
        &self.action
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.to_string())
            .field("priority", &self.priority)
            .field("mode", &self.mode)
            .field("id", &self.id)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Holds every mode and its rules.
#[derive(Debug, Default)]
pub struct RuleManager {
    modes: HashMap<Option<String>, Mode>,
    next_id: u64,
    next_sequence: u64,
}

impl RuleManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule and returns its id.
    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        self.add_alternatives(vec![rule])
    }

    /// Registers several rules under one id, as produced by splitting a
    /// union pattern. They share a sequence number.
    pub fn add_alternatives(&mut self, rules: Vec<Rule>) -> RuleId {
        self.next_id += 1;
        self.next_sequence += 1;
        let id = RuleId(self.next_id);
        for mut rule in rules {
            rule.id = id;
            rule.sequence = self.next_sequence;
            tracing::trace!(pattern = %rule.pattern, priority = rule.priority, mode = ?rule.mode, "adding rule");
            self.modes
                .entry(rule.mode.clone())
                .or_insert_with_key(|name| Mode::new(name.as_deref()))
                .insert(Arc::new(rule));
        }
        id
    }

    /// Removes every alternative registered under `id`. Returns `false` if
    /// there was none.
    pub fn remove_rule(&mut self, id: RuleId) -> bool {
        let mut removed = false;
        for mode in self.modes.values_mut() {
            removed |= mode.remove(id);
        }
        self.modes.retain(|_, mode| !mode.is_empty());
        removed
    }

    /// Removes all rules.
    pub fn clear(&mut self) {
        self.modes.clear();
    }

    /// Returns a mode, `None` for the default mode.
    #[must_use]
    pub fn mode(&self, name: Option<&str>) -> Option<&Mode> {
        self.modes.get(&name.map(str::to_owned))
    }

    /// Total number of registered rules, counting union alternatives.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.modes.values().map(Mode::len).sum()
    }
}
