//! Cascading report tree.
//!
//! The Runner records every evaluated line as `file → line → outcome`, where
//! the outcome is either the pass sentinel or an error message.  Directory
//! runs and nested `[Evaluate(...)]` calls graft whole sub-trees in with
//! [`ReportTree::add_tree`].  Once a run completes, [`ReportTree::failures`]
//! and [`ReportTree::successes`] flatten the tree into report lines of the
//! form `parent: child`.

use std::fmt;

use super::value::PASS_LABEL;

/// The label of one report node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// A path, a script line's source text, or an error message.
    Text(String),
    /// The line ran to completion with nothing further to report.
    Pass,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(s) => f.write_str(s),
            Label::Pass => f.write_str(PASS_LABEL),
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Text(s.to_owned())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Text(s)
    }
}

/// One node of a report: a label and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTree {
    pub label: Label,
    pub children: Vec<ReportTree>,
}

impl ReportTree {
    pub fn new(label: impl Into<Label>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Attach `child` under `parent` using the merge rule of
    /// [`add_tree`](Self::add_tree).
    ///
    /// ```text
    /// 1 → 2 → 3   +  add(2, 4)   =   1 → 2 → 3
    ///                                      → 4
    /// ```
    pub fn add(&mut self, parent: impl Into<Label>, child: impl Into<Label>) {
        let mut other = ReportTree::new(parent);
        other.children.push(ReportTree::new(child));
        self.add_tree(other);
    }

    /// Merge `other` into this tree.
    ///
    /// Matches only at depth 0 (this node's label) or depth 1 (any direct
    /// child with the same label, each of which receives a copy).  Deeper
    /// nodes are never searched; labels that match nowhere are dropped.
    pub fn add_tree(&mut self, other: ReportTree) {
        if self.label == other.label {
            self.children.extend(other.children);
            return;
        }
        for node in self.children.iter_mut().filter(|n| n.label == other.label) {
            node.children.extend(other.children.iter().cloned());
        }
    }

    /// A node passes if it is the pass sentinel, or if it has at least one
    /// child and every child passes.
    pub fn passes(&self) -> bool {
        if self.label == Label::Pass {
            return true;
        }
        !self.children.is_empty() && self.children.iter().all(ReportTree::passes)
    }

    /// Chain length from this node down to a leaf, following the last child.
    ///
    /// Each child's depth overwrites the running value, so the result is
    /// `1 + depth(last child)` rather than a true maximum.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        for node in &self.children {
            depth = node.depth() + 1;
        }
        depth
    }

    /// Report lines for every failing branch below this node.
    pub fn failures(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.children.iter().filter(|n| !n.passes()) {
            if let Some(first) = node.children.first() {
                if first.children.is_empty() {
                    out.push(format!("{}: {}", self.label, node.label));
                    out.push(format!("{}: {}", node.label, first.label));
                    continue;
                }
            }

            let nested = node.failures();
            if !nested.is_empty() {
                out.push(format!("{}: {}", self.label, node.label));
                out.extend(nested);
            }
        }
        out
    }

    /// Report lines for every passing aggregate below this node.
    ///
    /// Bare one-line passes (depth 1) are not reported.
    pub fn successes(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.children.iter().filter(|n| n.passes() && n.depth() > 1) {
            let nested = node.successes();
            out.push(format!("{}: {}", self.label, node.label));
            out.extend(nested);
        }
        out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
