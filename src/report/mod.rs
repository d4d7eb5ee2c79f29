//! Dependency reports
//!
//! A [`DependencyReport`] explains why a resource is or is not ready: how far
//! it got, how far it needs to get, and the same information for everything it
//! depends on. The JSON form keeps the tree shape; the text form indents it.

use serde::{Deserialize, Serialize};
use std::fmt;

const INDENT_STEP: usize = 2;

/// One node of the report tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DependencyReport {
    /// Graph key of the resource (`<kind>/<name>`)
    pub dependency: String,
    /// Whether this node currently holds up whatever depends on it
    pub blocks: bool,
    /// Readiness achieved, 0-100
    pub percentage: u8,
    /// Readiness required, 0-100
    pub needed: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DependencyReport>,
}

impl DependencyReport {
    /// Report a measured readiness; `blocks` follows from the two percentages
    pub fn new(
        dependency: impl Into<String>,
        percentage: u8,
        needed: u8,
        message: impl Into<String>,
    ) -> Self {
        let percentage = percentage.min(100);
        let needed = needed.min(100);
        Self {
            dependency: dependency.into(),
            blocks: percentage < needed,
            percentage,
            needed,
            message: message.into(),
            children: Vec::new(),
        }
    }

    /// Report a resource whose readiness could not be determined
    pub fn error(dependency: impl Into<String>, err: impl fmt::Display) -> Self {
        Self {
            dependency: dependency.into(),
            blocks: true,
            percentage: 0,
            needed: 100,
            message: format!("error: {}", err),
            children: Vec::new(),
        }
    }

    /// Keep the measured readiness but explain it with a recorded failure
    pub fn failed_with(mut self, err: impl fmt::Display) -> Self {
        self.blocks = true;
        self.message = format!("error: {}", err);
        self
    }

    /// Mark the edge as non-blocking: whatever the readiness, nothing waits on it
    pub fn non_blocking(mut self) -> Self {
        self.blocks = false;
        self
    }

    pub fn with_children(mut self, children: Vec<DependencyReport>) -> Self {
        self.children = children;
        self
    }

    /// Whether any node in this subtree blocks
    pub fn any_blocking(&self) -> bool {
        self.blocks || self.children.iter().any(DependencyReport::any_blocking)
    }

    /// Human-readable rendering, one line per node, children indented
    pub fn as_text(&self, indent: usize) -> Vec<String> {
        let mut lines = Vec::new();
        self.render(indent, &mut lines);
        lines
    }

    fn render(&self, indent: usize, lines: &mut Vec<String>) {
        let marker = if self.blocks { " [BLOCKING]" } else { "" };
        lines.push(format!(
            "{:indent$}{}: {}% (needed {}%){} - {}",
            "",
            self.dependency,
            self.percentage,
            self.needed,
            marker,
            self.message,
            indent = indent
        ));
        for child in &self.children {
            child.render(indent + INDENT_STEP, lines);
        }
    }

    pub fn as_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Pre-order walk of the tree
    pub fn walk(&self) -> Vec<&DependencyReport> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }
}

/// Reports for every root of a deployment graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentReport(pub Vec<DependencyReport>);

impl DeploymentReport {
    pub fn roots(&self) -> &[DependencyReport] {
        &self.0
    }

    pub fn as_text(&self, indent: usize) -> Vec<String> {
        self.0.iter().flat_map(|r| r.as_text(indent)).collect()
    }

    pub fn as_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Find the first node (in pre-order) for a key
    pub fn find(&self, key: &str) -> Option<&DependencyReport> {
        self.0
            .iter()
            .flat_map(DependencyReport::walk)
            .find(|node| node.dependency == key)
    }
}
