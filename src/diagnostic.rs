//! Finding and notification types produced by an analysis run

use crate::signature::entity_signature;
use crate::tree::{NodeId, Span, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

/// Severity level for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Source location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub path: PathBuf,
    /// Lines, columns and raw offsets
    pub span: Span,
}

impl Location {
    pub fn new(path: PathBuf, span: Span) -> Self {
        Self { path, span }
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_column
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.path.display(),
            self.span.start_line,
            self.span.start_column
        )
    }
}

/// The declaration a finding is reported against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Short name of the node (its own name, or its kind)
    pub name: String,
    /// Stable structural identifier, see [`entity_signature`]
    pub signature: String,
    pub location: Location,
    /// Node inside the tree the finding came from; not carried across runs
    #[serde(skip)]
    pub node: Option<NodeId>,
}

impl Entity {
    pub fn from_node(tree: &SyntaxTree, node: NodeId) -> Self {
        let n = tree.node(node);
        Self {
            name: n
                .name()
                .map(String::from)
                .unwrap_or_else(|| n.kind.to_string()),
            signature: entity_signature(tree, node),
            location: tree.location(node),
            node: Some(node),
        }
    }
}

/// One issue reported by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule instance that reported the finding
    pub rule_id: String,
    /// Rule set the rule belongs to
    pub rule_set_id: String,
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    pub entity: Entity,
    /// Related locations, e.g. the other half of a duplicate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Entity>,
    /// Reasons the rule itself attached for not reporting this finding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppress_reasons: Vec<String>,
    /// Whether inline markers and baselines may drop the finding
    #[serde(skip_serializing, default = "suppressible_by_default")]
    pub suppressible: bool,
}

fn suppressible_by_default() -> bool {
    true
}

impl Finding {
    pub fn new(rule_id: &str, rule_set_id: &str, severity: Severity, message: &str, entity: Entity) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            rule_set_id: rule_set_id.to_string(),
            severity,
            message: message.to_string(),
            entity,
            references: Vec::new(),
            suppress_reasons: Vec::new(),
            suppressible: true,
        }
    }

    pub fn with_reference(mut self, reference: Entity) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_suppress_reason(mut self, reason: &str) -> Self {
        self.suppress_reasons.push(reason.to_string());
        self
    }

    pub fn unsuppressible(mut self) -> Self {
        self.suppressible = false;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn location(&self) -> &Location {
        &self.entity.location
    }

    /// Key used to match the finding against a baseline:
    /// `ruleId:fileName:entitySignature`
    pub fn baseline_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.rule_id,
            self.entity.location.file_name(),
            self.entity.signature
        )
    }

    /// Reporting order: path, start line, start column, rule id
    ///
    /// Message and signature break the remaining ties so the order is total.
    pub fn report_order(&self, other: &Self) -> Ordering {
        let a = self.location();
        let b = other.location();
        a.path
            .cmp(&b.path)
            .then(a.span.start_line.cmp(&b.span.start_line))
            .then(a.span.start_column.cmp(&b.span.start_column))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.entity.signature.cmp(&other.entity.signature))
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Level of an engine notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    #[default]
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}

/// Engine-level message not tied to a rule's findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Error)
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, TreeBuilder};

    fn finding_at(path: &str, line: usize, column: usize, rule: &str) -> Finding {
        let entity = Entity {
            name: "x".to_string(),
            signature: "x".to_string(),
            location: Location::new(PathBuf::from(path), Span::new(line, column, line, column)),
            node: None,
        };
        Finding::new(rule, "test", Severity::Warning, "msg", entity)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("hint".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("fatal".parse::<Severity>(), Err(()));
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warning), "warning");
        assert_eq!(format!("{}", Severity::Info), "info");
    }

    #[test]
    fn test_entity_from_node() {
        let mut b = TreeBuilder::new("src/Foo.kt", Span::lines(1, 10));
        let class = b.add(b.root(), NodeKind::Class, Some("Foo"), Span::new(2, 1, 9, 2));
        let tree = b.build();

        let entity = Entity::from_node(&tree, class);
        assert_eq!(entity.name, "Foo");
        assert_eq!(entity.signature, "Foo");
        assert_eq!(entity.location.line(), 2);
        assert_eq!(entity.node, Some(class));
    }

    #[test]
    fn test_baseline_id() {
        let mut b = TreeBuilder::new("src/main/Foo.kt", Span::lines(1, 10));
        let fun = b.add(b.root(), NodeKind::Function, Some("run"), Span::lines(2, 9));
        let tree = b.build();

        let finding = Finding::new(
            "LongMethod",
            "complexity",
            Severity::Warning,
            "too long",
            Entity::from_node(&tree, fun),
        );
        assert_eq!(finding.baseline_id(), "LongMethod:Foo.kt:run()");
    }

    #[test]
    fn test_report_order() {
        let mut findings = vec![
            finding_at("b.kt", 1, 1, "A"),
            finding_at("a.kt", 5, 1, "A"),
            finding_at("a.kt", 2, 7, "B"),
            finding_at("a.kt", 2, 7, "A"),
            finding_at("a.kt", 2, 3, "Z"),
        ];
        findings.sort_by(|a, b| a.report_order(b));

        let keys: Vec<_> = findings
            .iter()
            .map(|f| (f.location().file_name(), f.location().line(), f.location().column(), f.rule_id.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a.kt".to_string(), 2, 3, "Z".to_string()),
                ("a.kt".to_string(), 2, 7, "A".to_string()),
                ("a.kt".to_string(), 2, 7, "B".to_string()),
                ("a.kt".to_string(), 5, 1, "A".to_string()),
                ("b.kt".to_string(), 1, 1, "A".to_string()),
            ]
        );
    }

    #[test]
    fn test_finding_builders() {
        let finding = finding_at("a.kt", 1, 1, "A")
            .with_severity(Severity::Error)
            .with_suppress_reason("deprecated")
            .with_reference(finding_at("b.kt", 3, 1, "A").entity);

        assert!(finding.is_error());
        assert_eq!(finding.suppress_reasons, vec!["deprecated"]);
        assert_eq!(finding.references.len(), 1);
    }

    #[test]
    fn test_notification_display() {
        let n = Notification::warning("something odd");
        assert_eq!(n.to_string(), "warning: something odd");
        assert!(!n.is_error());
        assert!(Notification::error("bad").is_error());
    }
}
