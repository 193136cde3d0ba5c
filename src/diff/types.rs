//! Change-set types produced by the differ.

use std::fmt;

/// How risky a change is to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Impact {
    /// Pure preservation; nothing is mutated.
    Safe,
    /// New table, column, or relationship.
    Additive,
    /// Column modification, query change, URL change, rename.
    Moderate,
    /// Removal that can break preserved content, connection-mode change,
    /// role change.
    Destructive,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Impact::Safe => "Safe",
            Impact::Additive => "Additive",
            Impact::Moderate => "Moderate",
            Impact::Destructive => "Destructive",
        };
        write!(f, "{label}")
    }
}

/// What kind of change one entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    NewTable,
    NewColumn,
    RemovedColumn,
    ModifiedColumn,
    QueryChanged,
    TableRenamed,
    RoleChanged,
    NewRelationship,
    RemovedRelationship,
    UrlChanged,
    ConnectionModeChanged,
    PreserveTable,
    PreserveColumn,
    PreserveMeasure,
    PreserveRelationship,
    PreserveUrl,
    Warning,
}

impl ChangeKind {
    pub fn is_preserve(self) -> bool {
        matches!(
            self,
            ChangeKind::PreserveTable
                | ChangeKind::PreserveColumn
                | ChangeKind::PreserveMeasure
                | ChangeKind::PreserveRelationship
                | ChangeKind::PreserveUrl
        )
    }
}

/// One entry of the change set.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub impact: Impact,
    pub kind: ChangeKind,
    /// Display name of the affected table, when table-scoped.
    pub table: Option<String>,
    /// The affected entity (column, measure, relationship, …).
    pub subject: String,
    pub detail: String,
}

impl ChangeEntry {
    pub fn new(impact: Impact, kind: ChangeKind, subject: impl Into<String>) -> Self {
        ChangeEntry {
            impact,
            kind,
            table: None,
            subject: subject.into(),
            detail: String::new(),
        }
    }

    pub fn for_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Everything the differ found, in a stable order.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    pub fn push(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    /// True when applying would mutate anything beyond preservation.
    pub fn has_changes(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.impact > Impact::Safe && e.kind != ChangeKind::Warning)
    }

    pub fn highest_impact(&self) -> Impact {
        self.entries
            .iter()
            .filter(|e| e.kind != ChangeKind::Warning)
            .map(|e| e.impact)
            .max()
            .unwrap_or(Impact::Safe)
    }

    pub fn count_of(&self, impact: Impact) -> usize {
        self.entries
            .iter()
            .filter(|e| e.impact == impact && e.kind != ChangeKind::Warning)
            .count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(|e| e.kind == ChangeKind::Warning)
    }

    pub fn preserved_measures(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == ChangeKind::PreserveMeasure)
    }
}
