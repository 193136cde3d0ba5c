//! Input model for a build: tables, attributes, relationships, calendar.
//!
//! A `BuildRequest` is constructed once per invocation (by a host UI or
//! deserialized from JSON by the CLI), consumed read-only, and discarded.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Dataverse attribute type tag.
///
/// Unrecognised tags deserialize to `Unknown` and fall through to the string
/// mapping with a warning; they never abort a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Memo,
    Integer,
    BigInt,
    Decimal,
    Double,
    Money,
    DateTime,
    DateOnly,
    Boolean,
    Lookup,
    Owner,
    Customer,
    Picklist,
    State,
    Status,
    UniqueIdentifier,
    #[serde(other)]
    Unknown,
}

impl AttributeType {
    /// Lookup-shaped attributes yield a hidden id column plus a visible name
    /// column sourced from `<logical_name>name`.
    pub fn is_lookup(self) -> bool {
        matches!(
            self,
            AttributeType::Lookup | AttributeType::Owner | AttributeType::Customer
        )
    }

    /// Choice-shaped attributes yield a single visible label column.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            AttributeType::Picklist
                | AttributeType::State
                | AttributeType::Status
                | AttributeType::Boolean
        )
    }
}

/// Star-schema role of a table; affects which auto-generated measures are
/// emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRole {
    Fact,
    Dimension,
}

/// How partitions reach the source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Native SQL through the Dataverse TDS endpoint.
    Tds,
    /// SQL against the Fabric lakehouse endpoint, with metadata joins for
    /// choice labels.
    FabricLink {
        sql_endpoint: String,
        lakehouse: String,
    },
}

impl ConnectionMode {
    pub fn is_fabric(&self) -> bool {
        matches!(self, ConnectionMode::FabricLink { .. })
    }
}

/// One attribute of a source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub logical_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub attribute_type: AttributeType,
    /// Target table logical names; non-empty only for lookup-shaped types.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
    /// For choice/boolean attributes, the attribute carrying the label.
    /// Defaults to `<logical_name>name`.
    #[serde(default)]
    pub virtual_attribute_name: Option<String>,
}

impl AttributeSpec {
    /// Display name, falling back to the logical name.
    pub fn effective_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.logical_name)
    }

    /// The SQL column carrying the resolved label of a choice/boolean
    /// attribute, honouring `virtual_attribute_name`.
    pub fn name_column(&self) -> String {
        self.virtual_attribute_name
            .clone()
            .unwrap_or_else(|| format!("{}name", self.logical_name))
    }

    /// The SQL column carrying the resolved name of a lookup target.
    /// Always `<logical_name>name`; lookups have no label override.
    pub fn lookup_name_column(&self) -> String {
        format!("{}name", self.logical_name)
    }
}

/// A saved view's filter, already translated to a SQL WHERE fragment.
///
/// FetchXML-to-SQL translation happens upstream of the builder; the emitter
/// uses this text verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub where_sql: String,
}

/// One table of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub logical_name: String,
    pub display_name: String,
    pub schema_name: String,
    pub primary_id_attribute: String,
    #[serde(default)]
    pub primary_name_attribute: Option<String>,
    pub role: TableRole,
    /// When set the emitted SQL appends `WHERE Base.statecode = 0`.
    #[serde(default)]
    pub has_state_code: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub view: Option<ViewSpec>,
    /// Lookup id columns that must be present in the partition even when not
    /// user-selected, because a relationship refers to them.
    #[serde(default)]
    pub required_lookup_columns: BTreeSet<String>,
}

impl TableSpec {
    pub fn attribute(&self, logical_name: &str) -> Option<&AttributeSpec> {
        self.attributes
            .iter()
            .find(|a| a.logical_name.eq_ignore_ascii_case(logical_name))
    }
}

/// One model relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub source_table: String,
    pub source_attribute: String,
    pub target_table: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_snowflake: bool,
    #[serde(default)]
    pub assume_referential_integrity: bool,
}

fn default_true() -> bool {
    true
}

/// Calendar table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateTableConfig {
    pub primary_date_table: String,
    pub primary_date_field: String,
    #[serde(default)]
    pub utc_offset_hours: f64,
    pub start_year: i32,
    pub end_year: i32,
    /// `(table, field)` pairs projected to date-only via a timezone-adjusted
    /// `CAST(DATEADD(hour, offset, Base.<field>) AS DATE)`.
    #[serde(default)]
    pub wrapped_fields: BTreeSet<(String, String)>,
}

impl DateTableConfig {
    pub fn is_wrapped(&self, table: &str, field: &str) -> bool {
        self.wrapped_fields
            .iter()
            .any(|(t, f)| t.eq_ignore_ascii_case(table) && f.eq_ignore_ascii_case(field))
    }
}

/// Everything one invocation of the builder consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub project_name: String,
    pub output_folder: PathBuf,
    pub template_folder: PathBuf,
    pub dataverse_url: String,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSpec>,
    #[serde(default)]
    pub date_config: Option<DateTableConfig>,
    pub connection_mode: ConnectionMode,
}

impl BuildRequest {
    /// Root of the generated project tree.
    pub fn pbip_root(&self) -> PathBuf {
        self.output_folder.join("PBIP")
    }

    pub fn semantic_model_dir(&self) -> PathBuf {
        self.pbip_root()
            .join(format!("{}.SemanticModel", self.project_name))
    }

    pub fn definition_dir(&self) -> PathBuf {
        self.semantic_model_dir().join("definition")
    }

    pub fn table_by_logical(&self, logical_name: &str) -> Option<&TableSpec> {
        self.tables
            .iter()
            .find(|t| t.logical_name.eq_ignore_ascii_case(logical_name))
    }

    pub fn table_by_display(&self, display_name: &str) -> Option<&TableSpec> {
        self.tables
            .iter()
            .find(|t| t.display_name.eq_ignore_ascii_case(display_name))
    }
}
