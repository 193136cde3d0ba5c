//! TMDL emission: per-table files, relationships, model and expression
//! documents, and the calendar instantiation.

pub mod column;
pub mod date_table;
pub mod expressions;
pub mod measure;
pub mod model_file;
pub mod plan;
pub mod query;
pub mod quote;
pub mod relationships;
pub mod table;
pub mod type_map;

pub use plan::{plan_columns, ColumnKind, ColumnPlan};
pub use quote::{needs_quoting, quote, unquote};
pub use type_map::{map_attribute_type, TypeInfo};
