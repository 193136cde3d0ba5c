//! TMDL parsing — the subset this tool emits, plus the user extension
//! points (measures, added columns, added relationships).

mod existing;
mod expressions_file;
mod lexer;
mod relationships_file;
mod table_file;

pub use existing::{read_existing_model, ExistingModel, ExistingTable};
pub use expressions_file::{expression_value, parse_expressions_file, ParsedExpression};
pub use relationships_file::{
    parse_relationships_file, split_column_ref, ParsedRelationship, ParsedRelationships,
};
pub use table_file::{
    parse_table_file, ParsedColumn, ParsedMeasure, ParsedTableFile, TableFileOutcome,
};
