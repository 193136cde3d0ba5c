//! Attribute-type to TMDL column-type mapping.
//!
//! This table is the single source of truth for column data types: both the
//! emitters and the differ derive their expectations from it.

use crate::model::AttributeType;

/// TMDL typing of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub data_type: &'static str,
    pub format_string: Option<&'static str>,
    pub source_provider_type: Option<&'static str>,
    pub summarize_by: &'static str,
}

const STRING: TypeInfo = TypeInfo {
    data_type: "string",
    format_string: None,
    source_provider_type: None,
    summarize_by: "none",
};

const ID: TypeInfo = TypeInfo {
    data_type: "int64",
    format_string: None,
    source_provider_type: None,
    summarize_by: "none",
};

/// Map an attribute type tag to its TMDL typing.
///
/// Total: unrecognised tags fall through to the string mapping.
pub fn map_attribute_type(attribute_type: AttributeType) -> TypeInfo {
    match attribute_type {
        AttributeType::String | AttributeType::Memo => STRING,
        AttributeType::Integer => TypeInfo {
            data_type: "int64",
            format_string: Some("0"),
            source_provider_type: Some("int"),
            summarize_by: "sum",
        },
        AttributeType::BigInt => TypeInfo {
            data_type: "int64",
            format_string: Some("0"),
            source_provider_type: Some("bigint"),
            summarize_by: "sum",
        },
        AttributeType::Decimal => TypeInfo {
            data_type: "decimal",
            format_string: Some("#,0.00"),
            source_provider_type: Some("decimal"),
            summarize_by: "sum",
        },
        AttributeType::Double => TypeInfo {
            data_type: "double",
            format_string: Some("#,0.00"),
            source_provider_type: Some("float"),
            summarize_by: "sum",
        },
        AttributeType::Money => TypeInfo {
            data_type: "decimal",
            format_string: Some("\\$#,0.00;(\\$#,0.00);\\$#,0.00"),
            source_provider_type: Some("money"),
            summarize_by: "sum",
        },
        AttributeType::DateTime => TypeInfo {
            data_type: "dateTime",
            format_string: Some("General Date"),
            source_provider_type: Some("datetime2"),
            summarize_by: "none",
        },
        AttributeType::DateOnly => TypeInfo {
            data_type: "dateTime",
            format_string: Some("Short Date"),
            source_provider_type: Some("date"),
            summarize_by: "none",
        },
        AttributeType::Boolean
        | AttributeType::Picklist
        | AttributeType::State
        | AttributeType::Status => STRING,
        AttributeType::Lookup
        | AttributeType::Owner
        | AttributeType::Customer
        | AttributeType::UniqueIdentifier => ID,
        AttributeType::Unknown => STRING,
    }
}
