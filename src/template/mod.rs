//! PBIP template cloning.
//!
//! Copies the skeleton project, substituting the project name into path
//! segments and text-file contents, and regenerating each clone's platform
//! logical IDs so two projects never collide in a workspace.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::PbipGenError;
use crate::util::{fresh_guid, to_crlf};

/// Placeholder the template uses in names and contents.
const PLACEHOLDER: &str = "Template";

/// File extensions treated as text for placeholder substitution.
const TEXT_EXTENSIONS: &[&str] = &["json", "pbip", "pbism", "pbir", "tmdl", "txt", "platform"];

/// Template files the builder cannot work without.
const REQUIRED_FILES: &[&str] = &[
    "Template.pbip",
    "Template.SemanticModel/.platform",
    "Template.SemanticModel/definition.pbism",
    "Template.SemanticModel/definition/expressions.tmdl",
    "Template.SemanticModel/definition/model.tmdl",
    "Template.SemanticModel/definition/DateTable.tmdl",
];

/// Verify the template folder is usable.
pub fn check_template(template_folder: &Path) -> Result<(), PbipGenError> {
    for required in REQUIRED_FILES {
        let path = template_folder.join(required);
        if !path.exists() {
            return Err(PbipGenError::TemplateMissing { path });
        }
    }
    Ok(())
}

/// Relative path with `Template` replaced by the project name per segment.
fn project_relative_path(relative: &Path, project_name: &str) -> PathBuf {
    relative
        .iter()
        .map(|segment| {
            let segment = segment.to_string_lossy();
            PathBuf::from(segment.replace(PLACEHOLDER, project_name))
        })
        .collect()
}

fn is_text_file(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)));
    // `.platform` has no stem, so the extension check misses it.
    by_extension
        || path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == ".platform")
}

/// Clone the template tree into `destination`.
///
/// The calendar seed (`definition/DateTable.tmdl`) is not part of the output
/// tree; the date emitter instantiates it into `definition/tables/Date.tmdl`
/// separately.
pub fn clone_template(
    template_folder: &Path,
    destination: &Path,
    project_name: &str,
) -> Result<()> {
    check_template(template_folder)?;

    for entry in WalkDir::new(template_folder).sort_by_file_name() {
        let entry = entry.map_err(|e| PbipGenError::TemplateReadError {
            path: template_folder.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(template_folder)
            .expect("walkdir stays under its root");
        if relative == Path::new("Template.SemanticModel/definition/DateTable.tmdl") {
            continue;
        }
        let target = destination.join(project_relative_path(relative, project_name));
        copy_template_file(entry.path(), &target, project_name)?;
    }

    Ok(())
}

/// Copy one template file to `target`, substituting the project name in text
/// files and regenerating `.platform` identity.
pub fn copy_template_file(source: &Path, target: &Path, project_name: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PbipGenError::WriteFailed {
            path: target.to_path_buf(),
            source: e,
        })?;
    }

    let is_platform = source
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == ".platform");

    if is_platform {
        let text = read_template_text(source)?;
        let rewritten = rewrite_platform(&text, project_name).map_err(|message| {
            PbipGenError::PlatformFileInvalid {
                path: source.to_path_buf(),
                message,
            }
        })?;
        write_bytes(target, rewritten.as_bytes())?;
    } else if is_text_file(source) {
        let text = read_template_text(source)?;
        let substituted = text.replace(PLACEHOLDER, project_name);
        write_bytes(target, to_crlf(&substituted).as_bytes())?;
    } else {
        std::fs::copy(source, target).map_err(|e| PbipGenError::WriteFailed {
            path: target.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Set the display name and mint a fresh logical ID.
fn rewrite_platform(text: &str, project_name: &str) -> Result<String, String> {
    let mut document: Value =
        serde_json::from_str(text).map_err(|e| format!("not valid JSON: {e}"))?;

    let metadata = document
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or("missing 'metadata' object")?;
    metadata.insert(
        "displayName".to_string(),
        Value::String(project_name.to_string()),
    );

    let config = document
        .get_mut("config")
        .and_then(Value::as_object_mut)
        .ok_or("missing 'config' object")?;
    config.insert("logicalId".to_string(), Value::String(fresh_guid()));

    serde_json::to_string_pretty(&document).map_err(|e| e.to_string())
}

fn read_template_text(path: &Path) -> Result<String, PbipGenError> {
    std::fs::read_to_string(path).map_err(|e| PbipGenError::TemplateReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), PbipGenError> {
    std::fs::write(path, bytes).map_err(|e| PbipGenError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
