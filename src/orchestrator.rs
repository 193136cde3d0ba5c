//! Build orchestration: analyze and apply pipelines.
//!
//! One invocation walks Idle → (Backing Up) → ReadingExisting → Emitting →
//! Diffing → (Merging → Writing → Verifying) → Idle. Analyze stops after the
//! diff. Writes are per-file and not transactional; the optional backup is
//! the recovery path for a partial apply.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use walkdir::WalkDir;

use crate::diff::{compute_change_set, ChangeEntry, ChangeKind, ChangeSet, Impact};
use crate::emit::date_table::instantiate_date_table;
use crate::emit::expressions::emit_expressions_tmdl;
use crate::emit::model_file::emit_model_tmdl;
use crate::emit::plan::{plan_columns, ColumnPlan};
use crate::emit::relationships::{emit_relationships_file, plan_relationships, PlannedRelationship};
use crate::emit::table::emit_table_file;
use crate::error::PbipGenError;
use crate::merge::{plan_preservation, PreservationPlan};
use crate::model::{validate_request, BuildRequest};
use crate::parse::{read_existing_model, ExistingModel};
use crate::progress::{CancelToken, ProgressSink};
use crate::template::{check_template, clone_template, copy_template_file};
use crate::util::{sanitize_file_name, strip_bom, to_crlf};

/// What the caller wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Compute the change set only; touch nothing.
    Analyze,
    /// Write the project, optionally backing up the prior state first.
    Apply { create_backup: bool },
}

/// Result of one invocation.
#[derive(Debug)]
pub struct BuildOutcome {
    pub change_set: ChangeSet,
    /// False for analyze runs.
    pub applied: bool,
}

struct EmittedModel {
    plans_by_table: HashMap<String, Vec<ColumnPlan>>,
    planned_relationships: Vec<PlannedRelationship>,
}

/// Run one build.
pub fn build(
    request: &BuildRequest,
    mode: BuildMode,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<BuildOutcome> {
    // Step 1: Validate the request before anything touches the disk
    validate_request(request)?;

    let mut pre_warnings: Vec<String> = Vec::new();

    if let BuildMode::Apply { create_backup } = mode {
        check_template(&request.template_folder)?;
        if create_backup {
            if let Err(error) = backup_existing(request, sink) {
                // Backup failure downgrades to a warning; the build goes on.
                let message = error.to_string();
                sink.warning(&message);
                pre_warnings.push(message);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(PbipGenError::Cancelled.into());
    }

    // Step 2: Read prior on-disk state
    sink.status("Reading existing model");
    let existing = read_existing_model(&request.definition_dir())?;

    // Step 3: Emit the new model in memory
    sink.status("Computing model");
    let emitted = emit_in_memory(request);

    // Step 4: Preservation plan and change set
    let preservation = plan_preservation(
        request,
        &emitted.plans_by_table,
        &emitted.planned_relationships,
        &existing,
    );
    let mut change_set = compute_change_set(
        request,
        &emitted.plans_by_table,
        &emitted.planned_relationships,
        &preservation,
        &existing,
    );
    for warning in pre_warnings {
        change_set.push(
            ChangeEntry::new(Impact::Safe, ChangeKind::Warning, "backup").with_detail(warning),
        );
    }

    let BuildMode::Apply { .. } = mode else {
        sink.status("Analysis complete");
        return Ok(BuildOutcome {
            change_set,
            applied: false,
        });
    };

    if cancel.is_cancelled() {
        return Err(PbipGenError::Cancelled.into());
    }

    // Step 5: Merge preserved content and write the project
    write_project(request, &emitted, &preservation, &existing, sink, cancel)?;

    // Step 6: Structural verification
    verify_outputs(request, sink)?;

    sink.status("Build complete");
    Ok(BuildOutcome {
        change_set,
        applied: true,
    })
}

fn emit_in_memory(request: &BuildRequest) -> EmittedModel {
    let mut plans_by_table = HashMap::new();
    for table in &request.tables {
        plans_by_table.insert(
            table.logical_name.to_lowercase(),
            plan_columns(table, request.date_config.as_ref()),
        );
    }
    let planned_relationships = plan_relationships(request, &plans_by_table);
    EmittedModel {
        plans_by_table,
        planned_relationships,
    }
}

/// Copy the whole PBIP folder to a timestamped sibling.
fn backup_existing(request: &BuildRequest, sink: &dyn ProgressSink) -> Result<(), PbipGenError> {
    let pbip_root = request.pbip_root();
    if !pbip_root.exists() {
        return Ok(());
    }
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_root = request.output_folder.join(format!("PBIP_Backup_{stamp}"));
    sink.status(&format!("Backing up to {}", backup_root.display()));
    copy_dir(&pbip_root, &backup_root).map_err(|e| PbipGenError::BackupFailed {
        path: backup_root,
        message: e.to_string(),
    })
}

fn copy_dir(source: &Path, destination: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn write_project(
    request: &BuildRequest,
    emitted: &EmittedModel,
    preservation: &PreservationPlan,
    existing: &ExistingModel,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<()> {
    let pbip_root = request.pbip_root();
    let project_file = pbip_root.join(format!("{}.pbip", request.project_name));
    if !project_file.exists() {
        sink.status("Cloning project template");
        clone_template(&request.template_folder, &pbip_root, &request.project_name)?;
    }

    // Renamed tables: the old file goes away, its content was carried.
    for rename in &preservation.renames {
        sink.status(&format!(
            "Renaming table file '{}' -> '{}'",
            rename.old_display_name, rename.new_display_name
        ));
        std::fs::remove_file(&rename.old_path).map_err(|e| PbipGenError::WriteFailed {
            path: rename.old_path.clone(),
            source: e,
        })?;
    }

    let definition_dir = request.definition_dir();
    let tables_dir = definition_dir.join("tables");

    for table in &request.tables {
        if cancel.is_cancelled() {
            return Err(PbipGenError::Cancelled.into());
        }
        let plans = emitted
            .plans_by_table
            .get(&table.logical_name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let carry = preservation.table_carry(&table.logical_name);
        let content = emit_table_file(table, plans, request, carry);
        let path = tables_dir.join(format!("{}.tmdl", sanitize_file_name(&table.display_name)));
        sink.status(&format!("Writing {}", path.display()));
        write_tmdl(&path, &content)?;
    }

    // The calendar table is written only when absent, never rewritten.
    if let Some(date_config) = request
        .date_config
        .as_ref()
        .filter(|_| !existing.date_table_present)
    {
        if cancel.is_cancelled() {
            return Err(PbipGenError::Cancelled.into());
        }
        let seed_path = request
            .template_folder
            .join("Template.SemanticModel/definition/DateTable.tmdl");
        if !seed_path.exists() {
            return Err(PbipGenError::TemplateMissing { path: seed_path }.into());
        }
        let seed = std::fs::read_to_string(&seed_path).map_err(|e| {
            PbipGenError::TemplateReadError {
                path: seed_path.clone(),
                source: e,
            }
        })?;
        let content =
            instantiate_date_table(strip_bom(&seed), date_config.start_year, date_config.end_year)?;
        let path = tables_dir.join("Date.tmdl");
        sink.status(&format!("Writing {}", path.display()));
        write_tmdl(&path, &content)?;
    }

    for (name, content) in [
        (
            "relationships.tmdl",
            emit_relationships_file(&emitted.planned_relationships, &preservation.relationships),
        ),
        ("model.tmdl", emit_model_tmdl(request)),
        (
            "expressions.tmdl",
            emit_expressions_tmdl(request, &preservation.expression_tags),
        ),
    ] {
        if cancel.is_cancelled() {
            return Err(PbipGenError::Cancelled.into());
        }
        let path = definition_dir.join(name);
        sink.status(&format!("Writing {}", path.display()));
        write_tmdl(&path, &content)?;
    }

    Ok(())
}

/// Write TMDL bytes: CRLF line endings, UTF-8 without BOM.
fn write_tmdl(path: &Path, lf_text: &str) -> Result<(), PbipGenError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PbipGenError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, to_crlf(lf_text)).map_err(|e| PbipGenError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Check the structural minimum exists, restoring missing files from the
/// template. A missing template source at this point is fatal.
fn verify_outputs(request: &BuildRequest, sink: &dyn ProgressSink) -> Result<()> {
    let pbip_root = request.pbip_root();
    let project = &request.project_name;
    let required: [(PathBuf, String); 3] = [
        (
            request.template_folder.join("Template.pbip"),
            format!("{project}.pbip"),
        ),
        (
            request
                .template_folder
                .join("Template.SemanticModel/.platform"),
            format!("{project}.SemanticModel/.platform"),
        ),
        (
            request
                .template_folder
                .join("Template.SemanticModel/definition.pbism"),
            format!("{project}.SemanticModel/definition.pbism"),
        ),
    ];

    for (template_source, relative) in required {
        let target = pbip_root.join(&relative);
        if target.exists() {
            continue;
        }
        if !template_source.exists() {
            return Err(PbipGenError::TemplateMissing {
                path: template_source,
            }
            .into());
        }
        sink.warning(&format!("Restoring missing {relative} from template"));
        copy_template_file(&template_source, &target, project)?;
    }
    Ok(())
}
