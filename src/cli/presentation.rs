//! CLI presentation: text and json formatters per command.

use crate::chunk::ChunkStats;
use crate::error::BuildError;
use crate::import::{ImportUnit, InclusionPolicy};
use crate::manifest::SequentialManifest;
use crate::pipeline::{BuildSummary, ChunkedImage, VolumePlan, VolumeVariant};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use std::path::{Path, PathBuf};

fn format_section_heading(title: &str) -> String {
    format!("{}\n{}", title, "-".repeat(title.chars().count()))
}

fn format_bytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else {
        format!("{} B", bytes)
    }
}

fn describe_policy(policy: &InclusionPolicy) -> String {
    match policy {
        InclusionPolicy::WholeVolume => "whole".to_string(),
        InclusionPolicy::NamedFolder(name) => format!("folder {}", name),
        InclusionPolicy::Denylist(names) => format!("all but {}", names.join(", ")),
    }
}

/// Units in build order, then the volumes and their unit counts.
pub fn format_plan_text(
    units: &[ImportUnit],
    volumes: &[VolumeVariant],
    plans: &[VolumePlan],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Import units")));
    if units.is_empty() {
        out.push_str("No import units found.\n\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Unit", "Kind", "Contents", "Generations", "Volumes", "Required"]);
        for unit in units {
            let receiving: Vec<&str> = plans
                .iter()
                .filter(|plan| plan.units.contains(&unit.id))
                .map(|plan| plan.name.as_str())
                .collect();
            let receiving = if receiving.is_empty() {
                "-".to_string()
            } else {
                receiving.join(", ")
            };
            table.add_row(vec![
                unit.id.clone(),
                unit.kind.to_string(),
                describe_policy(&unit.policy),
                unit.generations.to_string(),
                receiving,
                if unit.required { "yes" } else { "no" }.to_string(),
            ]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    out.push_str(&format!("{}\n\n", format_section_heading("Volumes")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Volume", "Extends", "Size", "Generations", "Units"]);
    for volume in volumes {
        let count = plans
            .iter()
            .find(|plan| plan.name == volume.name)
            .map(|plan| plan.units.len())
            .unwrap_or(0);
        table.add_row(vec![
            volume.name.clone(),
            volume.extends.clone().unwrap_or_else(|| "-".to_string()),
            format_bytes(volume.size_bytes),
            volume.generations.to_string(),
            count.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

#[derive(Serialize)]
struct PlanUnitJson<'a> {
    id: &'a str,
    kind: String,
    source: String,
    destination: String,
    generations: Vec<String>,
    required: bool,
}

#[derive(Serialize)]
struct PlanVolumeJson<'a> {
    name: &'a str,
    extends: Option<&'a str>,
    size_bytes: u64,
    units: &'a [String],
}

pub fn format_plan_json(
    units: &[ImportUnit],
    volumes: &[VolumeVariant],
    plans: &[VolumePlan],
) -> Result<String, BuildError> {
    let units: Vec<PlanUnitJson> = units
        .iter()
        .map(|unit| PlanUnitJson {
            id: &unit.id,
            kind: unit.kind.to_string(),
            source: unit.source.to_string(),
            destination: unit.destination.to_string(),
            generations: unit.generations.iter().map(|g| g.to_string()).collect(),
            required: unit.required,
        })
        .collect();
    let volumes: Vec<PlanVolumeJson> = volumes
        .iter()
        .map(|volume| PlanVolumeJson {
            name: &volume.name,
            extends: volume.extends.as_deref(),
            size_bytes: volume.size_bytes,
            units: plans
                .iter()
                .find(|plan| plan.name == volume.name)
                .map(|plan| plan.units.as_slice())
                .unwrap_or(&[]),
        })
        .collect();
    let out = serde_json::json!({ "units": units, "volumes": volumes });
    serde_json::to_string_pretty(&out)
        .map_err(|e| BuildError::ConfigError(format!("Failed to render plan: {}", e)))
}

fn format_stats(stats: &ChunkStats) -> String {
    format!(
        "  Chunks: {} ({} zero, {} new, {} already stored)",
        stats.total_chunks, stats.zero_chunks, stats.stored_chunks, stats.deduplicated_chunks
    )
}

pub fn format_chunk_result(result: &ChunkedImage) -> String {
    format!(
        "Chunked {}:\n  Size: {} bytes\n{}\n  Manifest: {}",
        result.manifest.name,
        result.manifest.total_size,
        format_stats(&result.stats),
        result.manifest_path.display()
    )
}

/// One row per built volume, then any skipped units
pub fn format_build_summary(summary: &BuildSummary, cleared: Option<usize>) -> String {
    let mut out = String::new();
    if let Some(removed) = cleared {
        out.push_str(&format!("Cleared {} chunks before building\n\n", removed));
    }
    out.push_str(&format!("{}\n\n", format_section_heading("Volumes")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Volume", "Units", "Conflicts", "Chunks", "New", "Manifest"]);
    for volume in &summary.volumes {
        table.add_row(vec![
            volume.name.clone(),
            volume.units.len().to_string(),
            volume.merge.warnings.len().to_string(),
            volume.image.stats.total_chunks.to_string(),
            volume.image.stats.stored_chunks.to_string(),
            volume.image.manifest_path.display().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    if !summary.skipped.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Skipped units")));
        for skipped in &summary.skipped {
            out.push_str(&format!("  {}: {}\n", skipped.id, skipped.reason));
        }
    }
    out
}

pub fn format_sequential_result(manifest: &SequentialManifest, manifest_path: &Path) -> String {
    format!(
        "Wrote {} chunk files:\n  Size: {} bytes\n  Version: {}\n  Manifest: {}",
        manifest.chunk_count,
        manifest.total_size,
        manifest.version,
        manifest_path.display()
    )
}

/// Outcome of `verify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub manifest_path: PathBuf,
    pub total_size: u64,
    /// Comparison with the original image, when one was given
    pub matches: Option<bool>,
}

pub fn format_verify_result(result: &VerifyResult) -> String {
    let verdict = match result.matches {
        None => "reassembled".to_string(),
        Some(true) => "matches image".to_string(),
        Some(false) => "DOES NOT match image".to_string(),
    };
    format!(
        "{}: {} bytes, {}",
        result.manifest_path.display(),
        result.total_size,
        verdict
    )
}
