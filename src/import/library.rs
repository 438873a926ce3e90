//! Library scanning
//!
//! The library directory holds one `.json` import manifest per source and
//! prepackaged `.zip` bundles. The path of each file relative to the library,
//! without extension, is the unit id and its destination in the volume.

use crate::error::ImportError;
use crate::import::unit::{GenerationSet, ImportManifest, ImportUnit, SourceKind, SourceLocator};
use std::collections::HashMap;
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Scan `library_dir` for import units, sorted by id
///
/// `filter` keeps only files whose path contains the given substring.
/// `prepackaged_generations` routes prepackaged bundles by id; unlisted
/// bundles are baseline.
pub fn scan_library(
    library_dir: &Path,
    filter: Option<&str>,
    prepackaged_generations: &HashMap<String, GenerationSet>,
) -> Result<Vec<ImportUnit>, ImportError> {
    let mut units = Vec::new();

    let walker = WalkDir::new(library_dir)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            ImportError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to scan library {:?}: {}", library_dir, e),
            ))
        })?;
        let path = entry.path();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        if !entry.file_type().is_file() {
            continue;
        }
        let is_bundle = extension.as_deref() == Some("zip");
        if let Some(filter) = filter {
            if !path.to_string_lossy().contains(filter) {
                continue;
            }
        }
        let Some(id) = unit_id(library_dir, path) else {
            continue;
        };

        if is_bundle {
            debug!(id = %id, "Found prepackaged bundle");
            let generations = prepackaged_generations
                .get(&id)
                .cloned()
                .unwrap_or_default();
            let relative = path.strip_prefix(library_dir).unwrap_or(path).to_path_buf();
            units.push(
                ImportUnit::new(&id, SourceLocator::Path(relative), SourceKind::Prepackaged)
                    .with_generations(generations),
            );
        } else if extension.as_deref() == Some("json") {
            debug!(id = %id, "Found import manifest");
            let unit = ImportManifest::load(path)?.into_unit(&id, path)?;
            units.push(unit);
        }
    }

    units.sort_by(|a, b| a.id.cmp(&b.id));
    info!(count = units.len(), library = %library_dir.display(), "Scanned library");
    Ok(units)
}

/// Library-relative path without extension, `/`-separated
fn unit_id(library_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(library_dir).ok()?.with_extension("");
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
