//! Import units and their JSON configuration

use crate::error::ImportError;
use crate::tree::DestinationPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions handled as raw disk images
const RAW_IMAGE_EXTENSIONS: [&str; 3] = [".img", ".dsk", ".iso"];

/// Extensions handled by the archive extractor
const ARCHIVE_EXTENSIONS: [&str; 4] = [".hqx", ".sit", ".bin", ".zip"];

/// Where an import unit's bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocator {
    Url(String),
    /// Relative paths are resolved against the library directory
    Path(PathBuf),
}

impl SourceLocator {
    /// Lowercased extension of the locator, with the leading dot
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            SourceLocator::Url(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next().unwrap_or(without_query).to_string()
            }
            SourceLocator::Path(path) => path.file_name()?.to_string_lossy().to_string(),
        };
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_lowercase()))
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => write!(f, "{}", url),
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    RawImage,
    Archive,
    Prepackaged,
}

impl SourceKind {
    /// Classify a `.ext` string
    pub fn from_extension(ext: &str) -> Result<Self, ImportError> {
        let ext = ext.to_lowercase();
        if RAW_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(SourceKind::RawImage)
        } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(SourceKind::Archive)
        } else {
            Err(ImportError::Format(format!("unexpected source extension {:?}", ext)))
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::RawImage => "raw-image",
            SourceKind::Archive => "archive",
            SourceKind::Prepackaged => "prepackaged",
        };
        write!(f, "{}", label)
    }
}

/// Which part of a resolved source becomes the subtree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InclusionPolicy {
    #[default]
    WholeVolume,
    /// A single top-level folder, imported as a full-volume substitute
    NamedFolder(String),
    /// Every top-level item except the listed names
    Denylist(Vec<String>),
}

/// Disk images to pick out of an extracted archive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageSelection {
    #[default]
    None,
    Single(String),
    /// Each image becomes a folder named after it
    Multiple(Vec<String>),
}

/// Output generation a unit is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Generation {
    Baseline,
    NeedsLegacyMajorVersion,
    NeedsModernVariant,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Generation::Baseline => "baseline",
            Generation::NeedsLegacyMajorVersion => "needs-legacy-major-version",
            Generation::NeedsModernVariant => "needs-modern-variant",
        };
        write!(f, "{}", label)
    }
}

/// Set of generation tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationSet(BTreeSet<Generation>);

impl GenerationSet {
    pub fn baseline() -> Self {
        Self::from_iter([Generation::Baseline])
    }

    pub fn contains(&self, generation: Generation) -> bool {
        self.0.contains(&generation)
    }

    pub fn insert(&mut self, generation: Generation) {
        self.0.insert(generation);
    }

    /// True when the two sets share at least one tag
    pub fn intersects(&self, other: &GenerationSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Generation> + '_ {
        self.0.iter().copied()
    }
}

impl Default for GenerationSet {
    fn default() -> Self {
        Self::baseline()
    }
}

impl FromIterator<Generation> for GenerationSet {
    fn from_iter<I: IntoIterator<Item = Generation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for GenerationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", labels.join(", "))
    }
}

/// A configured source contributing one subtree
#[derive(Debug, Clone, PartialEq)]
pub struct ImportUnit {
    /// Library-relative path without extension; sort key
    pub id: String,
    pub destination: DestinationPath,
    pub source: SourceLocator,
    pub kind: SourceKind,
    pub policy: InclusionPolicy,
    pub images: ImageSelection,
    pub generations: GenerationSet,
    /// Resolution failures abort the run instead of skipping the unit
    pub required: bool,
}

impl ImportUnit {
    /// Baseline, whole-volume unit installed at `id`
    pub fn new(id: impl Into<String>, source: SourceLocator, kind: SourceKind) -> Self {
        let id = id.into();
        Self {
            destination: DestinationPath::parse(&id),
            id,
            source,
            kind,
            policy: InclusionPolicy::default(),
            images: ImageSelection::default(),
            generations: GenerationSet::baseline(),
            required: false,
        }
    }

    pub fn with_policy(mut self, policy: InclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_images(mut self, images: ImageSelection) -> Self {
        self.images = images;
        self
    }

    pub fn with_generations(mut self, generations: GenerationSet) -> Self {
        self.generations = generations;
        self
    }

    pub fn with_destination(mut self, destination: DestinationPath) -> Self {
        self.destination = destination;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Per-source import configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_denylist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_images: Option<Vec<String>>,
    #[serde(default, alias = "needs_system_7")]
    pub needs_legacy_major_version: bool,
    #[serde(default, alias = "needs_mac_os_x")]
    pub needs_modern_variant: bool,
    #[serde(default)]
    pub carbonized: bool,
    #[serde(default)]
    pub required: bool,
}

impl ImportManifest {
    /// Parse an import manifest file
    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| ImportError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Generation tags requested by the `needs_*` flags
    ///
    /// Carbonized software runs on both the legacy major version and the
    /// modern variant. Otherwise the modern flag takes precedence over the
    /// legacy one.
    pub fn generations(&self) -> GenerationSet {
        let tags: &[Generation] = if self.carbonized {
            &[Generation::NeedsLegacyMajorVersion, Generation::NeedsModernVariant]
        } else if self.needs_modern_variant {
            &[Generation::NeedsModernVariant]
        } else if self.needs_legacy_major_version {
            &[Generation::NeedsLegacyMajorVersion]
        } else {
            &[Generation::Baseline]
        };
        tags.iter().copied().collect()
    }

    /// Turn this manifest into the import unit `id`
    ///
    /// `path` is the manifest's location, used for error reporting.
    pub fn into_unit(self, id: &str, path: &Path) -> Result<ImportUnit, ImportError> {
        let invalid = |reason: &str| ImportError::InvalidConfig {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let generations = self.generations();
        let source = match (self.src_url, self.src_path) {
            (Some(url), None) => SourceLocator::Url(url),
            (None, Some(local)) => SourceLocator::Path(PathBuf::from(local)),
            (Some(_), Some(_)) => return Err(invalid("src_url and src_path are exclusive")),
            (None, None) => return Err(invalid("one of src_url or src_path is required")),
        };

        let ext = match self.src_ext {
            Some(ext) if ext.starts_with('.') => ext,
            Some(ext) => format!(".{}", ext),
            None => source.extension().ok_or_else(|| {
                ImportError::Format(format!("cannot infer source kind of {}", source))
            })?,
        };
        let kind = SourceKind::from_extension(&ext)?;

        let policy = match (self.src_folder, self.src_denylist) {
            (Some(_), Some(_)) => {
                return Err(invalid("src_folder and src_denylist are exclusive"))
            }
            (Some(folder), None) => InclusionPolicy::NamedFolder(folder),
            (None, Some(denylist)) => InclusionPolicy::Denylist(denylist),
            (None, None) => InclusionPolicy::WholeVolume,
        };

        let images = match (self.src_image, self.src_images) {
            (Some(_), Some(_)) => return Err(invalid("src_image and src_images are exclusive")),
            (Some(image), None) => ImageSelection::Single(image),
            (None, Some(images)) => ImageSelection::Multiple(images),
            (None, None) => ImageSelection::None,
        };
        if images != ImageSelection::None && kind != SourceKind::Archive {
            return Err(invalid("src_image(s) requires an archive source"));
        }

        Ok(ImportUnit::new(id, source, kind)
            .with_policy(policy)
            .with_images(images)
            .with_generations(generations)
            .required(self.required))
    }
}
