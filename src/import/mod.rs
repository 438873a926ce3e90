//! Import units
//!
//! Configuration records naming a source, how to unpack it and where its
//! content lands in the volume, plus the machinery that resolves them into
//! subtrees.

pub mod collab;
pub mod library;
pub mod resolver;
pub mod unit;

pub use collab::{
    ArchiveExtractor, ImportCollaborators, LocalFetcher, PrepackagedReader, SourceFetcher,
    VolumeReader, ZipPrepackagedReader,
};
pub use library::scan_library;
pub use resolver::Resolver;
pub use unit::{
    Generation, GenerationSet, ImageSelection, ImportManifest, ImportUnit, InclusionPolicy,
    SourceKind, SourceLocator,
};
