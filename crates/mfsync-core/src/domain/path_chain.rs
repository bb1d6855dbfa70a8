//! Path chains: where a descriptor lives in the virtual file tree
//!
//! Each resource type derives a list of (segment name, is-directory) pairs
//! from its descriptor. Top-level resources are anchored at the tree root
//! (`[host, type folder, ...]`), dependent resources at their parent's node.
//! Walking a chain from its anchor and creating missing folders converges
//! idempotently: two descriptors that differ only outside their key share
//! every segment but the divergent ones.

use serde::{Deserialize, Serialize};

use super::descriptor::{RemoteDescriptor, USS_DELIMITER};
use super::errors::DomainError;
use super::newtypes::{NodeId, ResourceName};
use super::query::host_segment;

/// Folder holding datasets under a connection folder
pub const DATASETS_FOLDER: &str = "Data Sets";
/// Volume folder for datasets without a volume serial
pub const MIGRATED_FOLDER: &str = "Migrated";
/// Folder holding the USS tree under a connection folder
pub const USS_FOLDER: &str = "USS";
/// Folder holding jobs under a connection folder
pub const JOBS_FOLDER: &str = "Jobs";
/// Subsystem folder for jobs that report none
pub const NO_SUBSYSTEM_FOLDER: &str = "NOSYS";

/// Where a chain starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathAnchor {
    Root,
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub name: ResourceName,
    pub is_directory: bool,
}

impl PathSegment {
    fn folder(name: &str) -> Result<Self, DomainError> {
        Ok(Self {
            name: ResourceName::new(name)?,
            is_directory: true,
        })
    }

    fn leaf(name: &str, is_directory: bool) -> Result<Self, DomainError> {
        Ok(Self {
            name: ResourceName::new(name)?,
            is_directory,
        })
    }
}

/// Anchor plus ordered segments; the last segment is the target node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathChain {
    pub anchor: PathAnchor,
    pub segments: Vec<PathSegment>,
}

impl PathChain {
    /// The target segment
    pub fn leaf(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// All segments above the target
    pub fn parent_segments(&self) -> &[PathSegment] {
        match self.segments.split_last() {
            Some((_, parents)) => parents,
            None => &[],
        }
    }

    /// Whether the target would live under a different parent than in `other`
    pub fn parent_differs(&self, other: &PathChain) -> bool {
        self.anchor != other.anchor || self.parent_segments() != other.parent_segments()
    }

    /// Slash-joined rendering, used for logging and rule matching
    pub fn display_path(&self) -> String {
        let names: Vec<&str> = self.segments.iter().map(|s| s.name.as_str()).collect();
        match self.anchor {
            PathAnchor::Root => format!("/{}", names.join("/")),
            PathAnchor::Node(node) => format!("{node}/{}", names.join("/")),
        }
    }
}

impl RemoteDescriptor {
    /// Builds the path chain of this descriptor
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if a derived segment is not a valid node name
    /// or a USS path is not absolute.
    pub fn path_chain(&self) -> Result<PathChain, DomainError> {
        match self {
            RemoteDescriptor::Dataset(ds) => Ok(PathChain {
                anchor: PathAnchor::Root,
                segments: vec![
                    PathSegment::folder(host_segment(&ds.url))?,
                    PathSegment::folder(DATASETS_FOLDER)?,
                    PathSegment::folder(ds.volser.as_deref().unwrap_or(MIGRATED_FOLDER))?,
                    PathSegment::leaf(&ds.name, ds.organization.is_library())?,
                ],
            }),
            RemoteDescriptor::Member(m) => Ok(PathChain {
                anchor: PathAnchor::Node(m.library),
                segments: vec![PathSegment::leaf(&m.name, false)?],
            }),
            RemoteDescriptor::Uss(uss) => {
                if !uss.path.starts_with(USS_DELIMITER) {
                    return Err(DomainError::InvalidPath(uss.path.clone()));
                }
                let mut segments = vec![
                    PathSegment::folder(host_segment(&uss.url))?,
                    PathSegment::folder(USS_FOLDER)?,
                ];
                let tokens: Vec<&str> = uss
                    .path
                    .split(USS_DELIMITER)
                    .filter(|t| !t.is_empty())
                    .collect();
                if let Some((last, parents)) = tokens.split_last() {
                    for token in parents {
                        segments.push(PathSegment::folder(token)?);
                    }
                    segments.push(PathSegment::leaf(last, uss.is_directory)?);
                }
                Ok(PathChain {
                    anchor: PathAnchor::Root,
                    segments,
                })
            }
            RemoteDescriptor::Job(job) => Ok(PathChain {
                anchor: PathAnchor::Root,
                segments: vec![
                    PathSegment::folder(host_segment(&job.url))?,
                    PathSegment::folder(JOBS_FOLDER)?,
                    PathSegment::folder(job.subsystem.as_deref().unwrap_or(NO_SUBSYSTEM_FOLDER))?,
                    PathSegment::folder(&job.job_name)?,
                    PathSegment::folder(&job.job_id)?,
                ],
            }),
            RemoteDescriptor::SpoolFile(spool) => Ok(PathChain {
                anchor: PathAnchor::Node(spool.job),
                segments: vec![PathSegment::leaf(&spool.name(), false)?],
            }),
        }
    }
}
