// src/route/mod.rs

//! Stream routing.
//!
//! - [`spec`] holds the caller-facing literals ([`StreamSpec`],
//!   [`StreamHandle`]) and their keyed / command-line parsers.
//! - [`router`] turns each literal into exactly one [`StreamRoute`] for its
//!   stream, then allocates the descriptors and pipes the launch needs.

pub mod router;
pub mod spec;

use std::path::PathBuf;

pub use router::route_for;
pub(crate) use router::{ChildBindings, ControllerEndpoints, plan_streams};
pub use spec::{SharedReader, SharedWriter, StreamHandle, StreamSpec};

use crate::types::{FileMode, StreamName};

/// Routing intent for one standard stream.
#[derive(Debug, Clone)]
pub enum StreamRoute {
    /// The child has no such descriptor at all.
    Closed,
    /// Connected to the null device: readable but empty, writes discarded.
    Null,
    Inherit,
    ParentFd(i32),
    File {
        path: PathBuf,
        mode: FileMode,
        perm: u32,
    },
    ExternalHandle(StreamHandle),
    MergeInto(StreamName),
    StringSource(Vec<u8>),
    Captured,
    ControllerManaged,
}

impl StreamRoute {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamRoute::Closed => "closed",
            StreamRoute::Null => "null",
            StreamRoute::Inherit => "inherit",
            StreamRoute::ParentFd(_) => "parent_fd",
            StreamRoute::File { .. } => "file",
            StreamRoute::ExternalHandle(_) => "handle",
            StreamRoute::MergeInto(_) => "merge",
            StreamRoute::StringSource(_) => "string",
            StreamRoute::Captured => "capture",
            StreamRoute::ControllerManaged => "controller",
        }
    }
}
