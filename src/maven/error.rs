use thiserror::Error;

use crate::maven::coordinates::MavenCoordinates;

/// Errors produced while resolving a dependency closure. All of these are
///  terminal for the root being resolved - nothing is retried inside the
///  resolver, the caller decides whether to abort the run.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("not a valid maven coordinate {text:?}: {reason}")]
    MalformedCoordinate { text: String, reason: String },

    #[error("failed to fetch descriptor for {coordinates}")]
    DescriptorNotFound {
        coordinates: MavenCoordinates,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed descriptor for {coordinates}: {reason}")]
    MalformedDescriptor {
        coordinates: MavenCoordinates,
        reason: String,
    },

    #[error("cycle in parent chain: {}", .chain.join(" -> "))]
    CyclicParentChain { chain: Vec<String> },

    #[error("no version for dependency {group}:{artifact} declared in {declaring}")]
    UnresolvedVersion {
        declaring: MavenCoordinates,
        group: String,
        artifact: String,
    },

    #[error("unresolved property ${{{name}}} in {context} of {coordinates}")]
    UnresolvedProperty {
        coordinates: MavenCoordinates,
        name: String,
        context: String,
    },

    #[error("dependency cycle: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },
}
