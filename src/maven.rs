pub mod coordinates;
pub mod dependencies;
pub mod error;
pub mod pom;
pub mod resolver;

#[cfg(test)]
pub mod testutil;

pub use coordinates::MavenCoordinates;
pub use dependencies::resolve_and_slim;
pub use error::ResolveError;
pub use resolver::{PomResolver, RepositoryFetcher};
