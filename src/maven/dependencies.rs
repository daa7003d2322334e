use std::collections::HashSet;

use async_recursion::async_recursion;
use tracing::debug;

use crate::maven::coordinates::{MavenCoordinates, PackageKey};
use crate::maven::error::ResolveError;
use crate::maven::resolver::{PomResolver, RepositoryFetcher};

/// Parses the given coordinate texts, expands them to the full transitive
///  compile/runtime closure and collapses conflicting versions. This is the
///  contract the download driver consumes.
pub async fn resolve_and_slim<F: RepositoryFetcher>(
    resolver: &PomResolver<F>,
    coordinate_texts: &[String],
) -> Result<Vec<MavenCoordinates>, ResolveError> {
    let mut roots = Vec::new();
    for text in coordinate_texts {
        roots.push(MavenCoordinates::parse(text)?);
    }

    let expanded = expand_transitive(resolver, &roots).await?;
    Ok(slim(expanded))
}

/// Pre-order expansion of the transitive closure: each descriptor's direct
///  compile/runtime dependencies are emitted in declaration order before
///  recursing into each of them. The output may contain several versions of
///  the same logical package - that is what [`slim`] is for.
///
/// A coordinate whose expansion already completed is emitted again at its
///  point of reference but not re-expanded (diamonds). A coordinate that is
///  its own ancestor in the active recursion is a true cycle and fails.
pub async fn expand_transitive<F: RepositoryFetcher>(
    resolver: &PomResolver<F>,
    roots: &[MavenCoordinates],
) -> Result<Vec<MavenCoordinates>, ResolveError> {
    let mut output = Vec::new();
    let mut completed: HashSet<MavenCoordinates> = HashSet::new();
    let mut stack: Vec<MavenCoordinates> = Vec::new();

    for root in roots {
        output.push(root.clone());
        if completed.contains(root) {
            continue;
        }
        expand_into(resolver, root, &mut completed, &mut stack, &mut output).await?;
    }

    debug!("expanded {} roots to {} coordinates", roots.len(), output.len());
    Ok(output)
}

#[async_recursion]
async fn expand_into<F: RepositoryFetcher>(
    resolver: &PomResolver<F>,
    coordinates: &MavenCoordinates,
    completed: &mut HashSet<MavenCoordinates>,
    stack: &mut Vec<MavenCoordinates>,
    output: &mut Vec<MavenCoordinates>,
) -> Result<(), ResolveError> {
    stack.push(coordinates.clone());

    let resolved = resolver.resolve(coordinates).await?;
    let children: Vec<MavenCoordinates> = resolved
        .propagating_dependencies()
        .map(|d| d.coordinates.clone())
        .collect();

    // direct dependencies first, in declaration order ...
    output.extend(children.iter().cloned());

    // ... then depth-first into each
    for child in &children {
        if completed.contains(child) {
            continue;
        }
        if stack.contains(child) {
            let mut chain: Vec<String> = stack.iter().map(|c| c.to_string()).collect();
            chain.push(child.to_string());
            return Err(ResolveError::DependencyCycle { chain });
        }
        expand_into(resolver, child, completed, stack, output).await?;
    }

    stack.pop();
    completed.insert(coordinates.clone());
    Ok(())
}

/// Collapses the sequence so that every logical package (group, artifact)
///  appears exactly once: the first occurrence wins, all later versions are
///  discarded. Combined with the pre-order of [`expand_transitive`] this
///  means declarations nearer to a root beat deeper transitive ones.
pub fn slim(coordinates: Vec<MavenCoordinates>) -> Vec<MavenCoordinates> {
    let mut seen: HashSet<PackageKey> = HashSet::new();
    coordinates
        .into_iter()
        .filter(|c| seen.insert(c.package_key()))
        .collect()
}
