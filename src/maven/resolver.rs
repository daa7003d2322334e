use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::{trace, warn};

use crate::maven::coordinates::{
    MavenArtifactId, MavenClassifier, MavenCoordinates, MavenGroupId, MavenVersion,
    DEFAULT_EXTENSION,
};
use crate::maven::error::ResolveError;
use crate::maven::pom::{DependencyScope, PomDependency, PomDescriptor};

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
}

/// Property values may reference other properties; this bounds the
///  substitution passes so that self-referential definitions terminate.
const MAX_SUBSTITUTION_PASSES: usize = 8;

/// The transport seam: fetches a document relative to the repository root.
///  Transport concerns (TLS, retries, ...) live behind this trait, the
///  resolver itself never does raw I/O.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> anyhow::Result<Bytes>;
}

/// One fully resolved dependency entry: placeholders substituted, version
///  filled in from dependency management where the declaration omitted it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ResolvedDependency {
    pub coordinates: MavenCoordinates,
    pub scope: DependencyScope,
    pub optional: bool,
}

/// A descriptor after parent-chain flattening and property substitution -
///  no deferred lookups remain.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ResolvedPom {
    pub coordinates: MavenCoordinates,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<ResolvedDependency>,
}

impl ResolvedPom {
    /// The dependencies that propagate into the transitive closure:
    ///  compile / runtime scope and not optional.
    pub fn propagating_dependencies(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies
            .iter()
            .filter(|d| d.scope.propagates() && !d.optional)
    }
}

type CacheKey = (MavenGroupId, MavenArtifactId, MavenVersion);

fn cache_key(coordinates: &MavenCoordinates) -> CacheKey {
    (
        coordinates.group_id.clone(),
        coordinates.artifact_id.clone(),
        coordinates.version.clone(),
    )
}

/// Fetches and resolves descriptors against a repository. Both raw and
///  resolved descriptors are cached per coordinate, so a parent shared by
///  many modules is fetched once per resolver instance. The caches are
///  explicit per-instance state - resolver instances are independent.
pub struct PomResolver<F: RepositoryFetcher> {
    fetcher: F,
    descriptors: Mutex<HashMap<CacheKey, Arc<PomDescriptor>>>,
    resolved: Mutex<HashMap<CacheKey, Arc<ResolvedPom>>>,
}

impl<F: RepositoryFetcher> PomResolver<F> {
    pub fn new(fetcher: F) -> PomResolver<F> {
        PomResolver {
            fetcher,
            descriptors: Default::default(),
            resolved: Default::default(),
        }
    }

    /// Fetches the descriptor for the given coordinates and resolves it:
    ///  the parent chain is walked to its end, properties and dependency
    ///  management are merged (own wins over parent), and every placeholder
    ///  and missing version is substituted.
    pub async fn resolve(
        &self,
        coordinates: &MavenCoordinates,
    ) -> Result<Arc<ResolvedPom>, ResolveError> {
        let key = cache_key(coordinates);
        if let Some(hit) = self.resolved.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }

        let chain = self.fetch_ancestor_chain(coordinates).await?;
        let resolved = Arc::new(resolve_chain(&chain)?);

        self.resolved.lock().unwrap().insert(key, resolved.clone());
        Ok(resolved)
    }

    /// The descriptor itself followed by its ancestors, own descriptor
    ///  first. The chain is materialized as an explicit list so that
    ///  merging is a simple iteration and cycle detection a seen-set check.
    async fn fetch_ancestor_chain(
        &self,
        coordinates: &MavenCoordinates,
    ) -> Result<Vec<Arc<PomDescriptor>>, ResolveError> {
        let mut chain: Vec<Arc<PomDescriptor>> = Vec::new();
        let mut seen: HashSet<CacheKey> = HashSet::new();
        let mut next = Some(coordinates.clone());

        while let Some(current) = next {
            if !seen.insert(cache_key(&current)) {
                let mut cycle: Vec<String> =
                    chain.iter().map(|d| d.coordinates.to_string()).collect();
                cycle.push(current.to_string());
                return Err(ResolveError::CyclicParentChain { chain: cycle });
            }

            let descriptor = self.fetch_descriptor(&current).await?;
            next = descriptor.parent.clone();
            chain.push(descriptor);
        }

        Ok(chain)
    }

    async fn fetch_descriptor(
        &self,
        coordinates: &MavenCoordinates,
    ) -> Result<Arc<PomDescriptor>, ResolveError> {
        let key = cache_key(coordinates);
        if let Some(hit) = self.descriptors.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }

        let path = coordinates.descriptor_path();
        trace!("fetching descriptor {}", path);

        let raw = self.fetcher.fetch(&path).await.map_err(|e| {
            ResolveError::DescriptorNotFound {
                coordinates: coordinates.clone(),
                source: e,
            }
        })?;
        let text =
            std::str::from_utf8(&raw).map_err(|_| ResolveError::MalformedDescriptor {
                coordinates: coordinates.clone(),
                reason: "descriptor is not valid UTF-8".to_string(),
            })?;

        let descriptor = Arc::new(PomDescriptor::parse(text, coordinates)?);
        self.descriptors
            .lock()
            .unwrap()
            .insert(key, descriptor.clone());
        Ok(descriptor)
    }
}

/// Pure merge + substitution over an explicit ancestor chain (own
///  descriptor first, root-most ancestor last).
fn resolve_chain(chain: &[Arc<PomDescriptor>]) -> Result<ResolvedPom, ResolveError> {
    let own = &chain[0];

    let properties = effective_properties(chain);
    let management = effective_dependency_management(chain, &properties, own)?;

    let mut dependencies: Vec<ResolvedDependency> = Vec::new();
    let mut index_by_package: HashMap<(String, String), usize> = HashMap::new();

    // ancestors first so that inherited entries keep their position and own
    //  declarations override them at the same logical package
    for (depth, descriptor) in chain.iter().enumerate().rev() {
        let is_own = depth == 0;

        for declared in &descriptor.dependencies {
            let group = substitute(&declared.group_id, &properties, descriptor, "groupId")?;
            let artifact =
                substitute(&declared.artifact_id, &properties, descriptor, "artifactId")?;
            let managed = management.get(&(group.clone(), artifact.clone()));

            let scope = match declared
                .scope
                .clone()
                .or_else(|| managed.and_then(|m| m.scope.clone()))
            {
                None => DependencyScope::Compile,
                Some(raw) => {
                    let scope_text = substitute(&raw, &properties, descriptor, "scope")?;
                    match DependencyScope::parse(&scope_text) {
                        Some(scope) => scope,
                        None => {
                            warn!(
                                "unknown scope {:?} for {}:{} in {}, skipping",
                                scope_text, group, artifact, descriptor.coordinates
                            );
                            continue;
                        }
                    }
                }
            };

            // test/provided entries are not inherited
            if !is_own && !scope.propagates() {
                continue;
            }

            let raw_version = declared
                .version
                .clone()
                .or_else(|| managed.and_then(|m| m.version.clone()))
                .ok_or_else(|| ResolveError::UnresolvedVersion {
                    declaring: descriptor.coordinates.clone(),
                    group: group.clone(),
                    artifact: artifact.clone(),
                })?;
            let version = substitute(&raw_version, &properties, descriptor, "version")?;

            let resolved = ResolvedDependency {
                coordinates: MavenCoordinates {
                    group_id: MavenGroupId(group.clone()),
                    artifact_id: MavenArtifactId(artifact.clone()),
                    version: MavenVersion(version),
                    classifier: match &declared.classifier {
                        None => MavenClassifier::Unclassified,
                        Some(c) => MavenClassifier::Classified(c.clone()),
                    },
                    extension: declared
                        .extension
                        .clone()
                        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
                },
                scope,
                optional: declared.optional,
            };

            match index_by_package.get(&(group.clone(), artifact.clone())) {
                Some(&index) => dependencies[index] = resolved,
                None => {
                    index_by_package.insert((group, artifact), dependencies.len());
                    dependencies.push(resolved);
                }
            }
        }
    }

    Ok(ResolvedPom {
        coordinates: own.coordinates.clone(),
        properties,
        dependencies,
    })
}

/// Parent properties overlaid by child properties, plus the built-in
///  `project.*` values (with their legacy `pom.*` aliases) that real
///  descriptors routinely reference.
fn effective_properties(chain: &[Arc<PomDescriptor>]) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for descriptor in chain.iter().rev() {
        properties.extend(descriptor.properties.clone());
    }

    let own = &chain[0];
    for prefix in ["project", "pom"] {
        properties.insert(
            format!("{}.groupId", prefix),
            own.coordinates.group_id.0.clone(),
        );
        properties.insert(
            format!("{}.artifactId", prefix),
            own.coordinates.artifact_id.0.clone(),
        );
        properties.insert(
            format!("{}.version", prefix),
            own.coordinates.version.0.clone(),
        );
    }
    if let Some(parent) = &own.parent {
        for prefix in ["project.parent", "parent"] {
            properties.insert(format!("{}.groupId", prefix), parent.group_id.0.clone());
            properties.insert(format!("{}.version", prefix), parent.version.0.clone());
        }
    }

    properties
}

fn effective_dependency_management(
    chain: &[Arc<PomDescriptor>],
    properties: &HashMap<String, String>,
    own: &Arc<PomDescriptor>,
) -> Result<HashMap<(String, String), PomDependency>, ResolveError> {
    let mut management = HashMap::new();
    for descriptor in chain.iter().rev() {
        for entry in &descriptor.dependency_management {
            if entry.scope.as_deref() == Some("import") {
                // BOM imports would require fetching the imported descriptor
                warn!(
                    "ignoring import-scoped dependency management entry {}:{} in {}",
                    entry.group_id, entry.artifact_id, descriptor.coordinates
                );
                continue;
            }
            let key = (
                substitute(&entry.group_id, properties, own, "dependencyManagement groupId")?,
                substitute(
                    &entry.artifact_id,
                    properties,
                    own,
                    "dependencyManagement artifactId",
                )?,
            );
            management.insert(key, entry.clone());
        }
    }
    Ok(management)
}

/// Replaces every `${name}` placeholder with the property value for `name`.
///  Substitution is iterated because property values may themselves contain
///  placeholders.
fn substitute(
    value: &str,
    properties: &HashMap<String, String>,
    descriptor: &PomDescriptor,
    context: &str,
) -> Result<String, ResolveError> {
    let unresolved = |name: String| ResolveError::UnresolvedProperty {
        coordinates: descriptor.coordinates.clone(),
        name,
        context: context.to_string(),
    };

    let mut current = value.to_string();
    for _ in 0..MAX_SUBSTITUTION_PASSES {
        if !current.contains("${") {
            return Ok(current);
        }

        let mut missing: Option<String> = None;
        let replaced = PLACEHOLDER_REGEX
            .replace_all(&current, |caps: &Captures| {
                let name = &caps[1];
                match properties.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        missing.get_or_insert_with(|| name.to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        if let Some(name) = missing {
            return Err(unresolved(name));
        }
        current = replaced;
    }

    // still placeholders after the bounded number of passes, i.e. the
    //  property definitions are (mutually) recursive
    let name = PLACEHOLDER_REGEX
        .captures(&current)
        .map(|caps| caps[1].to_string())
        .unwrap_or(current);
    Err(unresolved(name))
}
