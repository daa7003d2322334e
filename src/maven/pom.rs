use std::collections::HashMap;

use tracing::warn;

use crate::maven::coordinates::{MavenCoordinates, DESCRIPTOR_EXTENSION};
use crate::maven::error::ResolveError;

/// Mirror structs for the POM document format, field names as they appear
///  in the XML.
#[allow(non_snake_case)]
mod xml {
    use std::collections::HashMap;

    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Project {
        pub parent: Option<Parent>,
        pub groupId: Option<String>,
        pub artifactId: Option<String>,
        pub version: Option<String>,
        pub properties: Option<HashMap<String, String>>,
        pub dependencies: Option<Dependencies>,
        pub dependencyManagement: Option<DependencyManagement>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Parent {
        pub groupId: String,
        pub artifactId: String,
        pub version: String,
    }

    #[derive(Deserialize, Debug)]
    pub struct Dependencies {
        #[serde(default)]
        pub dependency: Vec<Dependency>,
    }

    #[derive(Deserialize, Debug)]
    pub struct DependencyManagement {
        pub dependencies: Option<Dependencies>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Dependency {
        pub groupId: String,
        pub artifactId: String,
        pub version: Option<String>,
        pub scope: Option<String>,
        pub classifier: Option<String>,
        #[serde(rename = "type")]
        pub type_: Option<String>,
        pub optional: Option<String>,
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum DependencyScope {
    Compile,
    Runtime,
    Test,
    Provided,
    System,
    Import,
}

impl DependencyScope {
    /// `None` for scope strings the POM format does not define.
    pub fn parse(text: &str) -> Option<DependencyScope> {
        match text {
            "compile" => Some(DependencyScope::Compile),
            "runtime" => Some(DependencyScope::Runtime),
            "test" => Some(DependencyScope::Test),
            "provided" => Some(DependencyScope::Provided),
            "system" => Some(DependencyScope::System),
            "import" => Some(DependencyScope::Import),
            _ => None,
        }
    }

    /// Only compile and runtime dependencies propagate into the transitive
    ///  closure.
    pub fn propagates(&self) -> bool {
        matches!(self, DependencyScope::Compile | DependencyScope::Runtime)
    }
}

/// One dependency declaration as it appears in the document. Version and
///  scope are kept as raw strings because they may contain `${...}`
///  placeholders that can only be substituted once the parent chain is
///  resolved.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub classifier: Option<String>,
    pub extension: Option<String>,
    pub optional: bool,
}

/// Parsed metadata of one descriptor document, before parent-chain merging
///  and property substitution.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PomDescriptor {
    pub coordinates: MavenCoordinates,
    pub parent: Option<MavenCoordinates>,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
}

impl PomDescriptor {
    /// Parses a raw descriptor document. `requested` names the coordinates
    ///  the document was fetched for and is only used in error messages.
    pub fn parse(raw: &str, requested: &MavenCoordinates) -> Result<PomDescriptor, ResolveError> {
        let malformed = |reason: String| ResolveError::MalformedDescriptor {
            coordinates: requested.clone(),
            reason,
        };

        let project: xml::Project =
            serde_xml_rs::from_str(raw).map_err(|e| malformed(e.to_string()))?;

        let parent = project.parent.as_ref().map(|p| {
            let mut coordinates = MavenCoordinates::new(&p.groupId, &p.artifactId, &p.version);
            coordinates.extension = DESCRIPTOR_EXTENSION.to_string();
            coordinates
        });

        // groupId and version may be omitted and inherited from the parent
        //  element
        let group_id = project
            .groupId
            .or_else(|| parent.as_ref().map(|p| p.group_id.0.clone()))
            .ok_or_else(|| malformed("missing groupId".to_string()))?;
        let artifact_id = project
            .artifactId
            .ok_or_else(|| malformed("missing artifactId".to_string()))?;
        let version = project
            .version
            .or_else(|| parent.as_ref().map(|p| p.version.0.clone()))
            .ok_or_else(|| malformed("missing version".to_string()))?;

        let dependencies = project
            .dependencies
            .map(|d| convert_dependencies(d.dependency))
            .unwrap_or_default();

        let dependency_management = project
            .dependencyManagement
            .and_then(|m| m.dependencies)
            .map(|d| convert_dependencies(d.dependency))
            .unwrap_or_default();

        Ok(PomDescriptor {
            coordinates: MavenCoordinates::new(&group_id, &artifact_id, &version),
            parent,
            properties: project.properties.unwrap_or_default(),
            dependencies,
            dependency_management,
        })
    }
}

fn convert_dependencies(raw: Vec<xml::Dependency>) -> Vec<PomDependency> {
    raw.into_iter()
        .map(|d| {
            let optional = match d.optional.as_deref() {
                Some("true") => true,
                Some("false") | None => false,
                Some(other) => {
                    warn!(
                        "unexpected value {:?} for optional flag of {}:{}, treating as false",
                        other, d.groupId, d.artifactId
                    );
                    false
                }
            };

            PomDependency {
                group_id: d.groupId,
                artifact_id: d.artifactId,
                version: d.version,
                scope: d.scope,
                classifier: d.classifier,
                extension: d.type_,
                optional,
            }
        })
        .collect()
}
