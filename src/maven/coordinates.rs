use std::fmt;
use std::path::PathBuf;

use crate::maven::error::ResolveError;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
pub struct MavenGroupId(pub String);

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
pub struct MavenArtifactId(pub String);

/// Versions are opaque strings - no semantic version parsing, but the derived
///  textual ordering is available for tie-breaks.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Debug)]
pub struct MavenVersion(pub String);
impl MavenVersion {
    pub fn is_snapshot(&self) -> bool {
        self.0.ends_with("-SNAPSHOT")
    }
}

#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}

/// The (group, artifact) pair - the version-independent identity used for
///  conflict resolution.
pub type PackageKey = (MavenGroupId, MavenArtifactId);

pub const DEFAULT_EXTENSION: &str = "jar";
pub const DESCRIPTOR_EXTENSION: &str = "pom";

#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct MavenCoordinates {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: MavenVersion,
    pub classifier: MavenClassifier,
    pub extension: String, // without leading '.', e.g. "jar"
}

impl MavenCoordinates {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> MavenCoordinates {
        MavenCoordinates {
            group_id: MavenGroupId(group_id.to_string()),
            artifact_id: MavenArtifactId(artifact_id.to_string()),
            version: MavenVersion(version.to_string()),
            classifier: MavenClassifier::Unclassified,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Parses `group:artifactId:version[:classifier]`. The extension is not
    ///  part of the coordinate syntax and defaults to "jar".
    pub fn parse(text: &str) -> Result<MavenCoordinates, ResolveError> {
        let malformed = |reason: &str| ResolveError::MalformedCoordinate {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = text.split(':').collect();
        if fields.len() < 3 {
            return Err(malformed("expected group:artifactId:version[:classifier]"));
        }
        if fields.len() > 4 {
            return Err(malformed("too many ':' separated fields"));
        }
        if fields[0..3].iter().any(|f| f.is_empty()) {
            return Err(malformed("group, artifactId and version must be non-empty"));
        }

        let classifier = match fields.get(3) {
            Some(c) if !c.is_empty() => MavenClassifier::Classified(c.to_string()),
            Some(_) => return Err(malformed("classifier must be non-empty if present")),
            None => MavenClassifier::Unclassified,
        };

        Ok(MavenCoordinates {
            group_id: MavenGroupId(fields[0].to_string()),
            artifact_id: MavenArtifactId(fields[1].to_string()),
            version: MavenVersion(fields[2].to_string()),
            classifier,
            extension: DEFAULT_EXTENSION.to_string(),
        })
    }

    pub fn package_key(&self) -> PackageKey {
        (self.group_id.clone(), self.artifact_id.clone())
    }

    /// File name of the artifact: `<artifactId>-<version>[-<classifier>].<extension>`
    pub fn file_name(&self) -> String {
        let classifier_string = match &self.classifier {
            MavenClassifier::Unclassified => "".to_string(),
            MavenClassifier::Classified(c) => format!("-{}", c),
        };

        format!(
            "{}-{}{}.{}",
            self.artifact_id.0, self.version.0, classifier_string, self.extension,
        )
    }

    /// Path of the artifact relative to the repository root, i.e. starting
    ///  with something like "org/..." or "com/...".
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.0.replace('.', "/"),
            self.artifact_id.0,
            self.version.0,
            self.file_name(),
        )
    }

    /// Repository path of the descriptor (POM) document for these coordinates.
    ///  Descriptors are never classified.
    pub fn descriptor_path(&self) -> String {
        MavenCoordinates {
            classifier: MavenClassifier::Unclassified,
            extension: DESCRIPTOR_EXTENSION.to_string(),
            ..self.clone()
        }
        .repository_path()
    }

    pub fn local_path(&self, output_dir: &std::path::Path) -> PathBuf {
        output_dir.join(self.file_name())
    }
}

impl fmt::Display for MavenCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id.0, self.artifact_id.0, self.version.0
        )?;
        if let MavenClassifier::Classified(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        Ok(())
    }
}
