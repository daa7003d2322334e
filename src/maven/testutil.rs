use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;

use crate::maven::coordinates::MavenCoordinates;
use crate::maven::resolver::RepositoryFetcher;

/// In-memory repository serving canned documents - the test stand-in for the
///  HTTP transport.
pub struct InMemoryRepo {
    documents: HashMap<String, String>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryRepo {
    pub fn new() -> InMemoryRepo {
        InMemoryRepo {
            documents: HashMap::new(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn put_raw(&mut self, path: &str, document: &str) {
        self.documents.insert(path.to_string(), document.to_string());
    }

    /// Stores a descriptor for `coordinates` ("group:artifact:version") with
    ///  `body` spliced into the project element verbatim.
    pub fn put_pom(&mut self, coordinates: &str, body: &str) {
        let coordinates = MavenCoordinates::parse(coordinates).unwrap();
        let document = format!(
            "<project>\
                <groupId>{}</groupId>\
                <artifactId>{}</artifactId>\
                <version>{}</version>\
                {}\
            </project>",
            coordinates.group_id.0, coordinates.artifact_id.0, coordinates.version.0, body,
        );
        self.put_raw(&coordinates.descriptor_path(), &document);
    }

    pub fn put_pom_with_parent(&mut self, coordinates: &str, parent: &str, body: &str) {
        let parent = MavenCoordinates::parse(parent).unwrap();
        let parent_element = format!(
            "<parent>\
                <groupId>{}</groupId>\
                <artifactId>{}</artifactId>\
                <version>{}</version>\
            </parent>",
            parent.group_id.0, parent.artifact_id.0, parent.version.0,
        );
        self.put_pom(coordinates, &format!("{}{}", parent_element, body));
    }

    /// Shared counter of fetch calls, for cache assertions.
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl RepositoryFetcher for InMemoryRepo {
    async fn fetch(&self, path: &str) -> anyhow::Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.documents.get(path) {
            Some(document) => Ok(Bytes::from(document.clone())),
            None => Err(anyhow!("404: {}", path)),
        }
    }
}

/// Wraps `<dependency>` entries into a `<dependencies>` block.
pub fn deps(entries: &str) -> String {
    format!("<dependencies>{}</dependencies>", entries)
}

/// One `<dependency>` entry; combine with [`deps`].
pub fn dependency(group: &str, artifact: &str, version: Option<&str>, scope: Option<&str>) -> String {
    let version_element = version
        .map(|v| format!("<version>{}</version>", v))
        .unwrap_or_default();
    let scope_element = scope
        .map(|s| format!("<scope>{}</scope>", s))
        .unwrap_or_default();

    format!(
        "<dependency>\
            <groupId>{}</groupId>\
            <artifactId>{}</artifactId>\
            {}{}\
        </dependency>",
        group, artifact, version_element, scope_element,
    )
}

pub fn optional_dependency(group: &str, artifact: &str, version: &str) -> String {
    format!(
        "<dependency>\
            <groupId>{}</groupId>\
            <artifactId>{}</artifactId>\
            <version>{}</version>\
            <optional>true</optional>\
        </dependency>",
        group, artifact, version,
    )
}

/// A full `<dependencies>` block of plain compile-scope dependencies.
pub fn compile_deps(entries: &[(&str, &str, &str)]) -> String {
    let entries: String = entries
        .iter()
        .map(|(group, artifact, version)| dependency(group, artifact, Some(version), None))
        .collect();
    deps(&entries)
}

pub fn managed_pom_body(entries: &[(&str, &str, &str, Option<&str>)]) -> String {
    let entries: String = entries
        .iter()
        .map(|(group, artifact, version, scope)| {
            let scope_element = scope
                .map(|s| format!("<scope>{}</scope>", s))
                .unwrap_or_default();
            format!(
                "<dependency>\
                    <groupId>{}</groupId>\
                    <artifactId>{}</artifactId>\
                    <version>{}</version>\
                    {}\
                </dependency>",
                group, artifact, version, scope_element,
            )
        })
        .collect();

    format!(
        "<dependencyManagement><dependencies>{}</dependencies></dependencyManagement>",
        entries,
    )
}
