use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::USER_AGENT;
use hyper::{Body, Client, Request, Response, Uri};
use hyper_tls::HttpsConnector;
use tracing::trace;

use crate::maven::resolver::RepositoryFetcher;
use crate::util::checksum_stream::{BodyDigest, ChecksumStream};

/// HTTP access to a remote repository, all paths relative to a fixed base
///  URI.
///
/// Instances do HTTP connection caching internally, so keeping them alive
///  (and cloning instead of re-creating) has performance benefits.
#[derive(Clone)]
pub struct HttpRepository {
    client: Client<HttpsConnector<HttpConnector>>,
    base_uri: String, // with trailing '/'
}

impl HttpRepository {
    pub fn new(base_uri: String) -> anyhow::Result<HttpRepository> {
        let mut base_uri = base_uri;
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }

        // check that the base URI is valid
        Uri::try_from(base_uri.clone())?;

        Ok(HttpRepository {
            client: Client::builder().build::<_, Body>(HttpsConnector::new()),
            base_uri,
        })
    }

    async fn request(&self, path: &str) -> anyhow::Result<Response<Body>> {
        let uri = format!("{}{}", self.base_uri, path);
        let request = Request::builder()
            .method("GET")
            .uri(Uri::try_from(uri.clone())?)
            .header(USER_AGENT, "curl/7.68.0") // Maven Central returns a 403 without a user agent
            .body(Body::empty())?;

        trace!("getting {}", uri);

        let response = self.client.request(request).await?;
        if !response.status().is_success() {
            return Err(anyhow!("GET {} failed: {}", uri, response.status()));
        }
        Ok(response)
    }

    /// Fetches a small document (descriptor, checksum file) in full.
    pub async fn get_bytes(&self, path: &str) -> anyhow::Result<Bytes> {
        let response = self.request(path).await?;
        Ok(to_bytes(response.into_body()).await?)
    }

    /// Fetches a (potentially large) file as a stream, feeding every chunk
    ///  through the given digests.
    pub async fn get_stream(
        &self,
        path: &str,
        digests: Vec<Box<dyn BodyDigest>>,
    ) -> anyhow::Result<ChecksumStream> {
        let response = self.request(path).await?;
        Ok(ChecksumStream::new(response.into_body(), digests))
    }
}

#[async_trait]
impl RepositoryFetcher for HttpRepository {
    async fn fetch(&self, path: &str) -> anyhow::Result<Bytes> {
        self.get_bytes(path).await
    }
}
