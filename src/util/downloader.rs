use std::path::{Path, PathBuf};

use anyhow::Context as _;
use futures::StreamExt;
use hex::FromHex;
use tokio::fs::{create_dir_all, remove_file, rename, try_exists, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

use crate::maven::coordinates::MavenCoordinates;
use crate::util::checksum_stream::{BodyDigest, ChecksumStream, Md5Digest, Sha1Digest};
use crate::util::http_repository::HttpRepository;

/// Downloads the artifact files for a resolved coordinate list into an
///  output directory. Downloads are gated on the remote MD5 checksum: a
///  local file whose MD5 already matches is not fetched again.
pub struct ArtifactDownloader {
    repository: HttpRepository,
    output_dir: PathBuf,
}

impl ArtifactDownloader {
    pub fn new(repository: HttpRepository, output_dir: PathBuf) -> ArtifactDownloader {
        ArtifactDownloader {
            repository,
            output_dir,
        }
    }

    pub async fn download_all(&self, artifacts: &[MavenCoordinates]) -> anyhow::Result<()> {
        create_dir_all(&self.output_dir).await?;

        for coordinates in artifacts {
            self.download_one(coordinates)
                .await
                .with_context(|| format!("failed to download {}", coordinates))?;
        }
        Ok(())
    }

    async fn download_one(&self, coordinates: &MavenCoordinates) -> anyhow::Result<()> {
        let remote_path = coordinates.repository_path();
        let local_path = coordinates.local_path(&self.output_dir);

        let expected_md5 = self.fetch_checksum::<16>(&remote_path, "md5").await;
        let expected_sha1 = self.fetch_checksum::<20>(&remote_path, "sha1").await;

        if let Some(expected) = expected_md5 {
            if local_md5(&local_path).await? == Some(expected) {
                info!("{} is already up to date", coordinates);
                return Ok(());
            }
        }

        let mut digests: Vec<Box<dyn BodyDigest>> = Vec::new();
        if let Some(expected) = expected_md5 {
            digests.push(Box::new(Md5Digest::new(expected)));
        }
        if let Some(expected) = expected_sha1 {
            digests.push(Box::new(Sha1Digest::new(expected)));
        }
        if digests.is_empty() {
            warn!("no remote checksum for {}, downloading unverified", coordinates);
        }

        let mut stream = self.repository.get_stream(&remote_path, digests).await?;

        // download to a partial file, rename only once the digests checked out
        let part_path = local_path.with_file_name(format!("{}.part", coordinates.file_name()));
        match write_stream(&mut stream, &part_path).await {
            Ok(()) => {
                rename(&part_path, &local_path).await?;
                info!("downloaded {} to {}", coordinates, local_path.display());
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = remove_file(&part_path).await {
                    warn!(
                        "error cleaning up {} after failed download: {}",
                        part_path.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// The expected digest published next to the artifact, e.g. in the
    ///  sibling ".md5" file. A missing or unparseable checksum file is not
    ///  an error, just an unverified download.
    async fn fetch_checksum<const N: usize>(&self, path: &str, extension: &str) -> Option<[u8; N]>
    where
        [u8; N]: FromHex,
    {
        let checksum_path = format!("{}.{}", path, extension);
        let raw = match self.repository.get_bytes(&checksum_path).await {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        let text = String::from_utf8_lossy(&raw);
        let parsed = checksum_token(&text).and_then(|t| <[u8; N]>::from_hex(t).ok());
        if parsed.is_none() {
            warn!("unparseable checksum document at {}", checksum_path);
        }
        parsed
    }
}

/// Checksum files may contain `<hash>  <filename>`; the hash is the first
///  token.
fn checksum_token(document: &str) -> Option<&str> {
    document.split_whitespace().next()
}

async fn write_stream(stream: &mut ChecksumStream, path: &Path) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;

    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

async fn local_md5(path: &Path) -> anyhow::Result<Option<[u8; 16]>> {
    if !try_exists(path).await? {
        return Ok(None);
    }

    let mut file = OpenOptions::new().read(true).open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(Some(context.compute().into()))
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::bare_hash("d41d8cd98f00b204e9800998ecf8427e", Some("d41d8cd98f00b204e9800998ecf8427e"))]
    #[case::hash_and_filename(
        "d41d8cd98f00b204e9800998ecf8427e  foo-1.0.jar",
        Some("d41d8cd98f00b204e9800998ecf8427e")
    )]
    #[case::trailing_newline("abc123\n", Some("abc123"))]
    #[case::empty("", None)]
    #[case::whitespace_only(" \n\t", None)]
    fn test_checksum_token(#[case] document: &str, #[case] expected: Option<&str>) {
        assert_eq!(checksum_token(document), expected);
    }

    #[tokio::test]
    async fn test_local_md5_missing_file() {
        let path = std::env::temp_dir().join("mvnfetch-test-does-not-exist.jar");
        assert_eq!(local_md5(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_md5_of_existing_file() {
        let path = std::env::temp_dir().join(format!("mvnfetch-test-{}.bin", std::process::id()));
        tokio::fs::write(&path, b"some artifact bytes").await.unwrap();

        let actual = local_md5(&path).await.unwrap();
        let expected: [u8; 16] = md5::compute(b"some artifact bytes").into();
        assert_eq!(actual, Some(expected));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
