use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::anyhow;
use bytes::Bytes;
use futures_core::{ready, Stream};
use hyper::Body;
use pin_project_lite::pin_project;
use sha1::digest::consts::U20;
use sha1::digest::generic_array::GenericArray;
use sha1::{Digest, Sha1};
use tracing::trace;

/// A digest fed with the body's chunks and checked against an expected hash
///  once the body is drained.
pub trait BodyDigest: Send {
    fn update(&mut self, data: &Bytes);
    fn verify(&self) -> anyhow::Result<()>;
}

pub struct Md5Digest {
    context: md5::Context,
    expected: [u8; 16],
}
impl Md5Digest {
    pub fn new(expected: [u8; 16]) -> Md5Digest {
        Md5Digest {
            context: md5::Context::new(),
            expected,
        }
    }
}
impl BodyDigest for Md5Digest {
    fn update(&mut self, data: &Bytes) {
        self.context.consume(data);
    }

    fn verify(&self) -> anyhow::Result<()> {
        let actual: [u8; 16] = self.context.clone().compute().into();
        trace!("verifying MD5 digest");
        if actual == self.expected {
            Ok(())
        } else {
            Err(anyhow!(
                "MD5 mismatch: expected {}, was {}",
                hex::encode(self.expected),
                hex::encode(actual)
            ))
        }
    }
}

pub struct Sha1Digest {
    hasher: Sha1,
    expected: GenericArray<u8, U20>,
}
impl Sha1Digest {
    pub fn new(expected: [u8; 20]) -> Sha1Digest {
        Sha1Digest {
            hasher: Default::default(),
            expected: expected.into(),
        }
    }
}
impl BodyDigest for Sha1Digest {
    fn update(&mut self, data: &Bytes) {
        self.hasher.update(data);
    }

    fn verify(&self) -> anyhow::Result<()> {
        let actual = self.hasher.clone().finalize();
        trace!("verifying SHA1 digest");
        if actual == self.expected {
            Ok(())
        } else {
            Err(anyhow!(
                "SHA1 mismatch: expected {}, was {}",
                hex::encode(self.expected),
                hex::encode(actual)
            ))
        }
    }
}

pin_project! {
    /// Wraps an HTTP body so it can be consumed chunk by chunk without
    ///  materializing it, while still checking digests that need the whole
    ///  body's data.
    ///
    /// The contract is to append an error item to the stream if a digest
    ///  check fails after the last data chunk. Once an error was returned
    ///  the stream stays failed.
    pub struct ChecksumStream {
        #[pin]
        body: Body,
        digests: Vec<Box<dyn BodyDigest>>,
        failed: bool,
    }
}

impl ChecksumStream {
    pub fn new(body: Body, digests: Vec<Box<dyn BodyDigest>>) -> ChecksumStream {
        ChecksumStream {
            body,
            digests,
            failed: false,
        }
    }
}

impl Stream for ChecksumStream {
    type Item = anyhow::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(Some(Err(anyhow!("polling from failed stream"))));
        }

        let this = self.project();
        match ready!(this.body.poll_next(cx)) {
            Some(Ok(data)) => {
                for digest in this.digests.iter_mut() {
                    digest.update(&data);
                }
                Poll::Ready(Some(Ok(data)))
            }
            None => {
                // body fully drained, finalize all digests
                for digest in this.digests.iter() {
                    if let Err(e) = digest.verify() {
                        *this.failed = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                *this.failed = true;
                Poll::Ready(Some(Err(e.into())))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.body.size_hint()
    }
}

#[cfg(test)]
mod test {
    use futures::StreamExt;

    use super::*;

    async fn drain(mut stream: ChecksumStream) -> anyhow::Result<Vec<u8>> {
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(collected)
    }

    #[tokio::test]
    async fn test_matching_digests_pass_data_through() {
        let data = b"hello artifact".as_slice();
        let md5: [u8; 16] = md5::compute(data).into();
        let sha1: [u8; 20] = Sha1::digest(data).into();

        let stream = ChecksumStream::new(
            Body::from(data),
            vec![Box::new(Md5Digest::new(md5)), Box::new(Sha1Digest::new(sha1))],
        );

        assert_eq!(drain(stream).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_md5_mismatch_fails_after_last_chunk() {
        let stream = ChecksumStream::new(
            Body::from(b"hello artifact".as_slice()),
            vec![Box::new(Md5Digest::new([0; 16]))],
        );

        assert!(drain(stream).await.is_err());
    }

    #[tokio::test]
    async fn test_sha1_mismatch_fails_after_last_chunk() {
        let stream = ChecksumStream::new(
            Body::from(b"hello artifact".as_slice()),
            vec![Box::new(Sha1Digest::new([0; 20]))],
        );

        assert!(drain(stream).await.is_err());
    }

    #[tokio::test]
    async fn test_no_digests_is_pass_through() {
        let stream = ChecksumStream::new(Body::from(b"data".as_slice()), vec![]);
        assert_eq!(drain(stream).await.unwrap(), b"data");
    }
}
