pub mod checksum_stream;
pub mod downloader;
pub mod http_repository;
