pub mod maven;
pub mod util;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::maven::dependencies::resolve_and_slim;
use crate::maven::resolver::PomResolver;
use crate::util::downloader::ArtifactDownloader;
use crate::util::http_repository::HttpRepository;

const DEFAULT_MVN_SERVER: &str = "https://repo1.maven.org/maven2/";

/// Resolves maven coordinates to their transitive compile-time dependency
/// closure and downloads the artifacts.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Maven server to resolve against
    #[arg(long, default_value = DEFAULT_MVN_SERVER)]
    mvn_server: String,

    /// Directory to save downloaded files
    #[arg(long)]
    output_dir: PathBuf,

    /// Only print the local paths of the resolved artifacts, do not download
    #[arg(long)]
    print_only: bool,

    /// Suppress log output
    #[arg(long)]
    quiet: bool,

    /// Coordinates to resolve, as group:artifactId:version[:classifier]
    #[arg(required = true)]
    coordinates: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let repository = HttpRepository::new(args.mvn_server.clone())
        .with_context(|| format!("not a valid repository URI: {}", args.mvn_server))?;
    let resolver = PomResolver::new(repository.clone());

    let artifacts = resolve_and_slim(&resolver, &args.coordinates)
        .await
        .context("dependency resolution failed")?;
    info!("resolved {} artifacts", artifacts.len());

    if args.print_only {
        let paths: Vec<String> = artifacts
            .iter()
            .map(|a| a.local_path(&args.output_dir).display().to_string())
            .collect();
        println!("{}", paths.join(" "));
        return Ok(());
    }

    ArtifactDownloader::new(repository, args.output_dir)
        .download_all(&artifacts)
        .await
}
