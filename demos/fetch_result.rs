//! Fetch Result
//!
//! Uploads a mesh to the segmentation service, downloads the refined result
//! and saves it as `out_downsampled_refined.vtp`. With `--skip-upload` only
//! the last result held by the service is fetched.

use anyhow::{Context, Result};
use clap::Parser;
use labelmesh_io::{Format, PredictionClient, RemoteConfig};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fetch_result", about = "Segment a mesh on the prediction service")]
struct Args {
    /// Mesh to upload
    file: Option<PathBuf>,

    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Directory the result is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Only download the current result
    #[arg(long)]
    skip_upload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let client = PredictionClient::new(RemoteConfig {
        base_url: args.server.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
    })?;

    let result = match (&args.file, args.skip_upload) {
        (_, true) => client.fetch_result().await?,
        (Some(path), false) => {
            // Reject unsupported files before uploading them
            Format::from_path(path)?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mesh".to_string());
            client.segment_and_fetch(&name, bytes).await?
        }
        (None, false) => anyhow::bail!("Pass a mesh file or --skip-upload"),
    };

    let mesh = result.load()?;
    info!(
        "Result holds {} points and {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );

    let path = result
        .save_to_dir(&args.out_dir)
        .with_context(|| format!("Failed to save into {}", args.out_dir.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}
