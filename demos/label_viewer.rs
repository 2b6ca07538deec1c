//! Label Viewer
//!
//! Opens a mesh in the interactive viewer and colors it by its label array.
//! With `--headless` the same pipeline runs against a recording render
//! target instead of a window, which is handy on machines without a GPU.
//!
//! ```text
//! cargo run --bin label_viewer -- teeth.vtp
//! cargo run --bin label_viewer -- scan.obj --predict --server http://10.0.0.5:8000
//! cargo run --bin label_viewer -- teeth.vtp --headless
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use labelmesh_core::{ColorTable, LABEL_ATTRIBUTE};
use labelmesh_gpu::RecordingTarget;
use labelmesh_io::{load_async, Format, PredictionClient, RemoteConfig};
use labelmesh_visualization::{InteractiveViewer, RenderSession, ViewerConfig};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "label_viewer", about = "View a mesh colored by its per-point labels")]
struct Args {
    /// Mesh to open (.obj, .stl, .gltf, .glb or .vtp)
    file: Option<PathBuf>,

    /// Base URL of the prediction service
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Point attribute used for coloring
    #[arg(long, default_value = LABEL_ATTRIBUTE)]
    attribute: String,

    /// Request timeout for the prediction service, in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Directory the segmentation result is saved to
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Run the pipeline without opening a window
    #[arg(long)]
    headless: bool,

    /// Ask the prediction service for labels before coloring (headless only)
    #[arg(long)]
    predict: bool,
}

impl Args {
    fn remote(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.server.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.headless {
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(run_headless(&args));
    }

    println!("Controls:");
    println!("  O: Open a mesh");
    println!("  Left drag: Orbit (M toggles pan), right drag: Pan, wheel: Zoom");
    println!("  R: Reset camera, F: Frame mesh");
    println!("  C: Color by '{}'", args.attribute);
    println!("  P: Predict labels, S: Segment on the server, D: Save the result");
    println!("  Esc: Quit");

    let config = ViewerConfig {
        remote: args.remote(),
        color_attribute: args.attribute.clone(),
        download_dir: args.download_dir.clone(),
        ..ViewerConfig::default()
    };
    InteractiveViewer::new(config).run(args.file.clone())?;
    Ok(())
}

async fn run_headless(args: &Args) -> Result<()> {
    let Some(path) = &args.file else {
        bail!("--headless needs a mesh file");
    };
    let format = Format::from_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut session = RenderSession::new(RecordingTarget::default());
    let ticket = session.begin_load()?;
    let result = load_async(bytes.clone(), format).await;
    session.finish_load(ticket, result)?;
    session.frame_mesh();

    if args.predict {
        let client = PredictionClient::new(args.remote())?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh".to_string());
        let labels = client.predict_labels(&name, bytes).await?;
        session.attach_labels(ticket, &labels)?;
    }

    session.recolor(&args.attribute, &ColorTable::segmentation())?;
    session.render()?;

    let frame = session
        .scene()
        .target()
        .last_frame()
        .context("No frame was recorded")?;
    info!(
        "Rendered {} vertices ({} elements)",
        frame.vertex_count, frame.element_count
    );

    if let Some(coloring) = session.coloring() {
        println!("Classes in '{}':", coloring.attribute());
        for entry in coloring.legend() {
            let [r, g, b] = entry.color;
            println!(
                "  {:>2} {:<12} #{:02x}{:02x}{:02x} {:>8} points",
                entry.class, entry.name, r, g, b, entry.point_count
            );
        }
    }

    session.dispose()?;
    Ok(())
}
