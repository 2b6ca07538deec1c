//! Inspect Mesh
//!
//! Loads a mesh file and prints its geometry, point attributes and, when a
//! label array is present, how many points fall into each class.

use anyhow::Result;
use clap::Parser;
use labelmesh_algorithms::label_coloring;
use labelmesh_core::{ColorTable, Drawable, LABEL_ATTRIBUTE};
use labelmesh_io::load_file;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "inspect_mesh", about = "Print a summary of a mesh file")]
struct Args {
    /// Mesh to inspect (.obj, .stl, .gltf, .glb or .vtp)
    file: PathBuf,

    /// Label attribute to summarize
    #[arg(long, default_value = LABEL_ATTRIBUTE)]
    attribute: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mesh = load_file(&args.file)?;

    println!("=== {} ===", args.file.display());
    if mesh.is_point_cloud() {
        println!("Point cloud with {} points", mesh.vertex_count());
    } else {
        println!(
            "Mesh with {} vertices and {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
    }
    let (min, max) = mesh.bounding_box();
    println!(
        "Bounds: ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
        min.x, min.y, min.z, max.x, max.y, max.z
    );
    println!("Normals: {}", if mesh.normals.is_some() { "yes" } else { "no" });

    if mesh.attributes.is_empty() {
        println!("No point attributes");
    } else {
        println!("Point attributes:");
        for array in mesh.attributes.iter() {
            let range = array
                .range()
                .map(|(lo, hi)| format!("[{}, {}]", lo, hi))
                .unwrap_or_else(|| "empty".to_string());
            let active = if mesh.active_scalars.as_deref() == Some(array.name()) {
                " (active)"
            } else {
                ""
            };
            println!(
                "  {:<20} {:?} x{} {}{}",
                array.name(),
                array.data_type(),
                array.components(),
                range,
                active
            );
        }
    }

    if mesh.attribute(&args.attribute).is_some() {
        let coloring = label_coloring(&mesh, &args.attribute, &ColorTable::segmentation())?;
        println!("Classes in '{}':", args.attribute);
        for entry in coloring.legend() {
            println!("  {:>2} {:<12} {:>8} points", entry.class, entry.name, entry.point_count);
        }
    }

    Ok(())
}
