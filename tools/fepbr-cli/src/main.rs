//! fepbr - FePBR scene porter
//!
//! Exports the selected meshes of a scene file as patched glTF documents
//! with a placement manifest, and rewrites, imports, arranges or hulls
//! scene objects.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use fepbr_cli::commands::{self, ExportRequest, PathOverrides};
use fepbr_core::arrange::{ArrangeOptions, DEFAULT_SPACING};
use fepbr_core::hull::HullOptions;
use fepbr_core::import::ImportKind;
use fepbr_shared::constants::DEFAULT_HULL_SUFFIX;

#[derive(Parser)]
#[command(name = "fepbr")]
#[command(about = "FePBR scene porter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// glTF / GLB documents
    Document,
    /// FBX meshes
    Mesh,
}

impl From<KindArg> for ImportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Document => ImportKind::Document,
            KindArg::Mesh => ImportKind::Mesh,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export selected meshes and write the manifest
    Export {
        /// Scene file
        scene: PathBuf,

        /// Path to export.toml
        #[arg(short, long, default_value = "export.toml")]
        config: PathBuf,

        /// Asset source root (overrides config)
        #[arg(long)]
        asset_source: Option<PathBuf>,

        /// Destination for linked meshes and textures (overrides config)
        #[arg(long)]
        asset_destination: Option<PathBuf>,

        /// Destination for local meshes and the manifest (overrides config)
        #[arg(long)]
        scene_destination: Option<PathBuf>,

        /// Objects to export (default: the scene's selection)
        #[arg(short, long = "object")]
        objects: Vec<String>,

        /// Do not write any images
        #[arg(long)]
        no_images: bool,
    },

    /// Validate export settings without exporting
    Check {
        /// Path to export.toml
        #[arg(default_value = "export.toml")]
        config: PathBuf,
    },

    /// Replace standard shading nodes with the FePBR group
    Rewrite {
        scene: PathBuf,

        /// Template material file (JSON)
        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long = "object")]
        objects: Vec<String>,
    },

    /// Import glTF/GLB (or FBX) files into a scene
    Import {
        scene: PathBuf,

        /// Files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value = "document")]
        kind: KindArg,

        /// Template material file; materials are only copied without it
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// Lay selected meshes out on a grid
    Arrange {
        scene: PathBuf,

        /// Gap between objects
        #[arg(short, long, default_value_t = DEFAULT_SPACING)]
        spacing: f32,

        /// Objects per row (0 = square grid)
        #[arg(short, long, default_value_t = 0)]
        columns: u32,

        #[arg(short, long = "object")]
        objects: Vec<String>,
    },

    /// Create convex collision hulls for selected meshes
    Hull {
        scene: PathBuf,

        /// Decimate ratio applied after the hull (1.0 = none)
        #[arg(short, long, default_value_t = 1.0)]
        ratio: f32,

        /// Name suffix of the new objects
        #[arg(long, default_value = DEFAULT_HULL_SUFFIX)]
        suffix: String,

        #[arg(short, long = "object")]
        objects: Vec<String>,
    },

    /// List mesh objects in a scene
    List {
        scene: PathBuf,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            config,
            asset_source,
            asset_destination,
            scene_destination,
            objects,
            no_images,
        } => {
            let settings = commands::load_settings(
                &config,
                PathOverrides {
                    asset_source,
                    asset_destination,
                    scene_destination,
                },
            )?;
            let summary = commands::export(ExportRequest {
                scene: &scene,
                settings,
                objects: &objects,
                images: !no_images,
            })?;
            if summary.failed > 0 {
                tracing::warn!("{} instance(s) failed to export", summary.failed);
            }
            if let Some(path) = summary.manifest_path {
                tracing::info!("Manifest: {}", path.display());
            }
        }

        Commands::Check { config } => {
            tracing::info!("Checking {:?}", config);
            let settings = commands::load_settings(&config, PathOverrides::default())?;
            for (label, value) in commands::check(&settings)? {
                tracing::info!("  {label}: {value}");
            }
            tracing::info!("Settings are valid!");
        }

        Commands::Rewrite {
            scene,
            template,
            objects,
        } => {
            let rewritten = commands::rewrite(&scene, &template, &objects)?;
            tracing::info!("Rewrote {rewritten} material(s)");
        }

        Commands::Import {
            scene,
            files,
            kind,
            template,
        } => {
            let summary = commands::import(&scene, template.as_deref(), &files, kind.into())?;
            tracing::info!(
                "Imported {}/{} file(s), {} material(s) rewritten",
                summary.imported,
                summary.requested,
                summary.rewritten
            );
            if summary.failed > 0 {
                anyhow::bail!("{} file(s) failed to import", summary.failed);
            }
        }

        Commands::Arrange {
            scene,
            spacing,
            columns,
            objects,
        } => {
            commands::arrange(&scene, ArrangeOptions { spacing, columns }, &objects)?;
            tracing::info!("Done!");
        }

        Commands::Hull {
            scene,
            ratio,
            suffix,
            objects,
        } => {
            let options = HullOptions {
                decimate_ratio: ratio,
                suffix,
                ..Default::default()
            };
            let created = commands::hull(&scene, &options, &objects)?;
            tracing::info!("Created {created} hull(s)");
        }

        Commands::List { scene, output } => {
            if let Some(json) = commands::list(&scene, output.as_deref())? {
                println!("{json}");
            }
        }
    }

    Ok(())
}
