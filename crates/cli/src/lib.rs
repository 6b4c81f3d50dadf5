mod index;
mod markers;
mod view;
mod watch;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use weavescope_api::ProjectId;
use weavescope_core::{EngineConfig, InMemoryMarkerSink, WeaveEngine};

#[derive(Parser)]
#[command(
    name = "weavescope",
    version,
    about = "Static AOP cross-reference index for Spring projects",
    long_about = "Weavescope reads XML <aop:config> and @Aspect declarations, matches their \
                  pointcuts against the project's Java types, and reports which methods each \
                  advice applies to."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the reference model once and print every advice reference
    Index {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,

        /// Print references as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Build the reference model once and print the markers it produced
    Markers {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,

        /// Only show problem markers
        #[arg(long)]
        problems: bool,
    },
    /// Keep the reference model up to date while files change
    Watch {
        /// Path to the project root directory to watch
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
    },
}

/// An engine with one project rooted at `path`.
pub(crate) struct Session {
    pub engine: WeaveEngine,
    pub markers: Arc<InMemoryMarkerSink>,
    pub project: ProjectId,
    pub root: PathBuf,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let root = path.canonicalize()?;
        let config = EngineConfig::load(&root)?;
        let markers = Arc::new(InMemoryMarkerSink::new());
        let engine = WeaveEngine::new(config, markers.clone())?;
        engine.startup();
        let project = ProjectId::new(
            root.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("project"),
        );
        engine.add_project(project.clone(), &root);
        Ok(Self {
            engine,
            markers,
            project,
            root,
        })
    }
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let to_stderr = matches!(cli.command, Commands::Watch { .. });
    let _guard = weavescope_core::logging::init_logging("cli", to_stderr);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Index { path, json } => rt.block_on(index::run(path, json)),
        Commands::Markers { path, problems } => rt.block_on(markers::run(path, problems)),
        Commands::Watch { path } => rt.block_on(watch::run(path)),
    }
}
