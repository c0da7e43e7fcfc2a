//! Command-line interface.

use crate::app::AppConfig;
use clap::{Parser, Subcommand, ValueEnum};
use shotboard_core::{Config, OrphanPolicy};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shotboard")]
#[command(about = "Organize screenshots into projects and canvases")]
#[command(version)]
pub struct Cli {
    /// State file (defaults to the local data directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Directory holding the screenshot root (defaults to downloads)
    #[arg(long, global = true, value_name = "DIR")]
    pub downloads: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record an image file as a capture of a page
    Capture {
        /// Image to record
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Page title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Page URL
        #[arg(long)]
        url: Option<String>,

        /// Target project (defaults to the current project)
        #[arg(long)]
        project: Option<String>,

        /// Target canvas (a new canvas when omitted)
        #[arg(long)]
        canvas: Option<String>,
    },

    /// Merge files found under the screenshot root into the state
    Scan,

    /// Create a project and make it current
    NewProject,

    /// Make a project current, creating it if needed
    Open {
        #[arg(value_name = "PROJECT")]
        project: String,
    },

    /// List stored and discovered projects
    Projects,

    /// Delete a canvas
    DeleteCanvas {
        #[arg(value_name = "PROJECT")]
        project: String,

        #[arg(value_name = "CANVAS")]
        canvas: String,

        /// What happens to the canvas's screenshots
        #[arg(long, value_enum, default_value_t = Orphans::Delete)]
        orphans: Orphans,
    },

    /// Keep scanning and reconciling until interrupted
    Watch {
        /// Project to present (defaults to the current project)
        #[arg(long)]
        project: Option<String>,

        /// Canvas to present (all canvases when omitted)
        #[arg(long)]
        canvas: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Orphans {
    Delete,
    Reassign,
    Retain,
}

impl From<Orphans> for OrphanPolicy {
    fn from(orphans: Orphans) -> Self {
        match orphans {
            Orphans::Delete => OrphanPolicy::DeleteScreenshots,
            Orphans::Reassign => OrphanPolicy::ReassignToFirst,
            Orphans::Retain => OrphanPolicy::Retain,
        }
    }
}

impl Cli {
    /// Layer the config file, then the environment, over the defaults.
    pub fn app_config(&self) -> Result<AppConfig, shotboard_core::StorageError> {
        let core = match &self.config {
            Some(path) => Config::load(path)?.with_overrides(|key| std::env::var(key).ok()),
            None => Config::from_env(),
        };
        Ok(AppConfig {
            state_path: self.state.clone(),
            downloads_dir: self.downloads.clone(),
            core,
        })
    }
}
