//! # Saorsa Sign Demo
//!
//! Command-line host for the Saorsa Sign viewer.
//!
//! Loads a document description (a JSON list of page sizes), replays a JSON
//! script of field edits, navigation and pointer gestures against a
//! [`sign_viewer::DocumentController`] and reports the resulting field list
//! together with every event the viewer published.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p sign-demo -- contract.json --script place-signature.json --json
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `DemoConfig` - Paths and viewer overrides derived from the arguments
//! - `Command` - One scripted step
//! - `run` - Replays a script and builds a `Report`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod script;

pub use script::{run, Command, PrintedJob, Report};

use std::path::{Path, PathBuf};

use clap::Parser;
use sign_core::{SignError, ViewMode, ViewerConfig};
use sign_viewer::{DocumentSource, ViewerError};
use thiserror::Error;

/// Result type for demo operations.
pub type DemoResult<T> = Result<T, DemoError>;

/// Errors raised while preparing or replaying a script.
#[derive(Debug, Error)]
pub enum DemoError {
    /// A file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A script file is not valid JSON for the command format.
    #[error("Invalid script {}: {source}", path.display())]
    Script {
        /// Script file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration or field model error.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Viewer error.
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

/// Command-line arguments for sign-demo.
#[derive(Debug, Clone, Parser)]
#[command(name = "sign-demo")]
#[command(about = "Replay field placement scripts against a document")]
#[command(version)]
pub struct CliArgs {
    /// Document description: JSON of the form {"pages": [[width, height], ...]}
    pub document: PathBuf,

    /// Script of commands to replay (JSON array)
    #[arg(long, env = "SIGN_DEMO_SCRIPT")]
    pub script: Option<PathBuf>,

    /// Viewer configuration file (JSON, camelCase keys)
    #[arg(long, env = "SIGN_DEMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// View mode: scroll or single
    #[arg(long, default_value = "scroll")]
    pub mode: ViewMode,

    /// Viewport width in pixels
    #[arg(long, default_value = "800")]
    pub width: f64,

    /// Viewport height in pixels
    #[arg(long, default_value = "600")]
    pub height: f64,

    /// Initial scale
    #[arg(long)]
    pub scale: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Demo configuration.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Document description file.
    pub document: PathBuf,
    /// Script file, if any.
    pub script: Option<PathBuf>,
    /// Viewer configuration file, if any.
    pub config_path: Option<PathBuf>,
    /// View mode to start in.
    pub mode: ViewMode,
    /// Viewport width in pixels.
    pub width: f64,
    /// Viewport height in pixels.
    pub height: f64,
    /// Initial scale override.
    pub scale: Option<f64>,
    /// Emit JSON instead of a text summary.
    pub json: bool,
}

impl From<CliArgs> for DemoConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            document: args.document,
            script: args.script,
            config_path: args.config,
            mode: args.mode,
            width: args.width,
            height: args.height,
            scale: args.scale,
            json: args.json,
        }
    }
}

impl DemoConfig {
    /// Build the viewer configuration: file values first, then CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the result is invalid.
    pub async fn viewer_config(&self) -> DemoResult<ViewerConfig> {
        let mut config = match &self.config_path {
            Some(path) => ViewerConfig::from_json(&read_to_string(path).await?)?,
            None => ViewerConfig::default(),
        };
        config.default_view_mode = self.mode;
        config.viewport_width = self.width;
        config.viewport_height = self.height;
        if let Some(scale) = self.scale {
            config.initial_scale = scale;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load the script, or an empty one if none was given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn commands(&self) -> DemoResult<Vec<Command>> {
        let Some(path) = &self.script else {
            return Ok(Vec::new());
        };
        let raw = read_to_string(path).await?;
        serde_json::from_str(&raw).map_err(|source| DemoError::Script {
            path: path.clone(),
            source,
        })
    }

    /// Document source for the description file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved.
    pub async fn document_source(&self) -> DemoResult<DocumentSource> {
        let path = tokio::fs::canonicalize(&self.document)
            .await
            .map_err(|source| DemoError::Io {
                path: self.document.clone(),
                source,
            })?;
        Ok(DocumentSource::from_path(&path))
    }
}

async fn read_to_string(path: &Path) -> DemoResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DemoError::Io {
            path: path.to_path_buf(),
            source,
        })
}
