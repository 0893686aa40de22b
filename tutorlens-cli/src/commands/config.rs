//! Inspect the layered engine configuration

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective engine configuration after all layers merge
    Show {
        /// Extra config file applied after user and project config
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the config layers in precedence order
    Path {
        /// Extra config file applied after user and project config
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show { config } => {
            let engine_config = ConfigLoader::load(config.as_deref())?;
            print!("{}", engine_config.to_toml_string()?);
        }
        ConfigCommands::Path { config } => {
            print!("{}", render_layers(&ConfigLoader::layer_paths(config.as_deref())));
        }
    }
    Ok(())
}

/// One line per layer, lowest precedence first, marking files that exist.
fn render_layers(paths: &[PathBuf]) -> String {
    let mut out = String::from("defaults (built in)\n");
    for path in paths {
        let _ = writeln!(out, "{} ({})", path.display(), layer_status(path));
    }
    out
}

fn layer_status(path: &Path) -> &'static str {
    if path.is_file() { "found" } else { "missing" }
}
