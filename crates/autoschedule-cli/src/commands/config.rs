use std::path::{Path, PathBuf};

use autoschedule_core::Config;
use clap::{Args, Subcommand};

use crate::common::CliResult;

#[derive(Args)]
pub struct ConfigArgs {
    /// Config file (defaults to ~/.config/autoschedule/config.toml)
    #[arg(long, global = true)]
    file: Option<PathBuf>,
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Check the configuration and exit non-zero if it is invalid
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "settings.work_hour_start")
        key: String,
    },
    /// Set a config value
    Set {
        /// Dot-separated key
        key: String,
        /// New value
        value: String,
    },
}

fn config_path(file: Option<&Path>) -> CliResult<PathBuf> {
    match file {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::path()?),
    }
}

fn load(file: Option<&Path>) -> CliResult<Config> {
    let path = config_path(file)?;
    if path.exists() {
        Ok(Config::load_from(&path)?)
    } else {
        Ok(Config::default())
    }
}

pub fn run(args: ConfigArgs) -> CliResult<()> {
    let file = args.file.as_deref();
    match args.action {
        ConfigAction::Show => {
            let config = load(file)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate => {
            load(file)?.validate()?;
            println!("ok");
        }
        ConfigAction::Init { force } => {
            let path = config_path(file)?;
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            Config::default().save_to(&path)?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Get { key } => {
            let config = load(file)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = load(file)?;
            config.set(&key, &value)?;
            config.save_to(&config_path(file)?)?;
            println!("ok");
        }
    }
    Ok(())
}
