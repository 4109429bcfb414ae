use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use savequill::config::Config;
use savequill::document::tree::NodeId;
use savequill::editor::session::Session;
use savequill::file::loader::list_save_files;
use savequill::ui::tree_view::render_text;

/// SaveQuill - A structural editor for serialized save files
#[derive(Parser)]
#[command(name = "savequill")]
#[command(version)]
#[command(about = "A structural editor for serialized save files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the save files in a directory (default: the configured save dir)
    List {
        dir: Option<PathBuf>,
    },
    /// Print a save as a tree
    Show {
        file: PathBuf,
        /// Show declared types instead of values
        #[arg(long)]
        types: bool,
        /// Only show rows whose name or value contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Set the value of a scalar node
    Set {
        #[command(flatten)]
        target: Target,
        value: String,
    },
    /// Rename the key of a map entry
    Rename {
        #[command(flatten)]
        target: Target,
        key: String,
    },
    /// Append a default element to a list, map or set
    Add {
        #[command(flatten)]
        target: Target,
    },
    /// Remove an element from its list, map or set
    Remove {
        #[command(flatten)]
        target: Target,
    },
    /// Reset a node to the default value of its type
    Reset {
        #[command(flatten)]
        target: Target,
    },
}

/// A node in a save file, and where to write the result.
#[derive(Args)]
struct Target {
    file: PathBuf,
    /// Node path, `/`-separated names from the root (e.g. `inventory/2/count`)
    path: String,
    /// Write to this file instead of saving in place
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::List { dir } => list(&config, dir),
        Commands::Show {
            file,
            types,
            filter,
        } => show(config, file, types, filter.as_deref()),
        Commands::Set { target, value } => edit(config, target, |session, id| {
            session.edit_value(id, &value).map(|_| ())
        }),
        Commands::Rename { target, key } => edit(config, target, |session, id| {
            session.rename_key(id, &key)
        }),
        Commands::Add { target } => edit(config, target, |session, id| {
            session.add_element(id).map(|_| ())
        }),
        Commands::Remove { target } => edit(config, target, |session, id| {
            session.remove_element(id)
        }),
        Commands::Reset { target } => edit(config, target, |session, id| {
            session.reset_to_default(id)
        }),
    }
}

fn list(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.save_dir.clone());
    let saves = list_save_files(&dir, &config.extension)?;
    if saves.is_empty() {
        println!("No .{} files in {}", config.extension, dir.display());
    }
    for path in saves {
        println!("{}", path.display());
    }
    Ok(())
}

fn show(mut config: Config, file: PathBuf, types: bool, filter: Option<&str>) -> Result<()> {
    if types {
        config.show_values = false;
    }
    let mut session = Session::new(config);
    session
        .load(&file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let rows = session.render_rows_matching(filter.unwrap_or_default())?;
    print!("{}", render_text(&rows));
    if session.state().is_some_and(|s| s.is_truncated()) {
        eprintln!("Warning: the save is too large to show completely");
    }
    Ok(())
}

fn edit<F>(config: Config, target: Target, operation: F) -> Result<()>
where
    F: FnOnce(&mut Session, NodeId) -> Result<(), savequill::error::SaveError>,
{
    let mut session = Session::new(config);
    session
        .load(&target.file)
        .with_context(|| format!("Failed to load {}", target.file.display()))?;

    let Some(id) = session.find_by_path(&target.path) else {
        bail!("No node at path '{}'", target.path);
    };
    operation(&mut session, id).with_context(|| format!("Failed to edit '{}'", target.path))?;

    match &target.output {
        Some(output) => session
            .save_as(output)
            .with_context(|| format!("Failed to save {}", output.display()))?,
        None => session
            .save()
            .with_context(|| format!("Failed to save {}", target.file.display()))?,
    }
    Ok(())
}
