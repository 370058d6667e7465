//! # Resift CLI (`resift`)
//!
//! The `resift` binary maintains and queries a hybrid search index over
//! local file trees. It provides commands for database initialization,
//! folder indexing and reconciliation, hybrid search, chunk retrieval,
//! and a long-running watch mode.
//!
//! ## Usage
//!
//! ```bash
//! resift --config ./config/resift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resift init` | Create the SQLite database and run schema migrations |
//! | `resift index <folder>` | Index a folder tree |
//! | `resift sync <folder>` | Reconcile a folder's index with the filesystem |
//! | `resift reindex <folder>` | Queue a folder for background re-indexing |
//! | `resift search "<query>"` | Hybrid search over indexed chunks |
//! | `resift get <file>` | Retrieve a file's chunks by index range |
//! | `resift status` | Show per-folder index status |
//! | `resift disable <folder>` | Hide a folder from search |
//! | `resift enable <folder>` | Restore a folder to search and re-sync it |
//! | `resift remove <folder>` | Permanently delete a folder's index |
//! | `resift watch [root]` | Watch a tree and keep its index current |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! resift init --config ./config/resift.toml
//!
//! # Index a notes directory
//! resift index ~/notes
//!
//! # Search it
//! resift search "quarterly planning" --limit 5
//!
//! # Lean harder on exact keywords
//! resift search "error E0502" --sparse-weight 0.8
//!
//! # Keep the index current while editing
//! resift watch ~/notes
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use resift::{config, daemon, get, indexer, migrate, search, status};

/// Resift — a self-reconciling hybrid search index over local file trees.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/resift.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "resift",
    about = "Resift — a self-reconciling hybrid search index over local file trees",
    version,
    long_about = "Resift chunks and embeds documents under registered folders, keeps the \
    index consistent as files are added, edited, or deleted, and answers hybrid \
    (semantic + keyword) queries with folder-scoped filtering."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/resift.toml`. Database, chunking, embedding,
    /// and watcher settings are read from this file.
    #[arg(long, global = true, default_value = "./config/resift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (indexed_files, folder_index_status, chunks). This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Index a folder tree.
    ///
    /// Walks the folder recursively, chunks and embeds every parseable
    /// file, and registers the folder for status tracking. Unchanged
    /// files are skipped by content hash.
    Index {
        /// Folder to index.
        folder: PathBuf,

        /// Re-index every file even when its content hash is unchanged.
        #[arg(long)]
        force: bool,
    },

    /// Reconcile a folder's index with the filesystem.
    ///
    /// Removes index entries for files gone from disk, indexes new and
    /// changed files, and leaves unchanged files alone. Use this after
    /// bulk changes made while no watcher was running.
    Sync {
        /// Previously indexed folder.
        folder: PathBuf,
    },

    /// Queue a folder for background re-indexing.
    ///
    /// Marks the folder `pending`; a running `watch` daemon picks it up
    /// on its next poll. Use `index --force` to re-index inline instead.
    Reindex {
        /// Previously indexed folder.
        folder: PathBuf,
    },

    /// Search indexed chunks.
    ///
    /// Embeds the query, retrieves candidates by dense and sparse
    /// similarity, and blends the two sides by the configured weight.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Weight of the sparse (keyword) side in fusion, 0.0 to 1.0.
        /// 0.0 ranks purely by dense similarity.
        #[arg(long)]
        sparse_weight: Option<f64>,

        /// Restrict results to a folder and its subfolders. Repeatable.
        #[arg(long)]
        folder: Vec<PathBuf>,

        /// Exclude a folder and its subfolders. Repeatable.
        #[arg(long)]
        exclude_folder: Vec<PathBuf>,

        /// Skip the keyword side and rank by dense similarity alone.
        #[arg(long)]
        dense_only: bool,
    },

    /// Retrieve a file's chunks by index range.
    ///
    /// Prints chunk text with character offsets, or a single merged text
    /// with the inter-chunk overlap stripped.
    Get {
        /// Indexed file path.
        file: PathBuf,

        /// First chunk index (0-based, inclusive).
        #[arg(long)]
        start: Option<i64>,

        /// Last chunk index (inclusive).
        #[arg(long)]
        end: Option<i64>,

        /// Merge the chunks back into one text.
        #[arg(long)]
        merge: bool,
    },

    /// Show index status.
    ///
    /// Without a folder: database totals and a per-folder table. With a
    /// folder: that folder's state, counts, and last error if any.
    Status {
        /// Folder to inspect.
        folder: Option<PathBuf>,
    },

    /// Hide a folder from search without deleting its data.
    ///
    /// Chunks stay stored; searches exclude them until `enable`.
    Disable {
        /// Previously indexed folder.
        folder: PathBuf,
    },

    /// Restore a disabled folder to search and re-sync it.
    Enable {
        /// Disabled folder.
        folder: PathBuf,
    },

    /// Permanently remove a folder's index.
    ///
    /// Deletes the folder's chunks, file records, and status row. Files
    /// on disk are not touched. Requires --yes.
    Remove {
        /// Previously indexed folder.
        folder: PathBuf,

        /// Confirm the permanent deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Watch a folder tree and keep its index current.
    ///
    /// Runs the filesystem watcher and the background worker until
    /// Ctrl-C. Deletions are applied to the index immediately; creations
    /// and edits are debounced, then re-indexed in the background.
    Watch {
        /// Root to watch; defaults to `[watcher] root` from the config.
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { folder, force } => {
            indexer::run_index(&cfg, &folder, force).await?;
        }
        Commands::Sync { folder } => {
            indexer::run_sync(&cfg, &folder).await?;
        }
        Commands::Reindex { folder } => {
            indexer::run_reindex(&cfg, &folder).await?;
        }
        Commands::Search {
            query,
            limit,
            sparse_weight,
            folder,
            exclude_folder,
            dense_only,
        } => {
            search::run_search(
                &cfg,
                &query,
                limit,
                sparse_weight,
                folder,
                exclude_folder,
                dense_only,
            )
            .await?;
        }
        Commands::Get {
            file,
            start,
            end,
            merge,
        } => {
            get::run_get(&cfg, &file, start, end, merge).await?;
        }
        Commands::Status { folder } => {
            status::run_status(&cfg, folder.as_deref()).await?;
        }
        Commands::Disable { folder } => {
            indexer::run_disable(&cfg, &folder).await?;
        }
        Commands::Enable { folder } => {
            indexer::run_enable(&cfg, &folder).await?;
        }
        Commands::Remove { folder, yes } => {
            indexer::run_remove(&cfg, &folder, yes).await?;
        }
        Commands::Watch { root } => {
            daemon::run_watch(&cfg, root).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
