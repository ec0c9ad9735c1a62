//! `qtask` command-line front end.
//!
//! # Responsibility
//! - Resolve data directory and config, then open the SQLite-backed store.
//! - Map each subcommand onto one `TaskManager` operation.
//! - Keep all task invariants in `qtask_core`; this crate only renders.

mod render;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use qtask_core::config::CONFIG_FILE_NAME;
use qtask_core::{
    export_file_name, init_from_config, open_db, Category, KeyValueStore, Priority, QTaskConfig,
    SortKey, SortOrder, SqliteKeyValueStore, StatusFilter, TaskFilter, TaskId, TaskManager,
    TaskPatch,
};
use std::path::{Path, PathBuf};

/// QTask - a small local task manager
#[derive(Parser, Debug)]
#[command(name = "qtask")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the database and config (defaults to the platform data dir)
    #[arg(long, global = true, env = "QTASK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to <data-dir>/qtask.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task
    Add {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Personal, Work, Urgent, Education or Health
        #[arg(short, long, default_value = "Personal")]
        category: String,
    },

    /// List tasks with optional filters and sorting
    List(ListArgs),

    /// Show one task in detail
    Show { id: String },

    /// Change fields of a task
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Mark a task completed
    Done { id: String },

    /// Mark a task pending again
    Undone { id: String },

    /// Flip a task's completion state
    Toggle { id: String },

    /// Append a pending copy of a task
    Duplicate { id: String },

    /// Remove a task
    Delete { id: String },

    /// Case-insensitive search over title and description
    Search { query: String },

    /// Print aggregate statistics as JSON
    Stats,

    /// List categories currently in use
    Categories,

    /// Remove every completed task
    ClearCompleted,

    /// Remove every task
    ClearAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Write all tasks to a JSON backup file
    Export {
        /// Output file (defaults to <prefix>-YYYY-MM-DD.json in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append tasks from a JSON backup file
    Import { file: PathBuf },

    /// Check collection integrity
    Validate,

    /// Print diagnostic info as JSON
    Info,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    priority: Option<String>,

    /// completed or pending
    #[arg(long)]
    status: Option<String>,

    /// priority, title, category, completed or created
    #[arg(long, default_value = "created")]
    sort: String,

    /// asc or desc
    #[arg(long, default_value = "desc")]
    order: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));
    let config = QTaskConfig::load_with_env(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if let Err(err) = init_from_config(&config.logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let db_path = config.db_path(&data_dir);
    let conn = open_db(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let store = SqliteKeyValueStore::try_new(&conn)?;
    let mut manager = TaskManager::with_namespace_key(store, config.storage.namespace_key.clone());
    if let Some(err) = manager.load_error() {
        eprintln!("warning: saved tasks could not be loaded, starting empty: {err}");
    }

    run(cli.command, &mut manager, &config)?;

    if let Some(err) = manager.last_persistence_error() {
        bail!("changes were applied but not saved: {err}");
    }
    Ok(())
}

fn run<S: KeyValueStore>(
    command: Command,
    manager: &mut TaskManager<S>,
    config: &QTaskConfig,
) -> Result<()> {
    match command {
        Command::Add {
            title,
            description,
            priority,
            category,
        } => {
            let task = manager.add_task(
                &title,
                &description,
                parse_priority(&priority)?,
                parse_category(&category)?,
            )?;
            println!("Added {}", task.id());
        }
        Command::List(args) => {
            let filter = build_filter(&args)?;
            let tasks = manager.get_filtered_and_sorted(
                &filter,
                SortKey::from(args.sort.as_str()),
                SortOrder::from(args.order.as_str()),
            );
            render::print_list(&tasks);
        }
        Command::Show { id } => {
            let id = TaskId::from(id);
            let task = manager
                .get_by_id(&id)
                .ok_or_else(|| anyhow!("Task not found: {id}"))?;
            render::print_detail(task);
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            category,
        } => {
            let mut patch = TaskPatch::new();
            if let Some(title) = title {
                patch = patch.title(title);
            }
            if let Some(description) = description {
                patch = patch.description(description);
            }
            if let Some(priority) = priority {
                patch = patch.priority(parse_priority(&priority)?);
            }
            if let Some(category) = category {
                patch = patch.category(parse_category(&category)?);
            }
            if patch.is_empty() {
                bail!("nothing to change; pass at least one of --title, --description, --priority, --category");
            }
            let task = manager.update_task(&TaskId::from(id), &patch)?;
            render::print_line(&task);
        }
        Command::Done { id } => render::print_line(&manager.complete_task(&TaskId::from(id))?),
        Command::Undone { id } => {
            render::print_line(&manager.uncomplete_task(&TaskId::from(id))?)
        }
        Command::Toggle { id } => {
            render::print_line(&manager.toggle_completion(&TaskId::from(id))?)
        }
        Command::Duplicate { id } => {
            let copy = manager.duplicate_task(&TaskId::from(id))?;
            println!("Added {}", copy.id());
        }
        Command::Delete { id } => {
            let removed = manager.delete_task(&TaskId::from(id))?;
            println!("Deleted {}", removed.id());
        }
        Command::Search { query } => render::print_list(&manager.search(&query)),
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&manager.statistics())?);
        }
        Command::Categories => {
            for category in manager.categories() {
                println!("{} {}", category.emoji(), category);
            }
        }
        Command::ClearCompleted => {
            println!("Removed {} completed task(s)", manager.clear_completed());
        }
        Command::ClearAll { yes } => {
            if !yes {
                bail!("refusing to delete every task without --yes");
            }
            println!("Removed {} task(s)", manager.clear_all());
        }
        Command::Export { output } => {
            let payload = manager.export()?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(export_file_name(
                    &config.export.file_prefix,
                    chrono::Local::now().date_naive(),
                ))
            });
            std::fs::write(&path, payload)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Exported {} task(s) to {}", manager.len(), path.display());
        }
        Command::Import { file } => {
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            println!("Imported {} task(s)", manager.import(&payload)?);
        }
        Command::Validate => {
            let report = manager.validate();
            if report.is_valid() {
                println!("OK: {} task(s) valid", manager.len());
            } else {
                for message in &report.errors {
                    println!("{message}");
                }
                bail!("{} problem(s) found", report.errors.len());
            }
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&manager.info())?);
        }
    }
    Ok(())
}

fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => ProjectDirs::from("dev", "qtask", "qtask")
            .ok_or_else(|| anyhow!("unable to determine a data directory; pass --data-dir"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

fn build_filter(args: &ListArgs) -> Result<TaskFilter> {
    let mut filter = TaskFilter::new();
    if let Some(search) = &args.search {
        filter = filter.search(search.clone());
    }
    if let Some(category) = &args.category {
        filter = filter.category(parse_category(category)?);
    }
    if let Some(priority) = &args.priority {
        filter = filter.priority(parse_priority(priority)?);
    }
    if let Some(status) = &args.status {
        let status = StatusFilter::parse(status)
            .ok_or_else(|| anyhow!("unknown status `{status}`; expected completed|pending"))?;
        filter = filter.status(status);
    }
    Ok(filter)
}

/// Command-line input is matched case-insensitively; core parsing is strict.
fn parse_priority(value: &str) -> Result<Priority> {
    Priority::ALL
        .into_iter()
        .find(|priority| priority.as_str().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| anyhow!("unknown priority `{value}`; expected low|medium|high"))
}

fn parse_category(value: &str) -> Result<Category> {
    Category::ALL
        .into_iter()
        .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| {
            anyhow!("unknown category `{value}`; expected personal|work|urgent|education|health")
        })
}
