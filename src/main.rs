use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use tasklist::{Backend, Config, FilterMode, Persistence, Priority, Task, TaskStore};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "TaskList CLI - add, complete, filter and search to-do items")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Storage directory (overrides data_dir from the config file)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Config file (default: <config dir>/tasklist/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage backend: file or sqlite
    #[arg(short, long)]
    backend: Option<Backend>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// low, normal or high
        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<NaiveDate>,
    },

    /// List tasks
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        filter: FilterMode,

        /// Case-insensitive text search
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Mark a task done, or undo it
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },

    /// Change a task's text, priority or due date
    Edit(EditArgs),

    /// Delete a task
    Rm {
        /// Task id or unique id prefix
        id: String,
    },

    /// Delete all completed tasks
    ClearCompleted,

    /// Show task counts
    Stats,
}

impl Commands {
    fn mutates(&self) -> bool {
        !matches!(self, Commands::List { .. } | Commands::Stats)
    }
}

#[derive(Args)]
struct EditArgs {
    /// Task id or unique id prefix
    id: String,

    /// New text
    #[arg(short, long)]
    text: Option<String>,

    /// New priority
    #[arg(short, long)]
    priority: Option<Priority>,

    /// New due date (YYYY-MM-DD)
    #[arg(short, long, conflicts_with = "no_due")]
    due: Option<NaiveDate>,

    /// Remove the due date
    #[arg(long)]
    no_due: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.store_path {
        config.data_dir = Some(path);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    // Open store
    let storage = config.open_storage()?;
    let mut store = TaskStore::with_order(storage, config.insert_order);
    if let Some(e) = store.load_error() {
        eprintln!("{} {:#}", "warning: stored tasks could not be read, starting empty:".yellow(), e);
        // Saving now would replace the unreadable data with an empty list
        if cli.command.mutates() {
            return Err(eyre!("Refusing to overwrite unreadable task storage; repair or move it first"));
        }
    }

    match cli.command {
        Commands::Add { text, priority, due } => match store.add(&text.join(" "), priority, due)? {
            Some(task) => println!("Added {}", render(&task)),
            None => println!("{}", "Nothing added: task text is blank".yellow()),
        },
        Commands::List { filter, search } => {
            store.set_filter(filter);
            store.set_search_query(search);
            print_view(&store);
        }
        Commands::Toggle { id } => {
            let id = resolve(&store, &id)?;
            if let Some(task) = store.toggle_completed(&id)? {
                println!("{}", render(&task));
            }
        }
        Commands::Edit(args) => edit(&mut store, args)?,
        Commands::Rm { id } => {
            let id = resolve(&store, &id)?;
            if let Some(task) = store.remove(&id)? {
                println!("Deleted {}", render(&task));
            }
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed()?;
            println!("Removed {} completed task(s)", removed);
        }
        Commands::Stats => {
            let counts = store.counts();
            println!(
                "{} total, {} active, {} completed",
                counts.total, counts.active, counts.completed
            );
        }
    }

    Ok(())
}

fn edit<P: Persistence>(store: &mut TaskStore<P>, args: EditArgs) -> Result<()> {
    let id = resolve(store, &args.id)?;

    if let Some(text) = args.text {
        if store.edit_text(&id, &text)?.is_none() {
            println!("{}", "Text unchanged: new text is blank".yellow());
        }
    }
    if let Some(priority) = args.priority {
        store.set_priority(&id, priority)?;
    }
    if args.no_due {
        store.set_due_date(&id, None)?;
    } else if let Some(due) = args.due {
        store.set_due_date(&id, Some(due))?;
    }

    if let Some(task) = store.get(&id) {
        println!("{}", render(task));
    }
    Ok(())
}

/// Map a user-supplied id prefix to a full id
fn resolve<P: Persistence>(store: &TaskStore<P>, prefix: &str) -> Result<String> {
    store
        .resolve(prefix)?
        .map(|task| task.id.clone())
        .ok_or_else(|| eyre!("No task with id {}", prefix))
}

fn print_view<P: Persistence>(store: &TaskStore<P>) {
    let mut shown = 0;
    for task in store.view() {
        println!("{}", render(task));
        shown += 1;
    }

    if shown == 0 {
        println!("{}", "No tasks".dimmed());
    }
    let counts = store.counts();
    println!(
        "{}",
        format!("{} shown, {} active, {} completed", shown, counts.active, counts.completed).dimmed()
    );
}

fn render(task: &Task) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let text = if task.completed {
        task.text.strikethrough().dimmed().to_string()
    } else {
        match task.priority {
            Priority::High => task.text.red().bold().to_string(),
            Priority::Normal => task.text.normal().to_string(),
            Priority::Low => task.text.dimmed().to_string(),
        }
    };

    let mut line = format!("{} {} {}", task.id.dimmed(), mark, text);
    if let Some(due) = task.due_date {
        let due_str = format!("(due {})", due);
        if task.is_overdue(Local::now().date_naive()) {
            line.push_str(&format!(" {}", due_str.red()));
        } else {
            line.push_str(&format!(" {}", due_str.cyan()));
        }
    }
    if task.priority != Priority::Normal {
        line.push_str(&format!(" {}", format!("[{}]", task.priority).dimmed()));
    }
    line
}
