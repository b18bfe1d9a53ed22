use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use taskboard::commands::{
    BoardFilters, PlayOptions, cmd_config_path, cmd_config_set_user, cmd_config_show, cmd_play,
    cmd_show, cmd_watch,
};

/// Environment variable holding the log filter
const LOG_ENV: &str = "TASKBOARD_LOG";

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Kanban board for local and shared tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Only show tasks whose title or description contains this text
    #[arg(short, long)]
    search: Option<String>,

    /// Act as this user (overrides the configured user)
    #[arg(short, long)]
    user: Option<String>,

    /// Hide shared tasks assigned to other users
    #[arg(long)]
    hide_shared: bool,
}

impl From<FilterArgs> for BoardFilters {
    fn from(args: FilterArgs) -> Self {
        BoardFilters {
            search: args.search,
            user: args.user,
            hide_shared: args.hide_shared,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the board of a document
    #[command(visible_alias = "s")]
    Show {
        /// Board document (YAML or JSON)
        file: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reprint the board whenever the document changes
    #[command(visible_alias = "w")]
    Watch {
        /// Board document (YAML or JSON)
        file: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Replay a key script against the board
    Play {
        /// Board document (YAML or JSON)
        file: PathBuf,

        /// Whitespace-separated keys, e.g. "j j enter ctrl+shift+enter esc"
        #[arg(short, long)]
        keys: String,

        /// Starting address (default: the project's task list)
        #[arg(short, long)]
        address: Option<String>,

        /// Act as this user (overrides the configured user)
        #[arg(short, long)]
        user: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the current user id
    SetUser {
        /// User id
        id: String,
    },
    /// Print the configuration file path
    Path,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Show {
            file,
            filters,
            json,
        } => cmd_show(&file, &filters.into(), json).await,
        Commands::Watch { file, filters } => cmd_watch(&file, &filters.into()).await,
        Commands::Play {
            file,
            keys,
            address,
            user,
            json,
        } => {
            let options = PlayOptions {
                keys,
                address,
                user,
                json,
            };
            cmd_play(&file, &options).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => cmd_config_show(json),
            ConfigAction::SetUser { id } => cmd_config_set_user(&id),
            ConfigAction::Path => cmd_config_path(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
