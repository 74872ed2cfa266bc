pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docflow_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig};

use crate::commands::document::DocumentAction;

#[derive(Debug, Parser)]
#[command(
    name = "docflow",
    about = "Document approval workflow CLI",
    long_about = "Build approval routes, move documents through approval and inspect their history.",
    after_help = "Examples:\n  docflow routes list\n  docflow submit 42 --route 7\n  docflow approve 42 --comment \"Looks good\"\n  docflow status 42"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to docflow.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override api.base_url")]
    base_url: Option<String>,
    #[arg(long, global = true, help = "Read the access token from this file")]
    token_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand, about = "Manage approval routes")]
    Routes(RoutesCommand),
    #[command(about = "Show a document's status, available actions and approval history")]
    Status { document_id: String },
    #[command(about = "Submit or resubmit a document for approval")]
    Submit {
        document_id: String,
        #[arg(long, help = "Route to use; required when the document has none")]
        route: Option<String>,
    },
    #[command(about = "Approve the current step")]
    Approve {
        document_id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Reject the document")]
    Reject {
        document_id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Cancel a document (irreversible)")]
    Cancel {
        document_id: String,
        #[arg(long, help = "Confirm the cancellation")]
        yes: bool,
    },
    #[command(about = "Download the rendered approval sheet")]
    Sheet {
        document_id: String,
        #[arg(long, help = "Output path; defaults to approval-sheet-<id>.pdf")]
        out: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
enum RoutesCommand {
    #[command(about = "List active routes")]
    List,
    #[command(about = "Show one route with its steps")]
    Show { id: String },
    #[command(about = "Create a route from a JSON file")]
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    #[command(about = "Replace a route's name, description and steps from a JSON file")]
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    #[command(about = "Deactivate a route; documents keep their history")]
    Delete { id: String },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                api_base_url: self.base_url.clone(),
                auth_token_file: self.token_file.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();
    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Routes(RoutesCommand::List) => commands::routes::list(options),
        Command::Routes(RoutesCommand::Show { id }) => commands::routes::show(options, &id),
        Command::Routes(RoutesCommand::Create { file }) => {
            commands::routes::save(options, None, &file)
        }
        Command::Routes(RoutesCommand::Update { id, file }) => {
            commands::routes::save(options, Some(&id), &file)
        }
        Command::Routes(RoutesCommand::Delete { id }) => commands::routes::delete(options, &id),
        Command::Status { document_id } => commands::document::status(options, &document_id),
        Command::Submit { document_id, route } => commands::document::run_action(
            options,
            &document_id,
            DocumentAction::Submit { route_id: route },
        ),
        Command::Approve { document_id, comment } => commands::document::run_action(
            options,
            &document_id,
            DocumentAction::Approve { comment },
        ),
        Command::Reject { document_id, comment } => commands::document::run_action(
            options,
            &document_id,
            DocumentAction::Reject { comment },
        ),
        Command::Cancel { document_id, yes } => commands::document::run_action(
            options,
            &document_id,
            DocumentAction::Cancel { confirmed: yes },
        ),
        Command::Sheet { document_id, out } => commands::document::sheet(options, &document_id, out),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_logging(logging: &LoggingConfig) {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
