use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use corpus_client::{
    render, Access, AdminClient, ApiClient, ClientConfig, DocumentController, ExportController,
    FileTokenStore, NewUser, RecentDocuments, Route, RouteGuard, SearchController, SearchQuery,
    SessionContext, SessionStore,
};

#[derive(Parser)]
#[command(name = "corpus-cli")]
#[command(about = "CLI for the Corpus document service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL, including the version prefix
    #[arg(short, long, env = "CORPUS_API_URL")]
    url: Option<String>,

    /// Where the session token is kept between runs
    #[arg(long, env = "CORPUS_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "CORPUS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the signed-in user
    Whoami,
    Search {
        query: String,
        #[arg(short = 'c', long)]
        client_project: Option<String>,
        #[arg(short = 't', long)]
        doc_type: Option<String>,
        /// Modified on or after (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        from: Option<DateTime<Utc>>,
        /// Modified before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        to: Option<DateTime<Utc>>,
    },
    /// Recently received documents
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    #[command(name = "get")]
    GetDoc {
        id: String,
    },
    /// Save search results as CSV
    Export {
        query: String,
        /// Destination directory (defaults to CORPUS_EXPORT_DIR or .)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    Users,
    CreateUser {
        #[arg(short, long)]
        username: String,
        #[arg(short = 'n', long)]
        full_name: Option<String>,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        role: Option<String>,
    },
}

impl Commands {
    fn route(&self) -> Route {
        match self {
            Commands::Login { .. } | Commands::Logout => Route::Login,
            Commands::Whoami | Commands::Recent { .. } => Route::Dashboard,
            Commands::Search { .. } | Commands::Export { .. } => Route::Search,
            Commands::GetDoc { id } => Route::Document(id.clone()),
            Commands::Users | Commands::CreateUser { .. } => Route::AdminUsers,
        }
    }
}

fn parse_day(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
        .and_then(|day| {
            day.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .ok_or_else(|| "invalid date".to_string())
        })
}

fn init_tracing(json: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_env("CORPUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.url {
        config = config.with_base_url(url);
    }
    if let Some(path) = cli.token_file {
        config.token_file = path;
    }

    let store = Arc::new(FileTokenStore::new(config.token_file.clone()));
    let token_path = store.path().to_path_buf();
    let session = SessionContext::restore(store).await?;
    let api = ApiClient::new(config, session)?;
    let sessions = SessionStore::new(api.clone());

    match cli.command {
        Commands::Login { username, password } => {
            sessions.login(&username, &password).await?;
            let user = sessions.verify().await?;
            println!(
                "Logged in as {} ({}). Token saved to {}",
                user.username,
                user.role,
                token_path.display()
            );
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Logout => {
            sessions.logout().await;
            println!("Logged out (token removed).");
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    sessions.resume().await;
    if let Access::Redirect(to) = RouteGuard::check(&cli.command.route(), api.session().state()) {
        eprintln!("Not logged in (redirected to {to}). Run `corpus-cli login` first.");
        return Ok(ExitCode::FAILURE);
    }

    match cli.command {
        Commands::Whoami => {
            if let Some(user) = sessions.current_user() {
                println!(
                    "{} <{}> role={}",
                    user.full_name.as_deref().unwrap_or("-"),
                    user.username,
                    user.role
                );
            }
        }
        Commands::Search {
            query,
            client_project,
            doc_type,
            from,
            to,
        } => {
            let mut q = SearchQuery::new(query).modified_between(from, to);
            q.client_project = client_project;
            q.doc_type = doc_type;

            let search = SearchController::new(api);
            search.search(q).await;
            let view = search.snapshot();
            if let Some(error) = view.error {
                eprintln!("Search failed: {error}");
                return Ok(ExitCode::FAILURE);
            }
            print!("{}", render::hits_table(&view.hits));
            println!("{} of {} matching documents shown", view.hits.len(), view.total);
        }
        Commands::Recent { limit } => {
            let recent = RecentDocuments::new(api);
            recent.load(limit).await;
            let view = recent.snapshot();
            if let Some(error) = view.error {
                eprintln!("Could not load recent files: {error}");
                return Ok(ExitCode::FAILURE);
            }
            print!("{}", render::hits_table(&view.hits));
        }
        Commands::GetDoc { id } => {
            let documents = DocumentController::new(api);
            let doc = documents.fetch(&id).await?;
            print!("{}", render::document_view(&doc));
        }
        Commands::Export { query, out } => {
            let dest = out.unwrap_or_else(|| api.config().export_dir.clone());
            let exporter = ExportController::new(api);
            let file = exporter.export_csv(query.as_str(), &dest).await?;
            println!("Saved {} ({} bytes)", file.path.display(), file.bytes);
        }
        Commands::Users => {
            let users = AdminClient::new(api).list_users().await?;
            print!("{}", render::users_table(&users));
        }
        Commands::CreateUser {
            username,
            full_name,
            password,
            role,
        } => {
            let created = AdminClient::new(api)
                .create_user(&NewUser {
                    username,
                    full_name,
                    password,
                    role,
                })
                .await?;
            println!("Created {} ({})", created.username, created.role);
        }
        Commands::Login { .. } | Commands::Logout => {}
    }

    Ok(ExitCode::SUCCESS)
}
