//! logkeeper - live log tailing, search and bookmarks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logkeeper::archive::{self, ArchiveError};
use logkeeper::bookmarks::BookmarkError;
use logkeeper::config::{ConfigError, ConfigLoader, MonitorConfig, Settings};
use logkeeper::display;
use logkeeper::session::{MonitorSession, SessionError};

#[derive(Parser)]
#[command(
    name = "logkeeper",
    about = "Live log tailing, search and bookmarks",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file, optionally with the last matches of a search term.
    View {
        file: PathBuf,
        /// Case-sensitive search term.
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Follow a file until Ctrl-C.
    Tail {
        file: PathBuf,
        /// Case-sensitive search term.
        #[arg(short, long)]
        search: Option<String>,
        /// Poll interval in milliseconds.
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// List the distinct error lines of a file.
    Errors { file: PathBuf },
    /// Manage bookmarks.
    Bookmark {
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Write a file into a zip archive.
    Archive { file: PathBuf, output: PathBuf },
    /// Back up settings and bookmarks into a zip archive.
    Backup {
        /// Defaults to logkeeper_backup_YYYYMMDD.zip in the working directory.
        output: Option<PathBuf>,
    },
    /// Extract a log from a zip archive and print it.
    Extract {
        archive: PathBuf,
        /// Entry to extract; defaults to the first file.
        entry: Option<String>,
        /// Directory to extract into.
        #[arg(short, long)]
        dest: Option<PathBuf>,
        /// Only list the entries.
        #[arg(short, long)]
        list: bool,
    },
    /// Set the directory relative file names are looked up in.
    SetDir { dir: PathBuf },
}

#[derive(Subcommand)]
enum BookmarkAction {
    /// List bookmarks.
    List,
    /// Bookmark a file.
    Add { file: PathBuf },
    /// Remove a bookmark.
    Remove { file: PathBuf },
    /// Open a bookmarked file.
    Open {
        file: PathBuf,
        /// Keep following the file.
        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Bookmark(#[from] BookmarkError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loaded configuration and settings.
struct App {
    config: MonitorConfig,
    settings: Settings,
}

impl App {
    fn load(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let loader = config_path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
        let config = loader.load()?;
        let settings = Settings::load(&config.settings_path())?;
        tracing::debug!(
            data_dir = %config.data_dir().display(),
            default_log_directory = ?settings.default_log_directory(),
            "Configuration loaded"
        );
        Ok(Self { config, settings })
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        self.settings.resolve(file)
    }

    /// Bookmarks are stored as absolute paths where the file can be found.
    fn bookmark_path(&self, file: &Path) -> PathBuf {
        let path = self.resolve(file);
        std::fs::canonicalize(&path).unwrap_or(path)
    }

    fn session(&self) -> Result<MonitorSession, CliError> {
        Ok(MonitorSession::open(self.config.clone())?)
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut app = App::load(cli.config)?;

    match cli.command {
        Commands::View { file, search } => {
            let mut session = app.session()?;
            let loaded = session.select_file(app.resolve(&file))?;
            display::print_opened(&loaded.path, loaded.size);
            display::print_content(&loaded.text);
            if let Some(term) = search {
                display::print_matches("SEARCH", &session.set_search_term(&term));
            }
        }
        Commands::Tail {
            file,
            search,
            interval,
        } => {
            if let Some(ms) = interval {
                app.config.poll_interval_ms = ms;
            }
            let mut session = app.session()?;
            let loaded = session.select_file(app.resolve(&file))?;
            display::print_opened(&loaded.path, loaded.size);
            display::print_content(&loaded.text);
            follow(&mut session, search.as_deref()).await?;
        }
        Commands::Errors { file } => {
            let mut session = app.session()?;
            let loaded = session.select_file(app.resolve(&file))?;
            display::print_opened(&loaded.path, loaded.size);
            display::print_matches("ERRORS", &session.analyze_errors()?);
        }
        Commands::Bookmark { action } => bookmark(&app, action).await?,
        Commands::Archive { file, output } => {
            let file = app.resolve(&file);
            archive::archive_file(&file, &output)?;
            display::print_success(&format!(
                "{} archived to {}",
                file.display(),
                output.display()
            ));
        }
        Commands::Backup { output } => {
            let output = output.unwrap_or_else(|| {
                PathBuf::from(archive::default_backup_name(
                    chrono::Local::now().date_naive(),
                ))
            });
            let documents = [app.config.settings_path(), app.config.bookmarks_path()];
            let report = archive::backup_documents(&documents, &output)?;
            display::print_backup(&report);
            if report.included.is_empty() {
                display::print_warning("Nothing to back up yet");
            }
        }
        Commands::Extract {
            archive: zip,
            entry,
            dest,
            list,
        } => {
            if list {
                for name in archive::list_entries(&zip)? {
                    println!("{name}");
                }
                return Ok(());
            }
            let dest = dest.unwrap_or_else(|| std::env::temp_dir().join("logkeeper"));
            let extracted = archive::extract_entry(&zip, entry.as_deref(), &dest)?;
            let mut session = app.session()?;
            let loaded = session.select_file(&extracted)?;
            display::print_opened(&loaded.path, loaded.size);
            display::print_content(&loaded.text);
        }
        Commands::SetDir { dir } => {
            if !dir.is_dir() {
                return Err(CliError::NotADirectory(dir));
            }
            let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
            app.settings.set_default_log_directory(&dir);
            app.settings.save(&app.config.settings_path())?;
            display::print_success(&format!("Default log directory set to {}", dir.display()));
        }
    }
    Ok(())
}

async fn bookmark(app: &App, action: BookmarkAction) -> Result<(), CliError> {
    let mut session = app.session()?;
    match action {
        BookmarkAction::List => display::print_bookmarks(session.list_bookmarks()),
        BookmarkAction::Add { file } => {
            let path = app.bookmark_path(&file);
            session.add_bookmark(path.clone())?;
            display::print_success(&format!("Bookmarked {}", path.display()));
        }
        BookmarkAction::Remove { file } => {
            let path = app.bookmark_path(&file);
            if session.remove_bookmark(&path)? {
                display::print_success(&format!("Removed {}", path.display()));
            } else {
                display::print_warning(&format!("Not bookmarked: {}", path.display()));
            }
        }
        BookmarkAction::Open { file, follow: keep } => {
            let loaded = session.open_bookmark(&app.bookmark_path(&file))?;
            display::print_opened(&loaded.path, loaded.size);
            display::print_content(&loaded.text);
            if keep {
                follow(&mut session, None).await?;
            }
        }
    }
    Ok(())
}

/// Follow the session's current file until Ctrl-C.
async fn follow(session: &mut MonitorSession, search: Option<&str>) -> Result<(), CliError> {
    let mut updates = session.subscribe();
    let mut last_matches = match search {
        Some(term) => {
            let matches = session.set_search_term(term);
            display::print_matches("SEARCH", &matches);
            matches
        }
        None => session.matches(),
    };
    session.set_follow(true)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    tracing::info!(
        interval_ms = session.config().poll_interval_ms,
        "Following, press Ctrl-C to stop"
    );
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            update = updates.recv() => {
                let Some(update) = update else { break };
                display::print_update(&update);
                if update.matches != last_matches {
                    display::print_matches("SEARCH", &update.matches);
                    last_matches = update.matches;
                }
            }
        }
    }

    session.set_follow(false)?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
