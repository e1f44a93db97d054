mod commands;
mod schema;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use commands::App;
use folio_core::operations::DeleteResourceOperationOutcome;
use folio_core::{Config, DigestAlgorithm, FileExpectation, Identifier, Stores};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Books, pages and the files scanned for them")]
struct Cli {
    /// Path to configuration file. Without it, defaults plus FOLIO_* variables apply.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory that relative store paths are resolved against
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage books
    #[command(subcommand)]
    Book(BookCommand),

    /// Manage pages of a book
    #[command(subcommand)]
    Page(PageCommand),

    /// Inspect stored files
    #[command(subcommand)]
    File(FileCommand),

    /// Delete a book or page by id
    Delete {
        id: Identifier,

        /// Also delete the files uploaded for it
        #[arg(long)]
        with_files: bool,
    },
}

#[derive(Subcommand)]
enum BookCommand {
    Create {
        #[arg(long)]
        title: String,

        #[arg(long = "author")]
        authors: Vec<String>,

        /// Publication date, YYYY-MM-DD
        #[arg(long)]
        published_on: Option<NaiveDate>,
    },
    List,
    Show {
        id: Identifier,
    },
}

#[derive(Subcommand)]
enum PageCommand {
    Add {
        #[arg(long)]
        book: Identifier,

        #[arg(long)]
        number: i64,

        /// Scan to upload for the page
        #[arg(long)]
        file: Option<PathBuf>,
    },
    List {
        #[arg(long)]
        book: Identifier,
    },
}

#[derive(Subcommand)]
enum FileCommand {
    /// Exit status 2 when the file does not match
    Verify(VerifyArgs),
    Checksum {
        id: Identifier,

        /// md5, sha256 or sha512; repeatable. Defaults to all.
        #[arg(long = "algorithm")]
        algorithms: Vec<DigestAlgorithm>,
    },
}

#[derive(Args)]
struct VerifyArgs {
    id: Identifier,

    #[arg(long)]
    size: Option<u64>,

    #[arg(long)]
    md5: Option<String>,

    #[arg(long)]
    sha256: Option<String>,

    #[arg(long)]
    sha512: Option<String>,
}

impl VerifyArgs {
    fn expectation(&self) -> FileExpectation {
        let mut expectation = FileExpectation::new();
        expectation.size = self.size;
        for (algorithm, hex) in [
            (DigestAlgorithm::Md5, &self.md5),
            (DigestAlgorithm::Sha256, &self.sha256),
            (DigestAlgorithm::Sha512, &self.sha512),
        ] {
            if let Some(hex) = hex {
                expectation = expectation.digest(algorithm.name(), hex.clone());
            }
        }
        expectation
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,folio_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading config from {}", path);
            Config::from_file(path)?
        }
        None => Config::from_env()?,
    };

    Ok(match &cli.data_dir {
        Some(root) => config.with_root(root),
        None => config,
    })
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let app = App::new(Stores::from_config(&config, schema::library())?);

    match cli.command {
        Commands::Book(BookCommand::Create {
            title,
            authors,
            published_on,
        }) => {
            let published_on = published_on
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|midnight| midnight.and_utc());
            print_json(&app.book_create(title, authors, published_on).await?)?;
        }
        Commands::Book(BookCommand::List) => {
            print_json(&app.book_list()?)?;
        }
        Commands::Book(BookCommand::Show { id }) => match app.book_show(id.clone()).await? {
            Some(view) => print_json(&view)?,
            None => return not_found(&id),
        },
        Commands::Page(PageCommand::Add { book, number, file }) => {
            print_json(&app.page_add(book, number, file.as_deref()).await?)?;
        }
        Commands::Page(PageCommand::List { book }) => {
            print_json(&app.page_list(book).await?)?;
        }
        Commands::File(FileCommand::Verify(args)) => {
            let view = app.file_verify(args.id.clone(), args.expectation()).await?;
            print_json(&view)?;
            if !view.found {
                return not_found(&args.id);
            }
            if !view.valid {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::File(FileCommand::Checksum { id, algorithms }) => {
            match app.file_checksum(&id, &algorithms).await? {
                Some(digests) => print_json(&digests)?,
                None => return not_found(&id),
            }
        }
        Commands::Delete { id, with_files } => match app.delete(id.clone(), with_files).await? {
            DeleteResourceOperationOutcome::Deleted(result) => {
                tracing::info!("Deleted {} ({} files)", result.id, result.files_deleted);
            }
            DeleteResourceOperationOutcome::NotFound => return not_found(&id),
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn not_found(id: &Identifier) -> anyhow::Result<ExitCode> {
    tracing::error!("{} not found", id);
    Ok(ExitCode::FAILURE)
}
