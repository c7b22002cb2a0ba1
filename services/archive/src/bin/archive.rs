//! services/archive/src/bin/archive.rs

use archive_lib::{
    app::{drafts::DraftSlot, AppContext, Archive, Notice, SessionManager},
    config::Config,
    error::AppError,
};
use book_archive_core::{
    catalog::{CatalogQuery, SortKey},
    domain::DocumentDraft,
    genre::{Genre, GenreFilter},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(name = "archive", about = "Browse, read and manage the book archive")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List books, favorites first
    List {
        /// Case-insensitive search over title, author, summary and text
        #[arg(short, long, default_value = "")]
        query: String,
        #[arg(short, long, value_parser = parse_genre_filter, default_value = "all")]
        genre: GenreFilter,
        /// Only show favorites
        #[arg(short, long)]
        favorites: bool,
        #[arg(short, long, value_parser = parse_sort, default_value = "recent")]
        sort: SortKey,
    },
    /// Print one page of a book
    Read {
        id: i64,
        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Step the stored reader font size up before reading
        #[arg(long, conflicts_with = "smaller")]
        larger: bool,
        /// Step the stored reader font size down before reading
        #[arg(long)]
        smaller: bool,
    },
    /// Open the book a shared link points at
    Open { link: Url },
    /// Write a book's text to <dir>/<title>.txt
    Export {
        id: i64,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Toggle a book in the local favorites
    Favorite { id: i64 },
    /// Add a book from a text file
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "")]
        summary: String,
        /// Genre tag to apply; classified from the text when omitted
        #[arg(long, value_parser = parse_genre)]
        genre: Option<Genre>,
        #[arg(long)]
        file: PathBuf,
    },
    /// Add a book straight from a .txt or .md file
    Import {
        file: PathBuf,
        /// Only stage the file in the add draft
        #[arg(long)]
        draft_only: bool,
    },
    /// Edit a book; unspecified fields keep their current values
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long, value_parser = parse_genre)]
        genre: Option<Genre>,
        /// Replace the text with the contents of this file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete a book
    Delete { id: i64 },
    /// Create an account and sign in
    Signup { email: String, password: String },
    /// Sign in with email and password
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print the shareable link for a book
    Link { id: i64 },
    /// Write every book to a JSON backup
    Backup { file: PathBuf },
    /// Upsert every book from a JSON backup (administrators only)
    Restore { file: PathBuf },
}

fn parse_genre(name: &str) -> Result<Genre, String> {
    Genre::from_name(name).ok_or_else(|| format!("unknown genre '{name}'"))
}

fn parse_genre_filter(name: &str) -> Result<GenreFilter, String> {
    GenreFilter::from_name(name).ok_or_else(|| format!("unknown genre '{name}'"))
}

fn parse_sort(name: &str) -> Result<SortKey, String> {
    SortKey::from_name(name).ok_or_else(|| format!("unknown sort '{name}'"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(notice) = launch(cli).await {
        eprintln!("error: {notice}");
        std::process::exit(1);
    }
}

fn notice(error: impl Into<AppError>) -> Notice {
    Notice::from(&error.into())
}

async fn launch(cli: Cli) -> Result<(), Notice> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env().map_err(notice)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Connect & Restore the Session ---
    let context = AppContext::connect(config).await.map_err(notice)?;
    let session = Arc::new(SessionManager::new(
        context.backend.as_ref().map(|backend| backend.auth.clone()),
        context.storage.clone(),
        context.config.session_ttl,
    ));
    let mut archive = Archive::new(context, session.clone());
    archive.resume_session().await;

    // --- 3. Run the Command ---
    let outcome = run(cli.command, &mut archive).await;
    session.stop();
    outcome
}

async fn run(command: Command, archive: &mut Archive) -> Result<(), Notice> {
    match command {
        Command::List {
            query,
            genre,
            favorites,
            sort,
        } => {
            archive.refresh().await?;
            let query = CatalogQuery {
                text: query,
                genre,
                favorites_only: favorites,
                sort,
            };
            let visible = archive.visible(&query);
            if visible.is_empty() {
                println!("No books match.");
            }
            for document in visible {
                let star = if archive.is_favorite(document.id) { "*" } else { " " };
                println!(
                    "{star} {:>5}  {} by {}  [{}]  {}",
                    document.id,
                    document.title,
                    document.author,
                    document.genre(),
                    document.created_at.format("%Y-%m-%d")
                );
            }
        }
        Command::Read {
            id,
            page,
            larger,
            smaller,
        } => {
            let (mut reader, link) = archive.open(id).await?;
            let font = if larger {
                reader.larger()
            } else if smaller {
                reader.smaller()
            } else {
                Ok(reader.font_size())
            };
            let font = font.map_err(notice)?;
            reader.go_to(page.saturating_sub(1));
            println!(
                "{} (page {}/{}, font {}px)\n",
                reader.title(),
                reader.page_index() + 1,
                reader.page_count(),
                font
            );
            println!("{}\n", reader.page());
            println!("{link}");
        }
        Command::Open { link } => match archive.open_link(&link).await {
            Some(opened) => {
                let (reader, link) = opened?;
                println!("{} ({} pages)\n", reader.title(), reader.page_count());
                println!("{}\n", reader.page());
                println!("{link}");
            }
            None => println!("{}", archive.closed_link()),
        },
        Command::Export { id, dir } => {
            archive.refresh().await?;
            let path = archive.export(id, &dir)?;
            println!("Exported to {}", path.display());
        }
        Command::Favorite { id } => {
            let now = archive.toggle_favorite(id)?;
            println!("Book {id} {}", if now { "added to favorites" } else { "removed from favorites" });
        }
        Command::Add {
            title,
            author,
            summary,
            genre,
            file,
        } => {
            let content = std::fs::read_to_string(&file)
                .map_err(notice)?;
            let draft = DocumentDraft::compose(title, author, &summary, content, genre);
            stage(archive, DraftSlot::Add, &draft);
            let created = archive.create(&draft).await?;
            println!("Added book {}: {}", created.id, created.title);
        }
        Command::Import { file, draft_only } => {
            let draft = archive.import_text_file(&file)?;
            if draft_only {
                println!("Staged '{}' in the add draft", draft.title);
            } else {
                let created = archive.create(&draft).await?;
                println!("Added book {}: {}", created.id, created.title);
            }
        }
        Command::Edit {
            id,
            title,
            author,
            summary,
            genre,
            file,
        } => {
            archive.refresh().await?;
            let slot = DraftSlot::Edit(id);
            let mut draft = match archive.drafts().load(slot) {
                Some(saved) => saved,
                None => match archive.document(id) {
                    Some(document) => DocumentDraft::from_document(document),
                    None => {
                        return Err(notice(AppError::Internal(format!(
                            "Book {id} does not exist"
                        ))))
                    }
                },
            };
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(author) = author {
                draft.author = author;
            }
            if let Some(summary) = summary {
                draft.set_summary(&summary);
            }
            if let Some(genre) = genre {
                draft.genre = genre;
            }
            if let Some(file) = file {
                draft.content = std::fs::read_to_string(&file)
                    .map_err(notice)?;
            }
            stage(archive, slot, &draft);
            let updated = archive.update(id, &draft).await?;
            println!("Saved book {}: {}", updated.id, updated.title);
        }
        Command::Delete { id } => {
            archive.refresh().await?;
            archive.delete(id).await?;
            println!("Deleted book {id}");
        }
        Command::Signup { email, password } => {
            let user = archive
                .session()
                .sign_up(&email, &password)
                .await
                .map_err(notice)?;
            println!("Signed up as {} ({})", user.display_name, user.role);
        }
        Command::Login { email, password } => {
            let user = archive
                .session()
                .sign_in(&email, &password)
                .await
                .map_err(notice)?;
            println!("Signed in as {} ({})", user.display_name, user.role);
        }
        Command::Logout => {
            archive
                .session()
                .sign_out()
                .await
                .map_err(notice)?;
            println!("Signed out");
        }
        Command::Whoami => {
            let user = archive
                .session()
                .ensure_active()
                .await
                .map_err(notice)?;
            match user {
                Some(user) => println!("{} <{}> ({})", user.display_name, user.email, user.role),
                None => println!("Not signed in"),
            }
        }
        Command::Link { id } => {
            let (_, link) = archive.open(id).await?;
            println!("{link}");
        }
        Command::Backup { file } => {
            archive.refresh().await?;
            let count = archive.backup(&file)?;
            println!("Wrote {count} books to {}", file.display());
        }
        Command::Restore { file } => {
            let count = archive.restore(&file).await?;
            println!("Restored {count} books from {}", file.display());
        }
    }
    Ok(())
}

/// Keeps the form contents in the draft slot so a failed save can be retried.
fn stage(archive: &Archive, slot: DraftSlot, draft: &DocumentDraft) {
    if let Err(e) = archive.drafts().save(slot, draft) {
        warn!("Could not save {}: {}", slot.key(), e);
    }
}
