//! synapse: command-line access to the capture store.
//!
//! Every invocation runs as its own execution context on the file-backed
//! store at `SYNAPSE_STORE_PATH`, so state written here is what the other
//! contexts load.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use synapse_client::{
    ApiClient, HttpBeacon, HttpDraftCache, HttpNoteRepository, HttpPageSaver, NoteSearchClient,
    SessionStore,
};
use synapse_core::{DraftCache, KeyedStore, PendingTextSnippet, SyncConfig};
use synapse_draft::{
    DraftAutosaveEngine, DraftBackends, DraftConfig, DraftEngineBuilder, KeyedDegradedStore,
    PromotionOutcome,
};
use synapse_store::{
    initialize_storage, BroadcastRelay, CollectionSet, MutationOutcome, SaveBatchCoordinator,
    StorageMedium,
};

#[derive(Parser)]
#[command(name = "synapse")]
#[command(author, version, about = "Collect pages, snippets, and drafts for your notes")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage collected page URLs
    Pages {
        #[command(subcommand)]
        action: PagesAction,
    },

    /// Manage pending text snippets
    Snippets {
        #[command(subcommand)]
        action: SnippetsAction,
    },

    /// Show or change the capture overlay state
    Overlay {
        #[command(subcommand)]
        action: OverlayAction,
    },

    /// Save every collected page as a note
    Save,

    /// Manage cached drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Search notes by keyword
    Search {
        /// Keyword to search for
        keyword: String,
    },

    /// Sign out and clear the local session
    Logout,
}

#[derive(Subcommand)]
enum PagesAction {
    /// Collect a page URL
    Add { url: String },
    /// Remove a collected page URL
    Remove { url: String },
    /// List collected page URLs
    List,
    /// Remove every collected page URL
    Clear,
}

#[derive(Subcommand)]
enum SnippetsAction {
    /// Queue a text snippet
    Add {
        text: String,

        /// Page the text was selected on
        #[arg(long, default_value = "")]
        source_url: String,

        /// Title of that page
        #[arg(long, default_value = "")]
        page_title: String,
    },
    /// List pending snippets
    List,
    /// Remove one snippet by id
    Remove { id: String },
    /// Remove every pending snippet
    Clear,
}

#[derive(Subcommand)]
enum OverlayAction {
    /// Print the current overlay state
    Show,
    /// Switch between expanded and collapsed
    Toggle,
    /// Expand the overlay
    Expand,
    /// Collapse the overlay
    Collapse,
    /// Hide the overlay
    Hide,
}

#[derive(Subcommand)]
enum DraftsAction {
    /// List cached drafts
    List,
    /// Create or edit a draft and push it to the cache
    Write {
        /// Existing draft id (a new draft is created when omitted)
        #[arg(long)]
        id: Option<Uuid>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,
    },
    /// Promote a cached draft to a note
    Promote { id: Uuid },
    /// Delete a cached draft without promoting it
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let _log_guard = synapse_core::logging::init_from_env();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// One execution context over the shared store.
struct App {
    config: SyncConfig,
    store: Arc<dyn KeyedStore>,
    collections: CollectionSet,
}

impl App {
    async fn open() -> anyhow::Result<Self> {
        let config = SyncConfig::from_env();
        let medium = StorageMedium::open(&config.store_path)
            .await
            .with_context(|| format!("opening store {}", config.store_path.display()))?;
        let store: Arc<dyn KeyedStore> = Arc::new(medium.context());
        initialize_storage(store.as_ref()).await?;

        let collections = CollectionSet::new(Arc::clone(&store), &config);
        collections.load_all().await;
        debug!(store_path = %config.store_path.display(), "Store loaded");

        Ok(Self {
            config,
            store,
            collections,
        })
    }

    fn api(&self) -> anyhow::Result<Arc<ApiClient>> {
        let session = Arc::new(SessionStore::new(Arc::clone(&self.store)));
        Ok(Arc::new(ApiClient::from_config(&self.config, session)?))
    }

    fn draft_engine(&self, api: &Arc<ApiClient>) -> DraftEngineBuilder {
        DraftAutosaveEngine::builder(DraftBackends {
            cache: Arc::new(HttpDraftCache::new(Arc::clone(api))),
            notes: Arc::new(HttpNoteRepository::new(Arc::clone(api))),
            degraded: Arc::new(KeyedDegradedStore::new(Arc::clone(&self.store))),
            beacon: Arc::new(HttpBeacon::new(Arc::clone(api))),
        })
        .config(DraftConfig::from_config(&self.config))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::open().await?;

    match cli.command {
        Commands::Pages { action } => cmd_pages(&app, action).await,
        Commands::Snippets { action } => cmd_snippets(&app, action).await,
        Commands::Overlay { action } => cmd_overlay(&app, action).await,
        Commands::Save => cmd_save(&app).await,
        Commands::Drafts { action } => cmd_drafts(&app, action).await,
        Commands::Search { keyword } => cmd_search(&app, &keyword).await,
        Commands::Logout => {
            let api = app.api()?;
            api.session().logout(&api).await?;
            println!("Signed out");
            Ok(())
        }
    }
}

fn applied(outcome: MutationOutcome, what: &str) -> anyhow::Result<()> {
    match outcome {
        MutationOutcome::Applied => Ok(()),
        MutationOutcome::Duplicate => bail!("{} is already collected", what),
        MutationOutcome::NotFound => bail!("{} not found", what),
        MutationOutcome::Invalid(reason) => bail!("invalid {}: {}", what, reason),
        MutationOutcome::RolledBack(error) => bail!("{} was not saved: {}", what, error),
    }
}

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn cmd_pages(app: &App, action: PagesAction) -> anyhow::Result<()> {
    let pages = &app.collections.pages;
    match action {
        PagesAction::Add { url } => applied(pages.add(url.clone()).await, &url)?,
        PagesAction::Remove { url } => applied(pages.remove(&url).await, &url)?,
        PagesAction::Clear => applied(pages.clear().await, "page list")?,
        PagesAction::List => {}
    }
    print_json(json!(pages.items()))
}

async fn cmd_snippets(app: &App, action: SnippetsAction) -> anyhow::Result<()> {
    let snippets = &app.collections.snippets;
    match action {
        SnippetsAction::Add {
            text,
            source_url,
            page_title,
        } => applied(
            snippets
                .add(PendingTextSnippet::new(text, source_url, page_title))
                .await,
            "snippet",
        )?,
        SnippetsAction::Remove { id } => applied(snippets.remove(&id).await, &id)?,
        SnippetsAction::Clear => applied(snippets.clear().await, "snippet list")?,
        SnippetsAction::List => {}
    }
    print_json(json!(snippets.items()))
}

async fn cmd_overlay(app: &App, action: OverlayAction) -> anyhow::Result<()> {
    let overlay = &app.collections.overlay;
    let outcome = match action {
        OverlayAction::Show => MutationOutcome::Applied,
        OverlayAction::Toggle => overlay.toggle().await,
        OverlayAction::Expand => overlay.expand().await,
        OverlayAction::Collapse => overlay.collapse().await,
        OverlayAction::Hide => overlay.hide().await,
    };
    applied(outcome, "overlay state")?;
    println!("{}", overlay.get());
    Ok(())
}

async fn cmd_save(app: &App) -> anyhow::Result<()> {
    let api = app.api()?;
    let coordinator = SaveBatchCoordinator::new(
        Arc::clone(&app.collections.pages),
        Arc::clone(&app.collections.save_requests),
        Arc::new(BroadcastRelay::default()),
        Arc::new(HttpPageSaver::from_config(api, &app.config)),
    );

    let report = coordinator.save_collected().await?;
    if !report.success {
        bail!(
            "batch {} failed: {}",
            report.batch_id,
            report.error.unwrap_or_default()
        );
    }
    print_json(json!({
        "batchId": report.batch_id,
        "urls": report.urls,
        "noteId": report.note_id,
    }))
}

async fn cmd_drafts(app: &App, action: DraftsAction) -> anyhow::Result<()> {
    let api = app.api()?;
    match action {
        DraftsAction::List => {
            let list = HttpDraftCache::new(api).list().await?;
            print_json(json!(list.drafts))
        }
        DraftsAction::Write { id, title, content } => {
            let builder = app.draft_engine(&api);
            let engine = match id {
                Some(id) => builder.open(id).await?,
                None => builder.new_draft(),
            };
            if let Some(title) = title {
                engine.handle_title_change(title);
            }
            if let Some(content) = content {
                engine.handle_content_change(content);
            }
            if let Err(e) = engine.flush().await {
                eprintln!("Draft kept locally, cache rejected it: {}", e);
            }
            let snapshot = engine.snapshot();
            print_json(json!({
                "noteId": snapshot.id,
                "title": snapshot.title,
                "content": snapshot.content,
                "version": snapshot.version,
            }))
        }
        DraftsAction::Promote { id } => {
            let engine = app.draft_engine(&api).open(id).await?;
            match engine.save_to_database().await? {
                PromotionOutcome::Promoted(note_id) => print_json(json!({ "noteId": note_id })),
                PromotionOutcome::PromotedElsewhere => {
                    println!("Draft {} is already being promoted", id);
                    Ok(())
                }
                PromotionOutcome::AlreadyInFlight => {
                    println!("Promotion of draft {} already running", id);
                    Ok(())
                }
            }
        }
        DraftsAction::Delete { id } => {
            let engine = app.draft_engine(&api).open(id).await?;
            engine.delete_draft().await?;
            println!("Deleted draft {}", id);
            Ok(())
        }
    }
}

async fn cmd_search(app: &App, keyword: &str) -> anyhow::Result<()> {
    let client = NoteSearchClient::from_config(app.api()?, &app.config);
    let page = client.search(keyword).await?;
    print_json(json!({
        "totalCount": page.total_count,
        "results": page.results,
    }))
}
