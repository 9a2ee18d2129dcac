use std::{future::Future, ops::ControlFlow, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, HttpBackend, Session, SessionEvent};
use shared::domain::{QueryState, Role};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;
mod repl;

use render::{format_health, format_message, format_sources};
use repl::{ReplCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Chat with your documents through the retrieval backend")]
struct Args {
    /// Backend base url; overrides client.toml and API_BASE_URL.
    #[arg(long)]
    api_base_url: Option<String>,
    /// Number of passages to retrieve per query.
    #[arg(long)]
    top_k: Option<u32>,
    /// Weight of vector similarity against keyword score, 0.0 to 1.0.
    #[arg(long)]
    alpha: Option<f32>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive conversation (default).
    Chat,
    /// Ask a single question and print the answer with its sources.
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Upload a .pdf, .docx or .txt document for indexing.
    Upload { path: PathBuf },
    /// Show backend health and readiness.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    if args.top_k.is_some() {
        settings.top_k = args.top_k;
    }
    if let Some(alpha) = args.alpha {
        if !(0.0..=1.0).contains(&alpha) {
            bail!("--alpha must be between 0.0 and 1.0, got {alpha}");
        }
        settings.alpha = Some(alpha);
    }

    let backend = HttpBackend::from_settings(&settings)?;
    info!(server_url = backend.server_url(), "chat: using retrieval backend");
    let session = Session::with_options(Arc::new(backend.clone()), settings.query_options());

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(session, backend).await,
        Command::Ask { query } => run_ask(session, query.join(" ")).await,
        Command::Upload { path } => {
            let uploaded = backend
                .upload(&path)
                .await
                .with_context(|| format!("failed to upload {}", path.display()))?;
            println!("Uploaded {}.", uploaded.file);
            Ok(())
        }
        Command::Health => {
            println!("{}", health_report(&backend).await?);
            Ok(())
        }
    }
}

async fn run_chat(session: Arc<Session>, backend: HttpBackend) -> Result<()> {
    for message in session.timeline() {
        println!("{}", format_message(&message));
    }
    let renderer = tokio::spawn(render_events(session.subscribe_events()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if dispatch(&session, &backend, ReplCommand::parse(&line)).is_break() {
            break;
        }
    }

    session.stop_query();
    renderer.abort();
    Ok(())
}

/// Handles one prompt command. Network work runs on its own task so the
/// prompt, and `/stop` in particular, is never held up behind it.
fn dispatch(session: &Arc<Session>, backend: &HttpBackend, command: ReplCommand) -> ControlFlow<()> {
    match command {
        ReplCommand::Empty => {}
        ReplCommand::Quit => return ControlFlow::Break(()),
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Invalid(reason) => println!("{reason}"),
        ReplCommand::Stop => {
            if !session.stop_query() {
                println!("Nothing to stop.");
            }
        }
        ReplCommand::Sources => println!("{}", format_sources(&session.latest_sources())),
        ReplCommand::Upload(path) => {
            let backend = backend.clone();
            tokio::spawn(async move {
                match backend.upload(&path).await {
                    Ok(uploaded) => println!("Uploaded {}.", uploaded.file),
                    Err(err) => println!("Upload failed: {err}"),
                }
            });
        }
        ReplCommand::Health => {
            let backend = backend.clone();
            tokio::spawn(async move {
                match health_report(&backend).await {
                    Ok(report) => println!("{report}"),
                    Err(err) => println!("Health check failed: {err:#}"),
                }
            });
        }
        ReplCommand::Query(text) => {
            if session.is_busy() {
                println!("Still generating an answer; /stop it first.");
            } else {
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    session.submit_query(&text).await;
                });
            }
        }
    }
    ControlFlow::Continue(())
}

async fn render_events(events: broadcast::Receiver<SessionEvent>) {
    let mut stream = BroadcastStream::new(events);
    while let Some(event) = stream.next().await {
        match event {
            Ok(SessionEvent::MessageAppended { message, .. }) => {
                if message.role == Role::Assistant {
                    println!("{}", format_message(&message));
                }
            }
            Ok(SessionEvent::SourcesChanged(sources)) => {
                if !sources.is_empty() {
                    println!("{}", format_sources(&sources));
                }
            }
            Ok(SessionEvent::BusyChanged(true)) => {
                println!("Generating answer... (/stop to cancel)");
            }
            Ok(SessionEvent::BusyChanged(false)) => {}
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "chat: renderer fell behind session events");
            }
        }
    }
}

async fn run_ask(session: Arc<Session>, query: String) -> Result<()> {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let state = ask(&session, &query, interrupt)
        .await
        .ok_or_else(|| anyhow!("nothing to ask: the query is empty"))?;

    if let Some(answer) = session.timeline().last() {
        println!("{}", format_message(answer));
    }
    let sources = session.latest_sources();
    if !sources.is_empty() {
        println!("{}", format_sources(&sources));
    }

    match state {
        QueryState::Completed => Ok(()),
        other => bail!("query did not complete: {other:?}"),
    }
}

/// Runs `query` to completion, stopping it if `interrupt` resolves first.
/// The query is polled before `interrupt`, so it already holds the session's
/// slot when a stop is issued.
async fn ask(
    session: &Session,
    query: &str,
    interrupt: impl Future<Output = ()>,
) -> Option<QueryState> {
    let submit = session.submit_query(query);
    tokio::pin!(submit);
    tokio::pin!(interrupt);

    tokio::select! {
        biased;
        settled = &mut submit => settled,
        _ = &mut interrupt => {
            session.stop_query();
            submit.await
        }
    }
}

async fn health_report(backend: &HttpBackend) -> Result<String> {
    let health = backend
        .health()
        .await
        .context("failed to query /healthz")?;
    let readiness = backend
        .readiness()
        .await
        .context("failed to query /readyz")?;
    Ok(format_health(&health, &readiness))
}
