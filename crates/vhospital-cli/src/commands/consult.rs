//! `ask` and `chat`

use std::future::Future;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, warn};
use vhospital_core::chat::Transcript;
use vhospital_core::client::{create_event_channel, ClientError, ConsultationClient};
use vhospital_core::consult::{ConsultCancellation, ConsultationSession};
use vhospital_core::credits::UserIdentity;
use vhospital_core::AppConfig;

use super::account::{check_access, denial_message};
use crate::render::{format_message, EventRenderer};

const RETRY_COMMAND: &str = "/retry";
const HISTORY_COMMAND: &str = "/history";
const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

/// Options shared by `ask` and `chat`
pub struct ConsultOptions {
    pub user: Option<UserIdentity>,
    /// Print each specialist's reply
    pub details: bool,
}

/// Single question, answer on stdout
pub async fn ask(config: &AppConfig, question: &str, options: &ConsultOptions) -> Result<()> {
    if !ensure_access(config, options)? {
        return Ok(());
    }

    let mut transcript = Transcript::new();
    let Some(question) = transcript.submit(question) else {
        bail!("Question is empty");
    };

    let client = ConsultationClient::new(&config.consultation)?;
    info!("Consulting {}", client.endpoint());
    let mut cancellation = ConsultCancellation::new();

    if let Some(session) = consult_once(&client, &question, options, &mut cancellation).await? {
        transcript.complete(&session);
        print_reply(&transcript, &session);
    }
    Ok(())
}

/// Interactive loop; `/retry` resubmits the last question
///
/// Ends on `/quit`, end of input, or Ctrl-C at the prompt.
pub async fn chat(config: &AppConfig, options: &ConsultOptions) -> Result<()> {
    if !ensure_access(config, options)? {
        return Ok(());
    }

    let client = ConsultationClient::new(&config.consultation)?;
    info!("Consulting {}", client.endpoint());
    let mut cancellation = ConsultCancellation::new();
    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a health question. Commands: /retry, /history, /quit");

    while let Some(line) = next_input(&mut lines, interrupted()).await? {
        let input = line.trim();

        let question = if QUIT_COMMANDS.contains(&input) {
            break;
        } else if input == HISTORY_COMMAND {
            for message in transcript.messages() {
                println!("{}", format_message(message));
            }
            continue;
        } else if input == RETRY_COMMAND {
            match transcript.retry() {
                Some(question) => {
                    info!("Retrying last question");
                    question
                }
                None => {
                    println!("Nothing to retry yet.");
                    continue;
                }
            }
        } else {
            match transcript.submit(input) {
                Some(question) => question,
                None => continue,
            }
        };

        match consult_once(&client, &question, options, &mut cancellation).await? {
            Some(session) => {
                transcript.complete(&session);
                print_reply(&transcript, &session);
            }
            None => println!("Consultation cancelled. Type /retry to ask again."),
        }
    }

    debug!("Chat ended with {} messages", transcript.messages().len());
    Ok(())
}

/// Next input line; None at end of input or when `interrupt` fires first
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => {
            println!();
            Ok(None)
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be watched
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn ensure_access(config: &AppConfig, options: &ConsultOptions) -> Result<bool> {
    let decision = check_access(config, options.user.as_ref())?;
    if decision.is_granted() {
        return Ok(true);
    }

    let email = options.user.as_ref().and_then(|u| u.email.as_deref());
    if let Some(message) = denial_message(config, decision, email)? {
        println!("{}", message);
    }
    Ok(false)
}

/// Run one consultation while rendering its events
///
/// Ctrl-C cancels the request; the session is then discarded and None is
/// returned.
async fn consult_once(
    client: &ConsultationClient,
    question: &str,
    options: &ConsultOptions,
    cancellation: &mut ConsultCancellation,
) -> Result<Option<ConsultationSession>> {
    let token = cancellation.begin();

    let watcher = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        })
    };

    let (tx, mut rx) = create_event_channel();
    let details = options.details;
    let renderer = tokio::spawn(async move {
        let mut renderer = EventRenderer::new(std::io::stdout(), details);
        while let Some(event) = rx.recv().await {
            if let Err(e) = renderer.render(&event) {
                warn!("Failed to render event: {}", e);
            }
        }
    });

    let result = client.consult(question, &tx, token).await;
    watcher.abort();
    drop(tx);
    if let Err(e) = renderer.await {
        warn!("Renderer task failed: {}", e);
    }

    match result {
        Ok(session) => Ok(Some(session)),
        Err(ClientError::Cancelled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Print the assistant reply unless it was already streamed
fn print_reply(transcript: &Transcript, session: &ConsultationSession) {
    if let Some(message) = transcript.messages().last() {
        if message.content != session.final_answer() {
            println!("{}", message.content);
        }
    }
}
