use std::io::{BufRead, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use innerally_session::{ConversationEngine, ConversationSession, TurnError};

const PROMPT: &str = "you> ";

/// Line-oriented chat loop. Ctrl-C or end of input ends the session and
/// abandons any run still being polled.
pub async fn run(engine: &ConversationEngine) -> Result<()> {
    let teardown = CancellationToken::new();
    tokio::spawn({
        let teardown = teardown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                teardown.cancel();
            }
        }
    });

    let mut session = ConversationSession::with_cancel(teardown.child_token());
    info!(session_id = %session.id(), "chat session started");
    println!("InnerAlly is listening. Ctrl-C to leave.");

    let mut lines = spawn_line_reader();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = teardown.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line.transpose()? else { break };
        if line.trim().is_empty() {
            continue;
        }

        println!("InnerAlly is responding...");
        if respond(engine, &mut session, &teardown, &line).await == Flow::Stop {
            break;
        }
    }

    session.end();
    println!("\nTake care.");
    info!(
        session_id = %session.id(),
        turns = session.messages().len() / 2,
        "chat session ended"
    );
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Run one turn and report the outcome. A session that could not obtain a
/// thread is replaced so the next line starts over.
async fn respond(
    engine: &ConversationEngine,
    session: &mut ConversationSession,
    teardown: &CancellationToken,
    line: &str,
) -> Flow {
    match engine.run_turn(session, line).await {
        Ok(reply) => {
            println!("innerally> {}\n", reply.content);
            Flow::Continue
        }
        Err(TurnError::Cancelled | TurnError::SessionEnded) => Flow::Stop,
        Err(e) if e.requires_new_session() => {
            eprintln!("Failed to get response: {e}. Try again in a moment.");
            let fresh = ConversationSession::with_cancel(teardown.child_token());
            warn!(
                session_id = %session.id(),
                next_session_id = %fresh.id(),
                error_kind = e.error_kind(),
                "replacing chat session"
            );
            *session = fresh;
            Flow::Continue
        }
        Err(e) => {
            eprintln!("Failed to get response: {e}");
            Flow::Continue
        }
    }
}

/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
