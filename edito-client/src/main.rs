//! Collaborative editor client.
//!
//! Connects to a relay, joins under a chosen or generated name, and runs
//! the editing session until interrupted. The session owns the document;
//! a rendering surface can read everything it needs from the session's
//! editor state and status bar.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use edito_client::session::{Session, SessionConfig};
use edito_client::{input, logging, names};
use edito_collab::client::CollabClient;
use edito_collab::protocol::Message;
use edito_crdt::Document;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "edito", about = "Collaborative plain-text editor")]
struct Flags {
    /// Network address of the relay server.
    #[arg(long, default_value = "localhost:8080")]
    server: String,

    /// Prompt for a display name instead of generating one.
    #[arg(long)]
    login: bool,

    /// File to load the editor content from and save it to.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Verbose logging to ~/.edito/editor-debug.log.
    #[arg(long)]
    debug: bool,

    /// Enable viewport scrolling with the cursor.
    #[arg(long)]
    scroll: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let flags = Flags::parse();

    if let Err(e) = logging::init(flags.debug) {
        eprintln!("Logger error, exiting: {e}");
        return ExitCode::FAILURE;
    }

    let name = if flags.login {
        match prompt_name() {
            Some(name) => name,
            None => {
                eprintln!("No name given");
                return ExitCode::FAILURE;
            }
        }
    } else {
        names::silly_name()
    };

    let doc = match &flags.file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match Document::load(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    eprintln!("Error loading document: {e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Document::new(),
    };

    let mut client = match CollabClient::connect(&flags.server).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error connecting to server: {e}");
            return ExitCode::FAILURE;
        }
    };
    let events = client
        .take_events()
        .expect("events are available right after connect");

    if let Err(e) = client.send(Message::join(&name)).await {
        eprintln!("Error joining session: {e}");
        return ExitCode::FAILURE;
    }
    tracing::info!("joined as {name}");

    // Local edits arrive from stdin; the session consumes them alongside
    // remote events in its single loop.
    let (commands_tx, commands_rx) = mpsc::channel(256);
    input::spawn_stdin_reader(commands_tx);

    let mut session = Session::new(
        doc,
        client.sender(),
        events,
        commands_rx,
        SessionConfig {
            file: flags.file,
            scroll: flags.scroll,
            debug: flags.debug,
        },
    );
    session.run().await;

    println!("Exiting session");
    ExitCode::SUCCESS
}

/// Read a display name from stdin.
fn prompt_name() -> Option<String> {
    print!("Enter your name: ");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    let name = line.trim().to_string();
    (!name.is_empty()).then_some(name)
}
