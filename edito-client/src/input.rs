//! Local input surface: turns the stdin byte stream into edit commands.
//!
//! Key mapping, matching the editor's bindings:
//!
//! | input            | command                  |
//! |------------------|--------------------------|
//! | printable char   | `Insert(ch)`             |
//! | Enter / `\r`     | `Insert('\n')`           |
//! | Tab              | four `Insert(' ')`       |
//! | Backspace / DEL  | `Delete`                 |
//! | Ctrl-S           | `Save`                   |
//! | Ctrl-L           | `Load`                   |
//!
//! Other control bytes are dropped. Bytes that are not valid UTF-8 are
//! skipped once a full (four-byte) window shows no decodable character.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::session::EditCommand;

const CTRL_S: char = '\u{13}';
const CTRL_L: char = '\u{c}';
const BACKSPACE: char = '\u{8}';
const DELETE: char = '\u{7f}';

/// Spawn the task that feeds stdin into the session's command queue.
pub fn spawn_stdin_reader(commands: mpsc::Sender<EditCommand>) {
    tokio::spawn(pump(tokio::io::stdin(), commands));
}

/// Read the byte stream to EOF, translating it into edit commands.
pub async fn pump(mut reader: impl AsyncRead + Unpin, commands: mpsc::Sender<EditCommand>) {
    let mut buf = [0u8; 1024];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);
        for command in decode(&mut pending) {
            if commands.send(command).await.is_err() {
                return; // session gone
            }
        }
    }
    tracing::debug!("input stream ended");
}

/// Translate the decodable prefix of `pending` into commands, leaving any
/// incomplete UTF-8 tail in place for the next read.
fn decode(pending: &mut Vec<u8>) -> Vec<EditCommand> {
    let (text, consumed) = utf8_prefix(pending);
    let mut commands = Vec::new();
    for ch in text.chars() {
        commands_for(ch, &mut commands);
    }
    if consumed == 0 && pending.len() >= 4 {
        // No decodable character in a full window: garbage, drop it.
        pending.clear();
    } else {
        pending.drain(..consumed);
    }
    commands
}

/// The longest valid UTF-8 prefix of `bytes` and its length.
fn utf8_prefix(bytes: &[u8]) -> (String, usize) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), bytes.len()),
        Err(e) => {
            let valid = e.valid_up_to();
            let text = std::str::from_utf8(&bytes[..valid]).unwrap_or("");
            (text.to_string(), valid)
        }
    }
}

fn commands_for(ch: char, out: &mut Vec<EditCommand>) {
    match ch {
        BACKSPACE | DELETE => out.push(EditCommand::Delete),
        CTRL_S => out.push(EditCommand::Save),
        CTRL_L => out.push(EditCommand::Load),
        '\t' => out.extend([EditCommand::Insert(' '); 4]),
        '\n' | '\r' => out.push(EditCommand::Insert('\n')),
        ch if ch.is_control() => {}
        ch => out.push(EditCommand::Insert(ch)),
    }
}
