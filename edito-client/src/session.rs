//! The editing session: sole owner of the local document.
//!
//! Exactly one task mutates the document. Local edits, remote operations
//! and snapshot sync all funnel through this loop, so the engine never
//! needs a lock. Outbound traffic goes through the transport's queue;
//! when the connection dies the session drops into read-only local mode
//! and keeps applying local edits without transmitting them.

use std::path::PathBuf;

use edito_collab::client::ClientEvent;
use edito_collab::protocol::{Message, MessageType, OperationKind, WireOperation};
use edito_crdt::Document;
use tokio::sync::mpsc;

use crate::editor::{self, EditorState, StatusBar};

/// Default save target when no `--file` was given.
const DEFAULT_SAVE_PATH: &str = "editor-content.txt";

/// A local editing action, produced by the input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    /// Insert one character at the cursor.
    Insert(char),
    /// Delete the character before the cursor.
    Delete,
    /// Write the document to the configured file.
    Save,
    /// Re-read the configured file into the document.
    Load,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Load/save path.
    pub file: Option<PathBuf>,
    /// Viewport scrolling, forwarded to the editor surface.
    pub scroll: bool,
    /// Dump document state after every remote frame.
    pub debug: bool,
}

pub struct Session {
    doc: Document,
    editor: EditorState,
    outgoing: mpsc::Sender<Message>,
    events: mpsc::Receiver<ClientEvent>,
    commands: mpsc::Receiver<EditCommand>,
    status_tx: mpsc::Sender<String>,
    status: StatusBar,
    file: Option<PathBuf>,
    debug: bool,
}

impl Session {
    pub fn new(
        doc: Document,
        outgoing: mpsc::Sender<Message>,
        events: mpsc::Receiver<ClientEvent>,
        commands: mpsc::Receiver<EditCommand>,
        config: SessionConfig,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::channel(100);
        let status = StatusBar::default();
        tokio::spawn(editor::run_status_display(status.clone(), status_rx));

        let mut editor = EditorState::new(config.scroll);
        editor.set_text(doc.content());
        editor.set_connected(true);

        Self {
            doc,
            editor,
            outgoing,
            events,
            commands,
            status_tx,
            status,
            file: config.file,
            debug: config.debug,
        }
    }

    pub fn content(&self) -> String {
        self.doc.content()
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn status_bar(&self) -> &StatusBar {
        &self.status
    }

    /// Serve until interrupted. Saves on the way out.
    ///
    /// One loop consumes everything that may touch the document: remote
    /// events, local edit commands, and the shutdown signal. Local edits
    /// keep working after a disconnect; they just stop being transmitted.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                event = self.events.recv(), if self.editor.is_connected() => {
                    match event {
                        Some(ClientEvent::Message(msg)) => self.handle_message(msg).await,
                        Some(ClientEvent::Disconnected) | None => {
                            self.editor.set_connected(false);
                            self.post_status("Lost connection").await;
                        }
                    }
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    self.save().await;
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: EditCommand) {
        match command {
            EditCommand::Insert(ch) => self.insert_char(ch).await,
            EditCommand::Delete => self.delete_char().await,
            EditCommand::Save => self.save().await,
            EditCommand::Load => self.load().await,
        }
    }

    async fn handle_message(&mut self, msg: Message) {
        match msg.kind {
            MessageType::DocSync => {
                if let Some(remote) = msg.document {
                    tracing::info!("docSync received, adopting remote document");
                    let site = self.doc.site();
                    self.doc = remote;
                    self.doc.set_site(site);
                    self.editor.set_text(self.doc.content());
                }
            }
            MessageType::DocReq => {
                tracing::info!("docReq received, sending local document to {}", msg.id);
                let reply = Message::doc_sync(self.doc.clone(), msg.id);
                self.transmit(reply).await;
            }
            MessageType::SiteId => match msg.text.parse::<u64>() {
                Ok(site_id) => {
                    self.doc.set_site_id(site_id);
                    tracing::info!("assigned site id {site_id}");
                }
                Err(e) => tracing::error!("unparseable site id {:?}: {e}", msg.text),
            },
            MessageType::Join => {
                self.post_status(format!("{} joined", msg.username)).await;
            }
            MessageType::Users => {
                self.editor.set_users(&msg.text);
            }
            MessageType::Operation => {
                if let Some(op) = msg.operation {
                    self.apply_remote(op);
                }
            }
            MessageType::Unknown => {
                tracing::debug!("ignoring frame of unknown kind");
            }
        }
        self.log_document();
    }

    fn apply_remote(&mut self, op: WireOperation) {
        match op.kind {
            OperationKind::Insert => {
                tracing::debug!("remote insert {:?} at position {}", op.value, op.position);
                if let Err(e) = self.doc.generate_insert(op.position, op.value.clone()) {
                    tracing::error!("remote insert failed: {e}");
                }
                self.editor.set_text(self.doc.content());
                self.editor.adjust_for_remote_insert(op.position, &op.value);
            }
            OperationKind::Delete => {
                tracing::debug!("remote delete at position {}", op.position);
                self.doc.generate_delete(op.position);
                // Adjust before set_text so the clamp sees the final cursor.
                self.editor.adjust_for_remote_delete(op.position);
                self.editor.set_text(self.doc.content());
            }
        }
    }

    /// Insert a character at the cursor and put the edit on the wire.
    pub async fn insert_char(&mut self, ch: char) {
        let position = self.editor.cursor() + 1;
        tracing::debug!("local insert {ch:?} at position {position}");
        if let Err(e) = self.doc.generate_insert(position, ch.to_string()) {
            tracing::error!("local insert failed: {e}");
        }
        self.editor.set_text(self.doc.content());
        self.editor.move_cursor(1);
        self.transmit(Message::operation(WireOperation::insert(
            self.editor.cursor(),
            ch.to_string(),
        )))
        .await;
    }

    /// Delete the character before the cursor and put the edit on the wire.
    pub async fn delete_char(&mut self) {
        let position = self.editor.cursor();
        if position == 0 {
            return;
        }
        tracing::debug!("local delete at position {position}");
        self.doc.generate_delete(position);
        self.editor.move_cursor(-1);
        self.editor.set_text(self.doc.content());
        self.transmit(Message::operation(WireOperation::delete(position)))
            .await;
    }

    /// Write the visible content to the configured path.
    pub async fn save(&mut self) {
        let path = self
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_PATH));
        match std::fs::write(&path, self.doc.save()) {
            Ok(()) => {
                self.post_status(format!("Saved to {}", path.display()))
                    .await
            }
            Err(e) => {
                tracing::error!("failed to save to {}: {e}", path.display());
                self.post_status(format!("Failed to save to {}", path.display()))
                    .await;
            }
        }
    }

    /// Re-read the configured file, replacing the local document.
    ///
    /// The replacement replays the text as local inserts on the current
    /// site, so identities stay unique; no snapshot is broadcast — other
    /// peers pick the content up through the usual `docReq` path.
    pub async fn load(&mut self) {
        let Some(path) = self.file.clone() else {
            self.post_status("No file to load").await;
            return;
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("failed to load from {}: {e}", path.display());
                self.post_status(format!("Failed to load from {}", path.display()))
                    .await;
                return;
            }
        };
        match Document::load_with_site(self.doc.site(), &text) {
            Ok(doc) => {
                self.doc = doc;
                self.editor.set_cursor(0);
                self.editor.set_text(self.doc.content());
                self.post_status(format!("Loaded from {}", path.display()))
                    .await;
            }
            Err(e) => {
                tracing::error!("failed to replay {}: {e}", path.display());
                self.post_status(format!("Failed to load from {}", path.display()))
                    .await;
            }
        }
    }

    /// Send if connected; on failure drop into read-only local mode.
    async fn transmit(&mut self, msg: Message) {
        if !self.editor.is_connected() {
            return;
        }
        if self.outgoing.send(msg).await.is_err() {
            self.editor.set_connected(false);
            self.post_status("Lost connection").await;
        }
    }

    async fn post_status(&self, message: impl Into<String>) {
        let _ = self.status_tx.send(message.into()).await;
    }

    fn log_document(&self) {
        if !self.debug {
            return;
        }
        tracing::trace!("---DOCUMENT STATE---");
        for (i, c) in self.doc.characters().iter().enumerate() {
            tracing::trace!(
                "index: {i}  value: {:?}  ID: {}  IDPrev: {}  IDNext: {}",
                c.value,
                c.id,
                c.id_previous,
                c.id_next,
            );
        }
    }
}
