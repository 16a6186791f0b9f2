//! Editor-facing session state: visible text, cursor, roster, status bar.
//!
//! This is everything a rendering surface reads. Text and cursor are owned
//! by the session task; the status bar has its own lock so status updates
//! never contend with document edits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

/// How long a status message stays visible.
const STATUS_VISIBLE_FOR: Duration = Duration::from_secs(3);

/// Mutable editor state, single-owner alongside the document.
#[derive(Debug, Clone)]
pub struct EditorState {
    text: String,
    cursor: usize,
    users: Vec<String>,
    connected: bool,
    scroll_enabled: bool,
}

impl EditorState {
    pub fn new(scroll_enabled: bool) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            users: Vec::new(),
            connected: false,
            scroll_enabled,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the visible text, clamping the cursor into the new bounds.
    pub fn set_text(&mut self, text: String) {
        self.text = text;
        self.cursor = self.cursor.min(self.char_count());
    }

    /// Cursor as a character offset into the visible text.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.char_count());
    }

    /// Move the cursor, clamped to the text bounds.
    pub fn move_cursor(&mut self, delta: isize) {
        let moved = self.cursor as isize + delta;
        self.cursor = moved.clamp(0, self.char_count() as isize) as usize;
    }

    /// A remote insert at a visible position at or before the cursor
    /// pushes the cursor right by the inserted value's length.
    pub fn adjust_for_remote_insert(&mut self, position: usize, value: &str) {
        if position.saturating_sub(1) <= self.cursor {
            self.cursor = (self.cursor + value.chars().count()).min(self.char_count());
        }
    }

    /// A remote delete at a visible position at or before the cursor pulls
    /// the cursor left by exactly one character.
    pub fn adjust_for_remote_delete(&mut self, position: usize) {
        if position.saturating_sub(1) <= self.cursor {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Parse the comma-delimited presence roster.
    pub fn set_users(&mut self, roster: &str) {
        self.users = roster
            .split(',')
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn scroll_enabled(&self) -> bool {
        self.scroll_enabled
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Status {
    pub message: String,
    pub visible: bool,
}

/// Shared status-bar state, read by the drawing surface.
#[derive(Clone, Default)]
pub struct StatusBar {
    inner: Arc<RwLock<Status>>,
}

impl StatusBar {
    pub async fn current(&self) -> Status {
        self.inner.read().await.clone()
    }

    async fn show(&self, message: String) {
        let mut status = self.inner.write().await;
        status.message = message;
        status.visible = true;
    }

    async fn hide(&self) {
        self.inner.write().await.visible = false;
    }
}

/// Display each queued status message for three seconds, then clear it.
pub async fn run_status_display(bar: StatusBar, mut rx: mpsc::Receiver<String>) {
    while let Some(message) = rx.recv().await {
        tracing::info!("status: {message}");
        bar.show(message).await;
        tokio::time::sleep(STATUS_VISIBLE_FOR).await;
        bar.hide().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_moves_are_clamped() {
        let mut editor = EditorState::new(false);
        editor.set_text("abc".to_string());

        editor.move_cursor(-1);
        assert_eq!(editor.cursor(), 0);
        editor.move_cursor(10);
        assert_eq!(editor.cursor(), 3);
        editor.move_cursor(-2);
        assert_eq!(editor.cursor(), 1);
    }

    #[test]
    fn test_set_text_clamps_cursor() {
        let mut editor = EditorState::new(false);
        editor.set_text("abcdef".to_string());
        editor.set_cursor(6);
        editor.set_text("ab".to_string());
        assert_eq!(editor.cursor(), 2);
    }

    #[test]
    fn test_remote_insert_before_cursor_shifts_right() {
        let mut editor = EditorState::new(false);
        editor.set_text("abc".to_string());
        editor.set_cursor(2);

        editor.set_text("xabc".to_string());
        editor.adjust_for_remote_insert(1, "x");
        assert_eq!(editor.cursor(), 3);
    }

    #[test]
    fn test_remote_insert_after_cursor_leaves_cursor() {
        let mut editor = EditorState::new(false);
        editor.set_text("abc".to_string());
        editor.set_cursor(1);

        editor.set_text("abcx".to_string());
        editor.adjust_for_remote_insert(4, "x");
        assert_eq!(editor.cursor(), 1);
    }

    #[test]
    fn test_remote_delete_shifts_left_by_one() {
        let mut editor = EditorState::new(false);
        editor.set_text("abc".to_string());
        editor.set_cursor(2);

        editor.set_text("bc".to_string());
        editor.adjust_for_remote_delete(1);
        assert_eq!(editor.cursor(), 1);

        // Never below zero.
        editor.set_cursor(0);
        editor.adjust_for_remote_delete(1);
        assert_eq!(editor.cursor(), 0);
    }

    #[test]
    fn test_roster_parsing_drops_empty_names() {
        let mut editor = EditorState::new(false);
        editor.set_users("Alice,,Bob,");
        assert_eq!(editor.users(), ["Alice".to_string(), "Bob".to_string()]);

        editor.set_users("");
        assert!(editor.users().is_empty());
    }

    #[tokio::test]
    async fn test_status_bar_shows_and_hides() {
        tokio::time::pause();
        let bar = StatusBar::default();
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(run_status_display(bar.clone(), rx));

        tx.send("Saved".to_string()).await.unwrap();
        tokio::task::yield_now().await;

        // Visible immediately after delivery.
        let mut waited = Duration::ZERO;
        while !bar.current().await.visible && waited < Duration::from_secs(1) {
            tokio::time::advance(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
        let status = bar.current().await;
        assert!(status.visible);
        assert_eq!(status.message, "Saved");

        // Hidden again after the display window passes.
        tokio::time::advance(Duration::from_secs(4)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!bar.current().await.visible);
    }
}
