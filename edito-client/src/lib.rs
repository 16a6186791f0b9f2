//! # edito-client — collaborative editor client
//!
//! The pieces behind the `edito` binary:
//!
//! - [`session`] — the editing session, sole owner of the local
//!   [`edito_crdt::Document`]
//! - [`editor`] — editor-facing state (text, cursor, roster, status bar)
//!   that a rendering surface reads
//! - [`input`] — stdin byte stream → edit commands
//! - [`names`] — display-name generation
//! - [`logging`] — file logging under `~/.edito/`

pub mod editor;
pub mod input;
pub mod logging;
pub mod names;
pub mod session;
