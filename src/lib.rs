//! cardcode - code editing support for card template editors
//!
//! Syntax highlighting for mixed HTML/CSS/JavaScript templates, bracket and
//! tag pair matching, cursor memory across template slots, find/replace,
//! autocomplete and round trips through an external editor.
//!
//! The host's editing widget is reached through [`host::EditorHost`];
//! [`session::EditorSession`] wires host events to the rest.

pub mod clipboard;
pub mod complete;
pub mod config;
pub mod cursor_store;
pub mod edit;
pub mod error;
pub mod external;
pub mod host;
pub mod logging;
pub mod pairs;
pub mod render;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod syntax;

pub use error::{Error, Result};
