//! Bangtags: an inline command language for post text.
//!
//! Authors embed `#!verb:arg:…` commands in a post.  Processing evaluates
//! them against the author's persistent variables and the surrounding
//! platform (the [`host::Host`] traits), producing the final text and side
//! effects such as tags, visibility, moderation actions and announcements.
//!
//! The entry point is [`bangtag::process`].  [`memory::MemoryHost`] is an
//! in-process host used by the CLI and the tests.

pub mod bangtag;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod memory;
pub mod post;
pub mod script;
pub mod tags;
pub mod var;

pub use bangtag::{process, Outcome};
pub use config::Config;
pub use error::{Error, Result};
