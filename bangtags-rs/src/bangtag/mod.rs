//! Bangtag interpreter.
//!
//! Post text is split into plain text and `#!verb:arg:…` commands
//! ([`token`], [`command`]).  A single left-to-right pass ([`interp`])
//! routes text through a stack of open scopes ([`scope`]) and text filters
//! ([`filter`]), queueing work that must wait for the pass or the save
//! ([`deferred`]).  The resulting chunks are joined and whitespace-normalized
//! ([`assemble`]).  [`session`] ties the pieces to a [`Host`](crate::host::Host).
//!
//! # Example
//!
//! ```rust
//! use bangtags::bangtag::{process, Outcome};
//! use bangtags::config::Config;
//! use bangtags::host::Actor;
//! use bangtags::memory::MemoryHost;
//! use bangtags::post::Post;
//!
//! let mut host = MemoryHost::new();
//! let mut post = Post::new("alice", "#!var:pet:cat my #!var:pet is asleep");
//! let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
//! assert!(matches!(outcome, Outcome::Saved(_)));
//! assert_eq!(post.text, "my cat is asleep");
//! ```

pub mod assemble;
pub mod command;
pub mod deferred;
pub mod filter;
pub mod interp;
pub mod scope;
pub mod session;
pub mod token;

pub use interp::{Interpreter, Pass};
pub use session::{process, Outcome};
