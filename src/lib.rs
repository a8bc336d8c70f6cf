//! YANG Path Index
//!
//! Flattens compiled YANG schema artifacts into a searchable index of every
//! node path, per model release and variant (`state` / `conf`).
//!
//! ## Data flow
//!
//! ```text
//! SchemaSource ──compile──► CompiledSchema ──flatten──► Flattened
//!                                                          │
//!                                    ReleaseIndex::build ◄─┘
//!                                          │
//!          IndexStore (release → variant → index, single-flight builds)
//!                                          │
//!          QueryEngine (exact / partial / search) ──► CommandSynthesizer
//! ```
//!
//! The filesystem-facing collaborators (release discovery, `pyang`, the
//! last-loaded marker) sit behind the traits in [`source`].

pub mod checksum;
pub mod command;
pub mod config;
pub mod error;
pub mod flatten;
pub mod index;
pub mod node;
pub mod query;
pub mod source;
pub mod store;

pub use checksum::Checksum;
pub use command::CommandSynthesizer;
pub use config::PathsConfig;
pub use error::{FlattenError, IndexError, Location, Result};
pub use flatten::{flatten, CompiledSchema, FlattenWarning, Flattened, MissingKeyWarning};
pub use index::ReleaseIndex;
pub use node::{Node, NodeKind, Variant};
pub use query::{normalize_path, Match, MatchKind, QueryEngine};
pub use source::{ArtifactDir, LastLoaded, ReleaseCatalog, SchemaSource};
pub use store::{BuildHandle, BuildStatus, IndexStore, StatusMap};
