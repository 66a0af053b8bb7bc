//! ## Crate layout
//! - `core`: entity traits, values, statement compilation, execution and
//!   the persistence facade.
//! - `macros`: `#[derive(Entity)]` and `#[derive(FieldEnum)]`.
//!
//! The modules of `core` are re-exported at the top level so derive
//! output can name them as `::widedb::...`.

pub use widedb_core as core;
pub use widedb_derive as macros;

pub use widedb_core::{config, db, error, model, obs, traits, value};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use widedb_core::{DEFAULT_REPLICATION_FACTOR, Error, SYSTEM_SCHEMA_KEYSPACE};
pub use widedb_derive::{Entity, FieldEnum};

///
/// Prelude
/// Entity vocabulary, the facade and the bundled session.
///

pub mod prelude {
    pub use crate::{
        core::{
            config::PersistenceConfig,
            db::{Consistency, IndexRange, MemorySession, Persistence, Session},
            prelude::*,
        },
        macros::{Entity, FieldEnum},
    };
}
