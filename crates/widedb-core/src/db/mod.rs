pub mod builder;
pub mod compile;
pub mod consistency;
pub mod executor;
pub mod memory;
pub mod persistence;
pub mod registry;
pub mod row;
pub mod schema;
pub mod session;
pub mod statement;

pub use builder::{BatchBuilder, DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use compile::{IndexRange, StatementCompiler};
pub use consistency::Consistency;
pub use executor::{ConsistencyError, Executor, ReadError, WriteError};
pub use memory::MemorySession;
pub use persistence::{Persistence, PersistenceBuilder};
pub use registry::DescriptorCache;
pub use row::{Row, RowReader, RowSet};
pub use schema::{ReplicaStrategy, Replication, SchemaAction, SchemaError, SchemaGuard};
pub use session::{Session, SessionError, SessionErrorKind};
pub use statement::{Statement, StatementKind, TableRef};
