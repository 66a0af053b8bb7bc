//! Fluent statement builders.
//!
//! Builders accumulate state and check each step against the entity's
//! descriptor. The first failing step is kept and returned by the terminal
//! call, so chains never need `?` between steps.

mod batch;
mod delete;
mod insert;
mod select;
mod update;

pub use batch::BatchBuilder;
pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use update::UpdateBuilder;

use crate::{
    db::compile::StatementCompiler,
    error::{Error, InvalidArgumentError},
    model::EntityDescriptor,
};
use std::sync::Arc;

///
/// Draft
/// A statement body under construction, with the descriptor it targets.
///

pub(crate) struct Draft<T> {
    descriptor: Arc<EntityDescriptor>,
    body: T,
}

impl<T> Draft<T> {
    pub(crate) const fn new(descriptor: Arc<EntityDescriptor>, body: T) -> Self {
        Self { descriptor, body }
    }

    pub(crate) fn into_parts(self) -> (Arc<EntityDescriptor>, T) {
        (self.descriptor, self.body)
    }
}

/// Either a draft in progress or the first error any step produced.
pub(crate) type Pending<T> = Result<Draft<T>, Error>;

/// Apply one builder step unless an earlier step already failed.
pub(crate) fn step<T>(
    pending: Pending<T>,
    f: impl FnOnce(&StatementCompiler<'_>, &mut T) -> Result<(), InvalidArgumentError>,
) -> Pending<T> {
    let mut draft = pending?;
    f(&StatementCompiler::new(&draft.descriptor), &mut draft.body)?;

    Ok(draft)
}

/// Build a draft from a descriptor, keeping any resolution failure.
pub(crate) fn start<T>(
    descriptor: Result<Arc<EntityDescriptor>, Error>,
    f: impl FnOnce(&StatementCompiler<'_>) -> Result<T, InvalidArgumentError>,
) -> Pending<T> {
    let descriptor = descriptor?;
    let body = f(&StatementCompiler::new(&descriptor))?;

    Ok(Draft::new(descriptor, body))
}
