use std::fmt::{self, Display};

///
/// IndexDescriptor
/// Runtime-only descriptor for one secondary index.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexDescriptor {
    name: String,
    column: String,
}

impl IndexDescriptor {
    #[must_use]
    pub(crate) fn new(column_family: &str, column: &str) -> Self {
        Self {
            name: format!("{column_family}_{column}_idx"),
            column: column.to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.column)
    }
}
