//! Navigation error types.

use thiserror::Error;

/// Errors raised while building or combining navigation trees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// Config sections reference parents that do not exist.
    #[error(
        "failed to fully parse navigation configuration; ensure that all referenced parents are existing navigation items: {parents}"
    )]
    UnresolvedParents { parents: String },

    /// Config sections reference each other as parents.
    #[error("navigation items form a parent cycle: {items}")]
    ParentCycle { items: String },

    /// A property value could not be interpreted.
    #[error("navigation item '{item}': invalid value '{value}' for property '{property}'")]
    InvalidProperty {
        item: String,
        property: String,
        value: String,
    },

    /// Two items with conflicting URLs or kinds were merged directly.
    #[error("cannot merge navigation item '{incoming}' into '{existing}': conflict detected")]
    MergeConflict { existing: String, incoming: String },
}
