//! Errors raised while applying the scene graph.
//!
//! Only resource exhaustion and structural faults are errors. Misuse of
//! handles or pick stacks (stale handles, unknown nodes, out-of-range
//! stack indices) is reported as `false` / `None` by the operation itself,
//! since it happens routinely after a scene reset.

use crate::id::NodeUid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    /// A buffer needed by a node could not be allocated.
    #[error("out of memory allocating {what} ({requested} elements)")]
    Exhausted {
        what: &'static str,
        requested: usize,
    },

    /// A node was reached again while it was still being applied.
    #[error("node {0} is already being applied (cyclic scene graph)")]
    Cycle(NodeUid),

    /// An error from further down the graph, wrapped with where it happened.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<SceneError>,
    },
}

impl SceneError {
    /// Wrap this error with a description of the enclosing operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        SceneError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, past all context layers.
    pub fn root_cause(&self) -> &SceneError {
        match self {
            SceneError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Alias for `Result<T, SceneError>`.
pub type Result<T> = std::result::Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn context_layers_keep_the_root_cause() {
        let err = SceneError::Exhausted {
            what: "pick colors",
            requested: 12,
        }
        .context("applying vertex list")
        .context("applying scene list");

        assert_eq!(err.to_string(), "applying scene list");
        assert!(err.source().is_some());
        assert!(matches!(err.root_cause(), SceneError::Exhausted { requested: 12, .. }));
    }
}
