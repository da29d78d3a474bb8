use thiserror::Error;

use crate::identifiers::WorkItemId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("work item {0} was not found")]
    NotFound(WorkItemId),
    #[error("failed to fetch relations for work item {id}: {message}")]
    RelationFetch { id: WorkItemId, message: String },
    #[error("repository configuration missing: {0}")]
    RepositoryConfigurationMissing(String),
    #[error("branch '{0}' was not found")]
    BranchNotFound(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("source branch ({0}) cannot be the same as target branch ({0})")]
    SameSourceAndTarget(String),
}

impl CoreError {
    /// Lifts a collaborator failure from the edge-listing step into the
    /// resolution taxonomy. `NotFound` is kept as-is.
    pub fn into_relation_fetch(self, id: WorkItemId) -> Self {
        match self {
            Self::NotFound(missing) => Self::NotFound(missing),
            Self::RelationFetch { id, message } => Self::RelationFetch { id, message },
            other => Self::RelationFetch {
                id,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;
    use crate::identifiers::WorkItemId;

    #[test]
    fn relation_fetch_wraps_transport_failures() {
        let error = CoreError::DependencyUnavailable("az exited with status 1".to_owned())
            .into_relation_fetch(WorkItemId::new(7));
        assert_eq!(
            error.to_string(),
            "failed to fetch relations for work item 7: dependency unavailable: az exited with status 1"
        );
    }

    #[test]
    fn relation_fetch_preserves_not_found() {
        let error = CoreError::NotFound(WorkItemId::new(7)).into_relation_fetch(WorkItemId::new(7));
        assert_eq!(error, CoreError::NotFound(WorkItemId::new(7)));
    }
}
