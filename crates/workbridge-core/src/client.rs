use crate::error::CoreError;
use crate::identifiers::WorkItemId;
use crate::model::{NewPullRequest, PullRequestMatch, RepositoryRef, WorkItemRecord};

/// Remote work tracking and repository service.
///
/// Every call may fail with a transport error. Implementations report a
/// missing work item as [`CoreError::NotFound`] so callers can tell it apart
/// from an unreachable service.
#[async_trait::async_trait]
pub trait RemoteWorkClient: Send + Sync {
    async fn get_item(
        &self,
        id: WorkItemId,
        expand_relations: bool,
    ) -> Result<WorkItemRecord, CoreError>;

    /// Full ref names (`refs/heads/...`) of every branch in the repository.
    async fn list_branches(&self, repository: &RepositoryRef) -> Result<Vec<String>, CoreError>;

    async fn list_active_review_requests(
        &self,
        repository: &RepositoryRef,
        source_branch: &str,
    ) -> Result<Vec<PullRequestMatch>, CoreError>;

    async fn get_repository_default_branch(
        &self,
        repository: &RepositoryRef,
    ) -> Result<String, CoreError>;

    async fn find_branch_object_id(
        &self,
        _repository: &RepositoryRef,
        _branch: &str,
    ) -> Result<Option<String>, CoreError> {
        Err(CoreError::DependencyUnavailable(
            "find_branch_object_id is not implemented by this client".to_owned(),
        ))
    }

    async fn create_branch(
        &self,
        _repository: &RepositoryRef,
        _branch: &str,
        _object_id: &str,
    ) -> Result<(), CoreError> {
        Err(CoreError::DependencyUnavailable(
            "create_branch is not implemented by this client".to_owned(),
        ))
    }

    /// Sign-in name of the account the client acts as.
    async fn current_user(&self) -> Result<String, CoreError> {
        Err(CoreError::DependencyUnavailable(
            "current_user is not implemented by this client".to_owned(),
        ))
    }

    async fn update_work_item_state(
        &self,
        _id: WorkItemId,
        _state: &str,
        _assigned_to: Option<&str>,
    ) -> Result<(), CoreError> {
        Err(CoreError::DependencyUnavailable(
            "update_work_item_state is not implemented by this client".to_owned(),
        ))
    }

    /// Opens a pull request and returns its id.
    async fn create_pull_request(
        &self,
        _repository: &RepositoryRef,
        _request: &NewPullRequest,
    ) -> Result<u64, CoreError> {
        Err(CoreError::DependencyUnavailable(
            "create_pull_request is not implemented by this client".to_owned(),
        ))
    }

    async fn link_work_item_to_pull_request(
        &self,
        _repository: &RepositoryRef,
        _pull_request_id: u64,
        _id: WorkItemId,
    ) -> Result<(), CoreError> {
        Err(CoreError::DependencyUnavailable(
            "link_work_item_to_pull_request is not implemented by this client".to_owned(),
        ))
    }
}
