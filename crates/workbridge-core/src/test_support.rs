//! In-memory [`RemoteWorkClient`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::branch_name::short_branch_name;
use crate::client::RemoteWorkClient;
use crate::error::CoreError;
use crate::identifiers::WorkItemId;
use crate::model::{
    NewPullRequest, PullRequestMatch, RawRelation, RepositoryRef, WorkItemIdentity,
    WorkItemRecord,
};

const PARENT_LINK: &str = "System.LinkTypes.Hierarchy-Reverse";
const CHILD_LINK: &str = "System.LinkTypes.Hierarchy-Forward";
const RELATED_LINK: &str = "System.LinkTypes.Related";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    GetItem {
        id: WorkItemId,
        expand_relations: bool,
    },
    ListBranches,
    ListActiveReviewRequests {
        source_branch: String,
    },
    GetRepositoryDefaultBranch,
    FindBranchObjectId {
        branch: String,
    },
    CreateBranch {
        branch: String,
        object_id: String,
    },
    CurrentUser,
    UpdateWorkItemState {
        id: WorkItemId,
        state: String,
        assigned_to: Option<String>,
    },
    CreatePullRequest {
        source_branch: String,
        target_branch: String,
    },
    LinkWorkItem {
        pull_request_id: u64,
        id: WorkItemId,
    },
}

#[derive(Debug, Default)]
struct FakeState {
    items: HashMap<WorkItemId, WorkItemIdentity>,
    relations: HashMap<WorkItemId, Vec<RawRelation>>,
    lite_failures: HashMap<WorkItemId, String>,
    relation_failures: HashMap<WorkItemId, String>,
    delays: HashMap<WorkItemId, Duration>,
    branches: Vec<String>,
    branch_listing_failure: Option<String>,
    review_requests: HashMap<String, Vec<PullRequestMatch>>,
    review_failures: HashMap<String, String>,
    default_branch: Option<String>,
    default_branch_failure: Option<String>,
    object_ids: HashMap<String, String>,
    created_branches: Vec<(String, String)>,
    current_user: Option<String>,
    update_failure: Option<String>,
    created_pull_requests: Vec<NewPullRequest>,
    pull_request_failure: Option<String>,
    next_pull_request_id: u64,
    link_failure: Option<String>,
    links: Vec<(u64, WorkItemId)>,
    calls: Vec<RemoteCall>,
}

#[derive(Debug, Default)]
pub struct FakeRemoteClient {
    state: Mutex<FakeState>,
}

impl FakeRemoteClient {
    fn with_state<T>(&self, run: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        run(&mut state)
    }

    pub fn add_item(&self, identity: WorkItemIdentity) {
        self.with_state(|state| {
            state.items.insert(identity.id, identity);
        });
    }

    /// Adds the forward link on the parent and the reverse link on the child,
    /// the way the service reports hierarchy links.
    pub fn link_child(&self, parent: u64, child: u64) {
        self.push_relation(parent, CHILD_LINK, child);
        self.push_relation(child, PARENT_LINK, parent);
    }

    pub fn link_parent(&self, child: u64, parent: u64) {
        self.link_child(parent, child);
    }

    pub fn link_related(&self, left: u64, right: u64) {
        self.push_relation(left, RELATED_LINK, right);
        self.push_relation(right, RELATED_LINK, left);
    }

    pub fn push_relation(&self, from: u64, rel: &str, to: u64) {
        self.with_state(|state| {
            state
                .relations
                .entry(WorkItemId::new(from))
                .or_default()
                .push(RawRelation::new(
                    rel,
                    format!("https://dev.azure.com/fake/_apis/wit/workItems/{to}"),
                ));
        });
    }

    pub fn fail_lite(&self, id: u64, message: &str) {
        self.with_state(|state| {
            state
                .lite_failures
                .insert(WorkItemId::new(id), message.to_owned());
        });
    }

    pub fn fail_relations(&self, id: u64, message: &str) {
        self.with_state(|state| {
            state
                .relation_failures
                .insert(WorkItemId::new(id), message.to_owned());
        });
    }

    pub fn set_delay(&self, id: u64, delay: Duration) {
        self.with_state(|state| {
            state.delays.insert(WorkItemId::new(id), delay);
        });
    }

    pub fn add_branch(&self, ref_name: &str) {
        self.with_state(|state| state.branches.push(ref_name.to_owned()));
    }

    pub fn fail_branch_listing(&self, message: &str) {
        self.with_state(|state| state.branch_listing_failure = Some(message.to_owned()));
    }

    pub fn add_review_request(&self, source_branch: &str, request_id: u64, title: &str) {
        self.with_state(|state| {
            state
                .review_requests
                .entry(source_branch.to_owned())
                .or_default()
                .push(PullRequestMatch {
                    request_id,
                    title: title.to_owned(),
                    project: String::new(),
                    source_branch: source_branch.to_owned(),
                });
        });
    }

    pub fn fail_review_query(&self, source_branch: &str, message: &str) {
        self.with_state(|state| {
            state
                .review_failures
                .insert(source_branch.to_owned(), message.to_owned());
        });
    }

    pub fn set_default_branch(&self, branch: &str) {
        self.with_state(|state| state.default_branch = Some(branch.to_owned()));
    }

    pub fn fail_default_branch(&self, message: &str) {
        self.with_state(|state| state.default_branch_failure = Some(message.to_owned()));
    }

    pub fn set_branch_object_id(&self, branch: &str, object_id: &str) {
        self.with_state(|state| {
            state
                .object_ids
                .insert(branch.to_owned(), object_id.to_owned());
        });
    }

    pub fn set_current_user(&self, user: &str) {
        self.with_state(|state| state.current_user = Some(user.to_owned()));
    }

    pub fn fail_work_item_update(&self, message: &str) {
        self.with_state(|state| state.update_failure = Some(message.to_owned()));
    }

    /// Id handed to the next created pull request; later ones count up.
    pub fn set_next_pull_request_id(&self, request_id: u64) {
        self.with_state(|state| state.next_pull_request_id = request_id);
    }

    pub fn fail_pull_request_creation(&self, message: &str) {
        self.with_state(|state| state.pull_request_failure = Some(message.to_owned()));
    }

    pub fn fail_work_item_link(&self, message: &str) {
        self.with_state(|state| state.link_failure = Some(message.to_owned()));
    }

    pub fn item(&self, id: u64) -> Option<WorkItemIdentity> {
        self.with_state(|state| state.items.get(&WorkItemId::new(id)).cloned())
    }

    pub fn created_pull_requests(&self) -> Vec<NewPullRequest> {
        self.with_state(|state| state.created_pull_requests.clone())
    }

    pub fn links(&self) -> Vec<(u64, WorkItemId)> {
        self.with_state(|state| state.links.clone())
    }

    pub fn created_branches(&self) -> Vec<(String, String)> {
        self.with_state(|state| state.created_branches.clone())
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.with_state(|state| state.calls.clone())
    }

    fn record(&self, call: RemoteCall) {
        self.with_state(|state| state.calls.push(call));
    }
}

#[async_trait::async_trait]
impl RemoteWorkClient for FakeRemoteClient {
    async fn get_item(
        &self,
        id: WorkItemId,
        expand_relations: bool,
    ) -> Result<WorkItemRecord, CoreError> {
        self.record(RemoteCall::GetItem {
            id,
            expand_relations,
        });
        let delay = self.with_state(|state| state.delays.get(&id).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_state(|state| {
            let failure = if expand_relations {
                state.relation_failures.get(&id)
            } else {
                state.lite_failures.get(&id)
            };
            if let Some(message) = failure {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }

            let identity = state.items.get(&id).cloned().ok_or(CoreError::NotFound(id))?;
            let relations = if expand_relations {
                state.relations.get(&id).cloned().unwrap_or_default()
            } else {
                Vec::new()
            };
            Ok(WorkItemRecord {
                identity,
                relations,
            })
        })
    }

    async fn list_branches(&self, _repository: &RepositoryRef) -> Result<Vec<String>, CoreError> {
        self.record(RemoteCall::ListBranches);
        self.with_state(|state| match &state.branch_listing_failure {
            Some(message) => Err(CoreError::DependencyUnavailable(message.clone())),
            None => Ok(state.branches.clone()),
        })
    }

    async fn list_active_review_requests(
        &self,
        _repository: &RepositoryRef,
        source_branch: &str,
    ) -> Result<Vec<PullRequestMatch>, CoreError> {
        self.record(RemoteCall::ListActiveReviewRequests {
            source_branch: source_branch.to_owned(),
        });
        self.with_state(|state| {
            if let Some(message) = state.review_failures.get(source_branch) {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }
            Ok(state
                .review_requests
                .get(source_branch)
                .cloned()
                .unwrap_or_default())
        })
    }

    async fn get_repository_default_branch(
        &self,
        _repository: &RepositoryRef,
    ) -> Result<String, CoreError> {
        self.record(RemoteCall::GetRepositoryDefaultBranch);
        self.with_state(|state| {
            if let Some(message) = &state.default_branch_failure {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }
            Ok(state
                .default_branch
                .clone()
                .unwrap_or_else(|| "refs/heads/main".to_owned()))
        })
    }

    async fn find_branch_object_id(
        &self,
        _repository: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<String>, CoreError> {
        self.record(RemoteCall::FindBranchObjectId {
            branch: branch.to_owned(),
        });
        Ok(self.with_state(|state| state.object_ids.get(branch).cloned()))
    }

    async fn create_branch(
        &self,
        _repository: &RepositoryRef,
        branch: &str,
        object_id: &str,
    ) -> Result<(), CoreError> {
        self.record(RemoteCall::CreateBranch {
            branch: branch.to_owned(),
            object_id: object_id.to_owned(),
        });
        let short_name = short_branch_name(branch);
        self.with_state(|state| {
            if state.object_ids.contains_key(short_name) {
                return Err(CoreError::DependencyUnavailable(format!(
                    "branch '{short_name}' already exists"
                )));
            }
            state
                .created_branches
                .push((branch.to_owned(), object_id.to_owned()));
            state
                .object_ids
                .insert(short_name.to_owned(), object_id.to_owned());
            state.branches.push(format!("refs/heads/{short_name}"));
            Ok(())
        })
    }

    async fn current_user(&self) -> Result<String, CoreError> {
        self.record(RemoteCall::CurrentUser);
        self.with_state(|state| {
            state.current_user.clone().ok_or_else(|| {
                CoreError::DependencyUnavailable("no signed-in account".to_owned())
            })
        })
    }

    async fn update_work_item_state(
        &self,
        id: WorkItemId,
        new_state: &str,
        assigned_to: Option<&str>,
    ) -> Result<(), CoreError> {
        self.record(RemoteCall::UpdateWorkItemState {
            id,
            state: new_state.to_owned(),
            assigned_to: assigned_to.map(str::to_owned),
        });
        self.with_state(|state| {
            if let Some(message) = &state.update_failure {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }
            let item = state.items.get_mut(&id).ok_or(CoreError::NotFound(id))?;
            item.state = new_state.to_owned();
            Ok(())
        })
    }

    async fn create_pull_request(
        &self,
        _repository: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<u64, CoreError> {
        self.record(RemoteCall::CreatePullRequest {
            source_branch: request.source_branch.clone(),
            target_branch: request.target_branch.clone(),
        });
        self.with_state(|state| {
            if let Some(message) = &state.pull_request_failure {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }
            let request_id = state.next_pull_request_id.max(1);
            state.next_pull_request_id = request_id + 1;
            state.created_pull_requests.push(request.clone());
            Ok(request_id)
        })
    }

    async fn link_work_item_to_pull_request(
        &self,
        _repository: &RepositoryRef,
        pull_request_id: u64,
        id: WorkItemId,
    ) -> Result<(), CoreError> {
        self.record(RemoteCall::LinkWorkItem {
            pull_request_id,
            id,
        });
        self.with_state(|state| {
            if let Some(message) = &state.link_failure {
                return Err(CoreError::DependencyUnavailable(message.clone()));
            }
            state.links.push((pull_request_id, id));
            Ok(())
        })
    }
}
