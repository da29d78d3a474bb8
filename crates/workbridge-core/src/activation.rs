//! Picking up a work item: assign it to the signed-in user, mark it active,
//! create its branch and open a pull request linked back to it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::branch_name::short_branch_name;
use crate::client::RemoteWorkClient;
use crate::default_branch::DefaultBranchResolver;
use crate::error::CoreError;
use crate::identifiers::WorkItemId;
use crate::model::{
    CreatedPullRequest, NewPullRequest, RepositoryRef, ResolutionWarning, Resolved,
    WorkItemIdentity,
};
use crate::provisioning::{BranchProvisioner, ProvisionedBranch};

pub const ACTIVE_STATE: &str = "Active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub work_item: WorkItemIdentity,
    pub assigned_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedWork {
    pub work_item: WorkItemIdentity,
    pub assigned_to: String,
    pub branch: ProvisionedBranch,
    pub pull_request: CreatedPullRequest,
}

#[derive(Clone)]
pub struct WorkItemActivator {
    client: Arc<dyn RemoteWorkClient>,
    default_branch: DefaultBranchResolver,
    provisioner: BranchProvisioner,
}

impl WorkItemActivator {
    pub fn new(client: Arc<dyn RemoteWorkClient>, default_branch: DefaultBranchResolver) -> Self {
        Self {
            provisioner: BranchProvisioner::new(client.clone(), default_branch.clone()),
            client,
            default_branch,
        }
    }

    pub async fn activate(&self, id: WorkItemId) -> Result<Activation, CoreError> {
        let work_item = self.client.get_item(id, false).await?.identity;
        self.activate_item(work_item).await
    }

    /// Opens a pull request from `source_branch` into the target branch and
    /// links the work item to it. A failed link leaves the pull request in
    /// place and is reported as a warning.
    pub async fn open_pull_request(
        &self,
        repository: &RepositoryRef,
        work_item: &WorkItemIdentity,
        source_branch: &str,
    ) -> Result<Resolved<CreatedPullRequest>, CoreError> {
        let (target_branch, mut warnings) = self
            .default_branch
            .target_branch(repository)
            .await
            .into_parts();
        let source_branch = short_branch_name(source_branch.trim());
        if source_branch == target_branch {
            return Err(CoreError::SameSourceAndTarget(target_branch));
        }

        let request = NewPullRequest {
            source_branch: source_branch.to_owned(),
            target_branch,
            title: pull_request_title(work_item),
            description: pull_request_description(work_item),
        };
        let request_id = self.client.create_pull_request(repository, &request).await?;
        info!(
            pull_request = request_id,
            source = %request.source_branch,
            target = %request.target_branch,
            "created pull request"
        );

        let linked = match self
            .client
            .link_work_item_to_pull_request(repository, request_id, work_item.id)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    pull_request = request_id,
                    work_item = %work_item.id,
                    error = %error,
                    "pull request created but linking the work item failed"
                );
                warnings.push(ResolutionWarning::new(
                    format!("pull request {request_id}"),
                    format!("created but failed to link work item {}: {error}", work_item.id),
                ));
                false
            }
        };

        Ok(Resolved::new(
            CreatedPullRequest {
                request_id,
                title: request.title,
                project: repository.project.clone(),
                source_branch: request.source_branch,
                target_branch: request.target_branch,
                linked,
            },
            warnings,
        ))
    }

    /// Fetch, activate, create the branch, open the pull request. Stops at
    /// the first step that fails. An existing branch is reused.
    pub async fn start(
        &self,
        repository: &RepositoryRef,
        id: WorkItemId,
        prefix: &str,
    ) -> Result<Resolved<StartedWork>, CoreError> {
        let Activation {
            work_item,
            assigned_to,
        } = self.activate(id).await?;

        let (branch, mut warnings) = self
            .provisioner
            .provision_branch(repository, id, &work_item.title, prefix)
            .await?
            .into_parts();
        if let ProvisionedBranch::AlreadyExists { branch } = &branch {
            warn!(branch = %branch, "branch already exists; reusing it");
            warnings.push(ResolutionWarning::new(
                format!("branch {branch}"),
                "branch already exists and was reused",
            ));
        }

        let (pull_request, pull_request_warnings) = self
            .open_pull_request(repository, &work_item, branch.branch())
            .await?
            .into_parts();
        for warning in pull_request_warnings {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }

        Ok(Resolved::new(
            StartedWork {
                work_item,
                assigned_to,
                branch,
                pull_request,
            },
            warnings,
        ))
    }

    async fn activate_item(
        &self,
        mut work_item: WorkItemIdentity,
    ) -> Result<Activation, CoreError> {
        let assigned_to = self.client.current_user().await?.trim().to_owned();
        if assigned_to.is_empty() {
            return Err(CoreError::DependencyUnavailable(
                "could not determine the signed-in user".to_owned(),
            ));
        }

        self.client
            .update_work_item_state(work_item.id, ACTIVE_STATE, Some(&assigned_to))
            .await?;
        info!(work_item = %work_item.id, assigned_to = %assigned_to, "activated work item");
        work_item.state = ACTIVE_STATE.to_owned();

        Ok(Activation {
            work_item,
            assigned_to,
        })
    }
}

pub fn pull_request_title(work_item: &WorkItemIdentity) -> String {
    format!("{}: {}", work_item.id, work_item.title)
}

pub fn pull_request_description(work_item: &WorkItemIdentity) -> String {
    let work_item_type = or_unknown(&work_item.work_item_type);
    format!(
        "Work item #{id} - {work_item_type}\n\n\
         **Work Item Details:**\n\
         - Title: {title}\n\
         - Type: {work_item_type}\n\
         - State: {state}\n\n\
         This PR was created from the work item activation workflow.",
        id = work_item.id,
        title = work_item.title,
        state = or_unknown(&work_item.state),
    )
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "Unknown"
    } else {
        value
    }
}
