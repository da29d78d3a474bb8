use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::branch_name::{self, head_ref};
use crate::client::RemoteWorkClient;
use crate::default_branch::DefaultBranchResolver;
use crate::error::CoreError;
use crate::identifiers::WorkItemId;
use crate::model::{RepositoryRef, Resolved};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionedBranch {
    Created {
        branch: String,
        base_branch: String,
        object_id: String,
    },
    AlreadyExists {
        branch: String,
    },
}

impl ProvisionedBranch {
    pub fn branch(&self) -> &str {
        match self {
            Self::Created { branch, .. } | Self::AlreadyExists { branch } => branch,
        }
    }
}

/// Creates the canonical branch for a work item on the remote.
#[derive(Clone)]
pub struct BranchProvisioner {
    client: Arc<dyn RemoteWorkClient>,
    default_branch: DefaultBranchResolver,
}

impl BranchProvisioner {
    pub fn new(client: Arc<dyn RemoteWorkClient>, default_branch: DefaultBranchResolver) -> Self {
        Self {
            client,
            default_branch,
        }
    }

    pub async fn provision_branch(
        &self,
        repository: &RepositoryRef,
        id: WorkItemId,
        title: &str,
        prefix: &str,
    ) -> Result<Resolved<ProvisionedBranch>, CoreError> {
        let branch = branch_name::encode(id, title, prefix);
        if self
            .client
            .find_branch_object_id(repository, &branch)
            .await?
            .is_some()
        {
            return Ok(Resolved::clean(ProvisionedBranch::AlreadyExists { branch }));
        }

        let (base_branch, warnings) = self.default_branch.target_branch(repository).await.into_parts();
        let object_id = self
            .client
            .find_branch_object_id(repository, &base_branch)
            .await?
            .ok_or_else(|| CoreError::BranchNotFound(base_branch.clone()))?;

        self.client
            .create_branch(repository, &head_ref(&branch), &object_id)
            .await?;
        info!(branch = %branch, base = %base_branch, "created branch");

        Ok(Resolved::new(
            ProvisionedBranch::Created {
                branch,
                base_branch,
                object_id,
            },
            warnings,
        ))
    }
}
