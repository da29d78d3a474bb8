use std::sync::Arc;

use serde::Serialize;
use workbridge_config::WorkbridgeConfig;
use workbridge_core::branch_name;
use workbridge_core::context::render_context;
use workbridge_core::urls::{branch_url, pull_request_url, work_item_url};
use workbridge_core::{
    Activation, BranchCandidate, BranchMatcher, BranchProvisioner, CachePolicy, CoreError,
    CreatedPullRequest, DefaultBranchResolver, ProvisionedBranch, PullRequestMatch,
    RelationGraph, RelationGraphResolver, RelationSettings, RemoteWorkClient, RepositoryRef,
    Resolved, StartedWork, WorkItemActivator, WorkItemId, WorkItemIdentity,
};

/// Everything the commands need from the loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbridgeSettings {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub repository: Option<String>,
    pub branch_prefix: String,
    pub source_branch: Option<String>,
    pub cache_policy: CachePolicy,
    pub relations: RelationSettings,
}

impl WorkbridgeSettings {
    pub fn from_config(config: &WorkbridgeConfig) -> Self {
        let repository = config.repository_settings();
        let branches = config.branch_settings();
        Self {
            organization: repository.organization,
            project: repository.project,
            repository: repository.repository,
            branch_prefix: branches.prefix,
            source_branch: branches.source_branch,
            cache_policy: CachePolicy::from_ttl_secs(branches.default_branch_cache_ttl_secs),
            relations: RelationSettings {
                fan_out_limit: config.relation_settings().fan_out_limit,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchReport {
    pub work_item: WorkItemIdentity,
    pub work_item_url: Option<String>,
    pub branches: Vec<BranchCandidate>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReport {
    pub work_item: WorkItemIdentity,
    pub pull_request: Option<PullRequestMatch>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    #[serde(flatten)]
    pub activation: Activation,
    pub work_item_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPullRequestReport {
    pub work_item: WorkItemIdentity,
    pub pull_request: CreatedPullRequest,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReport {
    #[serde(flatten)]
    pub started: StartedWork,
    pub work_item_url: Option<String>,
    pub pull_request_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub work_item: WorkItemIdentity,
    pub relations: RelationGraph,
    pub context: String,
}

/// The wired-up services behind the command-line front end.
pub struct Workbridge {
    settings: WorkbridgeSettings,
    relations: RelationGraphResolver,
    matcher: BranchMatcher,
    provisioner: BranchProvisioner,
    activator: WorkItemActivator,
}

impl Workbridge {
    pub fn new(
        client: Arc<dyn RemoteWorkClient>,
        settings: WorkbridgeSettings,
    ) -> Result<Self, CoreError> {
        let relations = RelationGraphResolver::new(client.clone(), settings.relations)?;
        let default_branch = DefaultBranchResolver::new(
            client.clone(),
            settings.source_branch.clone(),
            settings.cache_policy,
        );
        Ok(Self {
            matcher: BranchMatcher::new(client.clone()),
            provisioner: BranchProvisioner::new(client.clone(), default_branch.clone()),
            activator: WorkItemActivator::new(client, default_branch),
            relations,
            settings,
        })
    }

    pub fn repository(&self) -> Result<RepositoryRef, CoreError> {
        RepositoryRef::from_parts(
            self.settings.organization.as_deref(),
            self.settings.project.as_deref(),
            self.settings.repository.as_deref(),
        )
    }

    pub fn branch_name(&self, id: WorkItemId, title: &str) -> String {
        branch_name::encode(id, title, &self.settings.branch_prefix)
    }

    fn work_item_url(&self, identity: &WorkItemIdentity) -> Option<String> {
        let organization = self.settings.organization.as_deref()?;
        let project = if identity.project.trim().is_empty() {
            self.settings.project.as_deref()?
        } else {
            identity.project.as_str()
        };
        Some(work_item_url(organization, project, identity.id))
    }

    pub async fn branches(&self, id: WorkItemId) -> Result<Resolved<BranchReport>, CoreError> {
        let repository = self.repository()?;
        let work_item = self.relations.fetch_lite(id).await?;
        let (branches, warnings) = self
            .matcher
            .candidate_branches(
                &repository,
                id,
                &work_item.title,
                &self.settings.branch_prefix,
            )
            .await
            .into_parts();
        let urls = branches
            .iter()
            .map(|branch| {
                branch_url(
                    &repository.organization,
                    &repository.project,
                    &repository.repository,
                    branch.as_str(),
                )
            })
            .collect();

        Ok(Resolved::new(
            BranchReport {
                work_item_url: self.work_item_url(&work_item),
                work_item,
                branches,
                urls,
            },
            warnings,
        ))
    }

    pub async fn pull_request(
        &self,
        id: WorkItemId,
    ) -> Result<Resolved<PullRequestReport>, CoreError> {
        let repository = self.repository()?;
        let work_item = self.relations.fetch_lite(id).await?;
        let (pull_request, warnings) = self
            .matcher
            .find_active_review_request(
                &repository,
                id,
                &work_item.title,
                &self.settings.branch_prefix,
            )
            .await
            .into_parts();
        let url = pull_request.as_ref().map(|found| {
            pull_request_url(
                &repository.organization,
                &found.project,
                &repository.repository,
                found.request_id,
            )
        });

        Ok(Resolved::new(
            PullRequestReport {
                work_item,
                pull_request,
                url,
            },
            warnings,
        ))
    }

    pub async fn relations(&self, id: WorkItemId) -> Result<Resolved<RelationGraph>, CoreError> {
        self.relations.resolve(id).await
    }

    pub async fn start_branch(
        &self,
        id: WorkItemId,
    ) -> Result<Resolved<ProvisionedBranch>, CoreError> {
        let repository = self.repository()?;
        let work_item = self.relations.fetch_lite(id).await?;
        self.provisioner
            .provision_branch(
                &repository,
                id,
                &work_item.title,
                &self.settings.branch_prefix,
            )
            .await
    }

    /// Assigns the item to the signed-in user and marks it active.
    pub async fn activate(&self, id: WorkItemId) -> Result<ActivationReport, CoreError> {
        let activation = self.activator.activate(id).await?;
        Ok(ActivationReport {
            work_item_url: self.work_item_url(&activation.work_item),
            activation,
        })
    }

    /// Opens a pull request from the item's canonical branch.
    pub async fn create_pull_request(
        &self,
        id: WorkItemId,
    ) -> Result<Resolved<CreatedPullRequestReport>, CoreError> {
        let repository = self.repository()?;
        let work_item = self.relations.fetch_lite(id).await?;
        let branch = self.branch_name(id, &work_item.title);
        let (pull_request, warnings) = self
            .activator
            .open_pull_request(&repository, &work_item, &branch)
            .await?
            .into_parts();

        Ok(Resolved::new(
            CreatedPullRequestReport {
                url: created_pull_request_url(&repository, &pull_request),
                work_item,
                pull_request,
            },
            warnings,
        ))
    }

    pub async fn start(&self, id: WorkItemId) -> Result<Resolved<StartReport>, CoreError> {
        let repository = self.repository()?;
        let (started, warnings) = self
            .activator
            .start(&repository, id, &self.settings.branch_prefix)
            .await?
            .into_parts();

        Ok(Resolved::new(
            StartReport {
                work_item_url: self.work_item_url(&started.work_item),
                pull_request_url: created_pull_request_url(&repository, &started.pull_request),
                started,
            },
            warnings,
        ))
    }

    pub async fn context(&self, id: WorkItemId) -> Result<Resolved<ContextReport>, CoreError> {
        let (work_item, graph) =
            tokio::try_join!(self.relations.fetch_lite(id), self.relations.resolve(id))?;
        let (relations, warnings) = graph.into_parts();

        Ok(Resolved::new(
            ContextReport {
                context: render_context(&work_item, &relations),
                work_item,
                relations,
            },
            warnings,
        ))
    }
}

fn created_pull_request_url(repository: &RepositoryRef, created: &CreatedPullRequest) -> String {
    pull_request_url(
        &repository.organization,
        &created.project,
        &repository.repository,
        created.request_id,
    )
}
