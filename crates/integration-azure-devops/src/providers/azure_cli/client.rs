use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use workbridge_core::branch_name::{head_ref, short_branch_name};
use workbridge_core::{
    CoreError, NewPullRequest, PullRequestMatch, RemoteWorkClient, RepositoryRef, WorkItemId,
    WorkItemRecord,
};

use super::records::{AzGitRef, AzPullRequest, AzRepository, AzWorkItem};
use super::runner::{CommandRunner, ProcessCommandRunner};
use super::safety_guards::{
    sanitize_command_output_text, truncate_for_error, validate_command_binary_path,
};
use super::ENV_AZ_BIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzCliClientConfig {
    pub binary: PathBuf,
    pub allow_unsafe_command_paths: bool,
    pub command_timeout: Option<Duration>,
    /// Passed to `az boards work-item show`, which takes no repository.
    pub organization: Option<String>,
}

impl Default for AzCliClientConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("az"),
            allow_unsafe_command_paths: false,
            command_timeout: None,
            organization: None,
        }
    }
}

/// [`RemoteWorkClient`] that shells out to the Azure CLI (`az`) with the
/// `azure-devops` extension installed and signed in.
pub struct AzCliClient<R: CommandRunner = ProcessCommandRunner> {
    pub(super) runner: R,
    binary: PathBuf,
    allow_unsafe_command_paths: bool,
    command_timeout: Option<Duration>,
    organization: Option<String>,
}

impl AzCliClient<ProcessCommandRunner> {
    pub fn from_config(config: AzCliClientConfig) -> Result<Self, CoreError> {
        Self::new(ProcessCommandRunner, config)
    }
}

impl<R: CommandRunner> AzCliClient<R> {
    pub fn new(runner: R, config: AzCliClientConfig) -> Result<Self, CoreError> {
        if config.binary.as_os_str().is_empty() {
            return Err(CoreError::Configuration(format!(
                "{ENV_AZ_BIN} is set but empty. Provide a valid az binary path or unset it."
            )));
        }
        Ok(Self {
            runner,
            binary: config.binary,
            allow_unsafe_command_paths: config.allow_unsafe_command_paths,
            command_timeout: config.command_timeout,
            organization: config
                .organization
                .map(|organization| organization.trim().to_owned())
                .filter(|organization| !organization.is_empty()),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub(super) fn work_item_show_args(
        id: WorkItemId,
        expand_relations: bool,
        organization: Option<&str>,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("boards"),
            OsString::from("work-item"),
            OsString::from("show"),
            OsString::from("--id"),
            OsString::from(id.to_string()),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        if expand_relations {
            args.push(OsString::from("--expand"));
            args.push(OsString::from("relations"));
        }
        if let Some(organization) = organization {
            args.push(OsString::from("--organization"));
            args.push(OsString::from(organization));
        }
        args
    }

    pub(super) fn list_refs_args(repository: &RepositoryRef, filter: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("repos"),
            OsString::from("ref"),
            OsString::from("list"),
            OsString::from("--filter"),
            OsString::from(filter),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(Self::repository_scope_args(repository));
        args
    }

    pub(super) fn active_pull_requests_args(
        repository: &RepositoryRef,
        source_branch: &str,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("repos"),
            OsString::from("pr"),
            OsString::from("list"),
            OsString::from("--source-branch"),
            OsString::from(source_branch),
            OsString::from("--status"),
            OsString::from("active"),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(Self::repository_scope_args(repository));
        args
    }

    pub(super) fn repository_show_args(repository: &RepositoryRef) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("repos"),
            OsString::from("show"),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(Self::repository_scope_args(repository));
        args
    }

    pub(super) fn create_ref_args(
        repository: &RepositoryRef,
        branch: &str,
        object_id: &str,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("repos"),
            OsString::from("ref"),
            OsString::from("create"),
            OsString::from("--name"),
            OsString::from(head_ref(branch)),
            OsString::from("--object-id"),
            OsString::from(object_id),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(Self::repository_scope_args(repository));
        args
    }

    pub(super) fn current_user_args() -> Vec<OsString> {
        vec![
            OsString::from("account"),
            OsString::from("show"),
            OsString::from("--query"),
            OsString::from("user.name"),
            OsString::from("--output"),
            OsString::from("tsv"),
        ]
    }

    pub(super) fn work_item_update_args(
        id: WorkItemId,
        state: &str,
        assigned_to: Option<&str>,
        organization: Option<&str>,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("boards"),
            OsString::from("work-item"),
            OsString::from("update"),
            OsString::from("--id"),
            OsString::from(id.to_string()),
            OsString::from("--state"),
            OsString::from(state),
        ];
        if let Some(assigned_to) = assigned_to {
            args.push(OsString::from("--assigned-to"));
            args.push(OsString::from(assigned_to));
        }
        args.push(OsString::from("--output"));
        args.push(OsString::from("json"));
        if let Some(organization) = organization {
            args.push(OsString::from("--organization"));
            args.push(OsString::from(organization));
        }
        args
    }

    pub(super) fn create_pull_request_args(
        repository: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("repos"),
            OsString::from("pr"),
            OsString::from("create"),
            OsString::from("--source-branch"),
            OsString::from(request.source_branch.as_str()),
            OsString::from("--target-branch"),
            OsString::from(request.target_branch.as_str()),
            OsString::from("--title"),
            OsString::from(request.title.as_str()),
            OsString::from("--description"),
            OsString::from(request.description.as_str()),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(Self::repository_scope_args(repository));
        args
    }

    pub(super) fn link_work_item_args(
        repository: &RepositoryRef,
        pull_request_id: u64,
        id: WorkItemId,
    ) -> Vec<OsString> {
        vec![
            OsString::from("repos"),
            OsString::from("pr"),
            OsString::from("work-item"),
            OsString::from("add"),
            OsString::from("--id"),
            OsString::from(pull_request_id.to_string()),
            OsString::from("--work-items"),
            OsString::from(id.to_string()),
            OsString::from("--output"),
            OsString::from("json"),
            OsString::from("--organization"),
            OsString::from(repository.organization.as_str()),
        ]
    }

    fn repository_scope_args(repository: &RepositoryRef) -> [OsString; 6] {
        [
            OsString::from("--repository"),
            OsString::from(repository.repository.as_str()),
            OsString::from("--organization"),
            OsString::from(repository.organization.as_str()),
            OsString::from("--project"),
            OsString::from(repository.project.as_str()),
        ]
    }

    async fn run_az_raw(&self, args: &[OsString]) -> Result<Output, CoreError> {
        validate_command_binary_path(&self.binary, ENV_AZ_BIN, self.allow_unsafe_command_paths)?;
        let program = self
            .binary
            .to_str()
            .ok_or_else(|| CoreError::Configuration("Invalid az binary path".to_owned()))?;
        debug!(command = %Self::render_args(args), "running az");

        let run = self.runner.run(program, args);
        let result = match self.command_timeout {
            Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
                CoreError::DependencyUnavailable(format!(
                    "Azure CLI command timed out after {}s (`{} {}`)",
                    timeout.as_secs(),
                    self.binary.display(),
                    Self::render_args(args)
                ))
            })?,
            None => run.await,
        };

        result.map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => CoreError::DependencyUnavailable(format!(
                "Azure CLI `{}` was not found. Install az, add the extension with `az extension add --name azure-devops`, and sign in with `az login`.",
                self.binary.display()
            )),
            _ => CoreError::DependencyUnavailable(format!(
                "Failed to execute Azure CLI `{}`: {error}",
                self.binary.display()
            )),
        })
    }

    async fn run_az(&self, args: &[OsString]) -> Result<Output, CoreError> {
        let output = self.run_az_raw(args).await?;
        if output.status.success() {
            return Ok(output);
        }

        Err(self.command_failed(args, &output))
    }

    async fn run_az_json<T: DeserializeOwned>(&self, args: &[OsString]) -> Result<T, CoreError> {
        let output = self.run_az(args).await?;
        Self::parse_json(args, &output)
    }

    fn parse_json<T: DeserializeOwned>(args: &[OsString], output: &Output) -> Result<T, CoreError> {
        serde_json::from_slice(&output.stdout).map_err(|error| {
            CoreError::DependencyUnavailable(format!(
                "Failed to parse `az {}` JSON output: {error}. Output: {}",
                Self::render_command_name(args),
                truncate_for_error(&String::from_utf8_lossy(&output.stdout))
            ))
        })
    }

    fn command_failed(&self, args: &[OsString], output: &Output) -> CoreError {
        CoreError::DependencyUnavailable(format!(
            "Azure CLI command failed (`{} {}`): {}",
            self.binary.display(),
            Self::render_args(args),
            Self::command_output_detail(output)
        ))
    }

    pub(super) fn render_args(args: &[OsString]) -> String {
        args.iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Leading subcommand words, e.g. `repos pr list`.
    fn render_command_name(args: &[OsString]) -> String {
        args.iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .take_while(|arg| !arg.starts_with("--"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(super) fn command_output_detail(output: &Output) -> String {
        let stderr = sanitize_command_output_text(String::from_utf8_lossy(&output.stderr).as_ref());
        let stderr = stderr.trim().to_owned();
        if !stderr.is_empty() {
            return stderr;
        }

        let stdout = sanitize_command_output_text(String::from_utf8_lossy(&output.stdout).as_ref());
        let stdout = stdout.trim().to_owned();
        if !stdout.is_empty() {
            return stdout;
        }

        format!("exit status {}", output.status)
    }

    /// Only the work item service's own "does not exist" answer counts.
    /// Other failures that happen to mention a missing resource stay errors.
    fn is_missing_work_item_error(detail: &str, id: WorkItemId) -> bool {
        let detail = detail.to_ascii_lowercase();
        detail.contains("tf401232") || detail.contains(&format!("work item {id} does not exist"))
    }

    fn work_item_failure(&self, id: WorkItemId, args: &[OsString], output: &Output) -> CoreError {
        if Self::is_missing_work_item_error(&Self::command_output_detail(output), id) {
            CoreError::NotFound(id)
        } else {
            self.command_failed(args, output)
        }
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> RemoteWorkClient for AzCliClient<R> {
    async fn get_item(
        &self,
        id: WorkItemId,
        expand_relations: bool,
    ) -> Result<WorkItemRecord, CoreError> {
        let args = Self::work_item_show_args(id, expand_relations, self.organization.as_deref());
        let output = self.run_az_raw(&args).await?;
        if !output.status.success() {
            return Err(self.work_item_failure(id, &args, &output));
        }

        let item: AzWorkItem = Self::parse_json(&args, &output)?;
        Ok(item.into_record())
    }

    async fn list_branches(&self, repository: &RepositoryRef) -> Result<Vec<String>, CoreError> {
        let refs: Vec<AzGitRef> = self
            .run_az_json(&Self::list_refs_args(repository, "heads/"))
            .await?;
        Ok(refs.into_iter().map(|git_ref| git_ref.name).collect())
    }

    async fn list_active_review_requests(
        &self,
        repository: &RepositoryRef,
        source_branch: &str,
    ) -> Result<Vec<PullRequestMatch>, CoreError> {
        let source_branch = short_branch_name(source_branch.trim());
        let prs: Vec<AzPullRequest> = self
            .run_az_json(&Self::active_pull_requests_args(repository, source_branch))
            .await?;

        Ok(prs
            .into_iter()
            .map(|pr| PullRequestMatch {
                request_id: pr.pull_request_id,
                project: pr
                    .project_name()
                    .unwrap_or(repository.project.as_str())
                    .to_owned(),
                source_branch: pr
                    .source_ref_name
                    .as_deref()
                    .map(short_branch_name)
                    .unwrap_or(source_branch)
                    .to_owned(),
                title: pr.title,
            })
            .collect())
    }

    async fn get_repository_default_branch(
        &self,
        repository: &RepositoryRef,
    ) -> Result<String, CoreError> {
        let details: AzRepository = self
            .run_az_json(&Self::repository_show_args(repository))
            .await?;
        Ok(details.default_branch.unwrap_or_default())
    }

    async fn find_branch_object_id(
        &self,
        repository: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<String>, CoreError> {
        let short_name = short_branch_name(branch.trim());
        let full_name = head_ref(short_name);
        let refs: Vec<AzGitRef> = self
            .run_az_json(&Self::list_refs_args(
                repository,
                &format!("heads/{short_name}"),
            ))
            .await?;

        Ok(refs
            .into_iter()
            .find(|git_ref| git_ref.name == full_name)
            .and_then(|git_ref| git_ref.object_id)
            .filter(|object_id| !object_id.trim().is_empty()))
    }

    async fn create_branch(
        &self,
        repository: &RepositoryRef,
        branch: &str,
        object_id: &str,
    ) -> Result<(), CoreError> {
        let object_id = object_id.trim();
        if object_id.is_empty() {
            return Err(CoreError::Configuration(
                "Branch object id must be a non-empty string.".to_owned(),
            ));
        }
        self.run_az(&Self::create_ref_args(repository, branch.trim(), object_id))
            .await
            .map(|_| ())
    }

    async fn current_user(&self) -> Result<String, CoreError> {
        let output = self.run_az(&Self::current_user_args()).await?;
        let user = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if user.is_empty() {
            return Err(CoreError::DependencyUnavailable(
                "Could not determine the signed-in Azure DevOps user. Run `az login`.".to_owned(),
            ));
        }
        Ok(user)
    }

    async fn update_work_item_state(
        &self,
        id: WorkItemId,
        state: &str,
        assigned_to: Option<&str>,
    ) -> Result<(), CoreError> {
        let args = Self::work_item_update_args(
            id,
            state,
            assigned_to.map(str::trim).filter(|user| !user.is_empty()),
            self.organization.as_deref(),
        );
        let output = self.run_az_raw(&args).await?;
        if !output.status.success() {
            return Err(self.work_item_failure(id, &args, &output));
        }
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repository: &RepositoryRef,
        request: &NewPullRequest,
    ) -> Result<u64, CoreError> {
        let created: AzPullRequest = self
            .run_az_json(&Self::create_pull_request_args(repository, request))
            .await?;
        Ok(created.pull_request_id)
    }

    async fn link_work_item_to_pull_request(
        &self,
        repository: &RepositoryRef,
        pull_request_id: u64,
        id: WorkItemId,
    ) -> Result<(), CoreError> {
        self.run_az(&Self::link_work_item_args(repository, pull_request_id, id))
            .await
            .map(|_| ())
    }
}
