//! JSON shapes printed by `az ... --output json`. Only the fields that are
//! read are modelled; everything else is ignored.

use serde::Deserialize;

use workbridge_core::{RawRelation, WorkItemId, WorkItemIdentity, WorkItemRecord};

#[derive(Debug, Deserialize)]
pub(super) struct AzWorkItem {
    pub id: u64,
    #[serde(default)]
    pub fields: AzWorkItemFields,
    #[serde(default)]
    pub relations: Option<Vec<AzWorkItemRelation>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AzWorkItemFields {
    #[serde(rename = "System.Title", default)]
    pub title: Option<String>,
    #[serde(rename = "System.WorkItemType", default)]
    pub work_item_type: Option<String>,
    #[serde(rename = "System.State", default)]
    pub state: Option<String>,
    #[serde(rename = "System.TeamProject", default)]
    pub team_project: Option<String>,
    #[serde(rename = "System.Description", default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AzWorkItemRelation {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub url: String,
}

impl AzWorkItem {
    pub fn into_record(self) -> WorkItemRecord {
        let fields = self.fields;
        let identity = WorkItemIdentity::new(
            WorkItemId::new(self.id),
            fields.title.unwrap_or_default(),
        )
        .with_type(fields.work_item_type.unwrap_or_default())
        .with_state(fields.state.unwrap_or_default())
        .with_project(fields.team_project.unwrap_or_default())
        .with_description(fields.description.unwrap_or_default());

        WorkItemRecord {
            identity,
            relations: self
                .relations
                .unwrap_or_default()
                .into_iter()
                .map(|relation| RawRelation::new(relation.rel, relation.url))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AzGitRef {
    pub name: String,
    #[serde(rename = "objectId", default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AzPullRequest {
    #[serde(rename = "pullRequestId")]
    pub pull_request_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "sourceRefName", default)]
    pub source_ref_name: Option<String>,
    #[serde(default)]
    pub repository: Option<AzPullRequestRepository>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AzPullRequestRepository {
    #[serde(default)]
    pub project: Option<AzProject>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AzProject {
    #[serde(default)]
    pub name: Option<String>,
}

impl AzPullRequest {
    pub fn project_name(&self) -> Option<&str> {
        self.repository
            .as_ref()
            .and_then(|repository| repository.project.as_ref())
            .and_then(|project| project.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AzRepository {
    #[serde(rename = "defaultBranch", default)]
    pub default_branch: Option<String>,
}
