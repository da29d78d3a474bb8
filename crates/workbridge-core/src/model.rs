use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identifiers::WorkItemId;

pub const UNTITLED_WORK_ITEM: &str = "Untitled";

/// Minimal projection of a work item, enough to list it next to another item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemIdentity {
    pub id: WorkItemId,
    pub title: String,
    #[serde(rename = "type")]
    pub work_item_type: String,
    pub state: String,
    pub project: String,
    /// Raw HTML as stored by the service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl WorkItemIdentity {
    pub fn new(id: impl Into<WorkItemId>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            title: if title.trim().is_empty() {
                UNTITLED_WORK_ITEM.to_owned()
            } else {
                title
            },
            work_item_type: String::new(),
            state: String::new(),
            project: String::new(),
            description: String::new(),
        }
    }

    pub fn with_type(mut self, work_item_type: impl Into<String>) -> Self {
        self.work_item_type = work_item_type.into();
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Untyped link record as the remote service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelation {
    pub rel: String,
    pub url: String,
}

impl RawRelation {
    pub fn new(rel: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            url: url.into(),
        }
    }

    pub fn classify(&self) -> Option<RelationEdge> {
        let kind = RelationKind::classify(&self.rel)?;
        let target_id = parse_work_item_url_id(&self.url)?;
        Some(RelationEdge { kind, target_id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Parent,
    Child,
    Related,
}

impl RelationKind {
    pub fn classify(link_type: &str) -> Option<Self> {
        let normalized = link_type.to_ascii_lowercase();
        if normalized.contains("hierarchy-reverse") {
            Some(Self::Parent)
        } else if normalized.contains("hierarchy-forward") {
            Some(Self::Child)
        } else if normalized.contains("related") {
            Some(Self::Related)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEdge {
    pub kind: RelationKind,
    pub target_id: WorkItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    pub identity: WorkItemIdentity,
    #[serde(default)]
    pub relations: Vec<RawRelation>,
}

impl WorkItemRecord {
    pub fn edges_of(&self, kind: RelationKind) -> Vec<WorkItemId> {
        self.relations
            .iter()
            .filter_map(RawRelation::classify)
            .filter(|edge| edge.kind == kind)
            .map(|edge| edge.target_id)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationGraph {
    pub parent: Option<WorkItemIdentity>,
    pub siblings: Vec<WorkItemIdentity>,
    pub children: Vec<WorkItemIdentity>,
    pub related: Vec<WorkItemIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchCandidate {
    pub name: String,
}

impl BranchCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestMatch {
    pub request_id: u64,
    pub title: String,
    pub project: String,
    pub source_branch: String,
}

/// What to ask the service for when opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    pub request_id: u64,
    pub title: String,
    pub project: String,
    pub source_branch: String,
    pub target_branch: String,
    /// False when the work item could not be linked to the pull request.
    pub linked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub organization: String,
    pub project: String,
    pub repository: String,
}

impl RepositoryRef {
    /// Builds a repository reference from optional settings. The repository
    /// name falls back to the project name when it is not configured.
    pub fn from_parts(
        organization: Option<&str>,
        project: Option<&str>,
        repository: Option<&str>,
    ) -> Result<Self, CoreError> {
        let organization = non_blank(organization).ok_or_else(|| {
            CoreError::RepositoryConfigurationMissing(
                "Azure DevOps organization is required".to_owned(),
            )
        })?;
        let project = non_blank(project).ok_or_else(|| {
            CoreError::RepositoryConfigurationMissing(
                "Azure DevOps project is required".to_owned(),
            )
        })?;
        let repository = non_blank(repository).unwrap_or(project);

        Ok(Self {
            organization: organization.to_owned(),
            project: project.to_owned(),
            repository: repository.to_owned(),
        })
    }

    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.organization, self.project, self.repository)
    }
}

/// A failure that was recovered from and did not stop the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub subject: String,
    pub message: String,
}

impl ResolutionWarning {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved<T> {
    pub value: T,
    pub warnings: Vec<ResolutionWarning>,
}

impl<T> Resolved<T> {
    pub fn new(value: T, warnings: Vec<ResolutionWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn into_parts(self) -> (T, Vec<ResolutionWarning>) {
        (self.value, self.warnings)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Extracts the numeric id from a `.../workItems/<id>` relation URL.
pub fn parse_work_item_url_id(url: &str) -> Option<WorkItemId> {
    const SEGMENT: &str = "workitems/";
    let lower = url.to_ascii_lowercase();
    let start = lower.find(SEGMENT)? + SEGMENT.len();
    let digits = url[start..]
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().map(WorkItemId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation_url(id: u64) -> String {
        format!("https://dev.azure.com/acme/_apis/wit/workItems/{id}")
    }

    #[test]
    fn classifies_link_types_case_insensitively() {
        assert_eq!(
            RelationKind::classify("System.LinkTypes.Hierarchy-Reverse"),
            Some(RelationKind::Parent)
        );
        assert_eq!(
            RelationKind::classify("system.linktypes.hierarchy-forward"),
            Some(RelationKind::Child)
        );
        assert_eq!(
            RelationKind::classify("System.LinkTypes.Related"),
            Some(RelationKind::Related)
        );
        assert_eq!(RelationKind::classify("ArtifactLink"), None);
        assert_eq!(RelationKind::classify("AttachedFile"), None);
    }

    #[test]
    fn parses_relation_url_ids() {
        assert_eq!(
            parse_work_item_url_id(&relation_url(4521)),
            Some(WorkItemId::new(4521))
        );
        assert_eq!(
            parse_work_item_url_id("https://host/_apis/wit/WORKITEMS/88?x=1"),
            Some(WorkItemId::new(88))
        );
        assert_eq!(parse_work_item_url_id("https://host/_apis/git/refs/1"), None);
        assert_eq!(parse_work_item_url_id("https://host/workItems/"), None);
    }

    #[test]
    fn record_edges_skip_unclassified_and_idless_relations() {
        let record = WorkItemRecord {
            identity: WorkItemIdentity::new(1u64, "root"),
            relations: vec![
                RawRelation::new("System.LinkTypes.Hierarchy-Reverse", relation_url(10)),
                RawRelation::new("ArtifactLink", "vstfs:///Git/Ref/abc"),
                RawRelation::new("System.LinkTypes.Related", "https://host/no-id"),
                RawRelation::new("System.LinkTypes.Hierarchy-Forward", relation_url(11)),
                RawRelation::new("System.LinkTypes.Hierarchy-Forward", relation_url(12)),
            ],
        };

        assert_eq!(
            record.edges_of(RelationKind::Parent),
            vec![WorkItemId::new(10)]
        );
        assert_eq!(
            record.edges_of(RelationKind::Child),
            vec![WorkItemId::new(11), WorkItemId::new(12)]
        );
        assert!(record.edges_of(RelationKind::Related).is_empty());
    }

    #[test]
    fn identity_serializes_type_field() {
        let identity = WorkItemIdentity::new(12u64, "Login")
            .with_type("Bug")
            .with_state("New");
        let value = serde_json::to_value(&identity).expect("serialize");
        assert_eq!(value["id"], 12);
        assert_eq!(value["type"], "Bug");
        assert!(value.get("work_item_type").is_none());
        assert!(value.get("description").is_none());

        let described = identity.with_description("<p>Steps</p>");
        let value = serde_json::to_value(&described).expect("serialize");
        assert_eq!(value["description"], "<p>Steps</p>");
    }

    #[test]
    fn blank_titles_become_untitled() {
        assert_eq!(WorkItemIdentity::new(3u64, "  ").title, UNTITLED_WORK_ITEM);
    }

    #[test]
    fn repository_falls_back_to_project_name() {
        let repository =
            RepositoryRef::from_parts(Some("https://dev.azure.com/acme"), Some("Payments"), None)
                .expect("repository");
        assert_eq!(repository.repository, "Payments");
        assert_eq!(repository.key(), "https://dev.azure.com/acme/Payments/Payments");

        let repository = RepositoryRef::from_parts(
            Some("https://dev.azure.com/acme"),
            Some("Payments"),
            Some("  "),
        )
        .expect("repository");
        assert_eq!(repository.repository, "Payments");
    }

    #[test]
    fn repository_requires_organization_and_project() {
        let error = RepositoryRef::from_parts(None, Some("Payments"), None)
            .expect_err("missing organization");
        assert!(matches!(error, CoreError::RepositoryConfigurationMissing(_)));

        let error = RepositoryRef::from_parts(Some("https://dev.azure.com/acme"), Some(" "), None)
            .expect_err("blank project");
        assert!(matches!(error, CoreError::RepositoryConfigurationMissing(_)));
    }
}
