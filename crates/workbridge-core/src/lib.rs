pub mod activation;
pub mod branch_name;
pub mod branches;
pub mod client;
pub mod context;
pub mod default_branch;
pub mod error;
pub mod identifiers;
pub mod model;
pub mod provisioning;
pub mod relations;
pub mod urls;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use activation::{Activation, StartedWork, WorkItemActivator, ACTIVE_STATE};
pub use branches::BranchMatcher;
pub use client::RemoteWorkClient;
pub use default_branch::{CachePolicy, DefaultBranchResolver, FALLBACK_DEFAULT_BRANCH};
pub use error::CoreError;
pub use identifiers::WorkItemId;
pub use model::{
    BranchCandidate, CreatedPullRequest, NewPullRequest, PullRequestMatch, RawRelation,
    RelationEdge, RelationGraph, RelationKind, RepositoryRef, ResolutionWarning, Resolved,
    WorkItemIdentity, WorkItemRecord, UNTITLED_WORK_ITEM,
};
pub use provisioning::{BranchProvisioner, ProvisionedBranch};
pub use relations::{RelationGraphResolver, RelationSettings, DEFAULT_FAN_OUT_LIMIT};
