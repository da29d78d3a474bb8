use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::branch_name::{self, is_head_ref, short_branch_name};
use crate::client::RemoteWorkClient;
use crate::identifiers::WorkItemId;
use crate::model::{BranchCandidate, PullRequestMatch, RepositoryRef, ResolutionWarning, Resolved};

/// Finds the branches that belong to a work item and any open review request
/// raised from one of them.
#[derive(Clone)]
pub struct BranchMatcher {
    client: Arc<dyn RemoteWorkClient>,
}

impl BranchMatcher {
    pub fn new(client: Arc<dyn RemoteWorkClient>) -> Self {
        Self { client }
    }

    /// The canonical name first, then matching remote branches in listing
    /// order. Never empty. Names that differ only in case count as the same
    /// branch and the first spelling is kept.
    pub async fn candidate_branches(
        &self,
        repository: &RepositoryRef,
        id: WorkItemId,
        title: &str,
        prefix: &str,
    ) -> Resolved<Vec<BranchCandidate>> {
        let canonical = branch_name::encode(id, title, prefix);
        let mut seen = HashSet::from([canonical.to_lowercase()]);
        let mut candidates = vec![BranchCandidate::new(canonical)];

        let refs = match self.client.list_branches(repository).await {
            Ok(refs) => refs,
            Err(error) => {
                warn!(
                    repository = %repository.key(),
                    error = %error,
                    "listing branches failed; using canonical branch name only"
                );
                return Resolved::new(
                    candidates,
                    vec![ResolutionWarning::new(
                        format!("branches of {}", repository.repository),
                        error.to_string(),
                    )],
                );
            }
        };

        for ref_name in refs {
            if !is_head_ref(&ref_name) || !branch_name::matches(&ref_name, id, title) {
                continue;
            }
            let short_name = short_branch_name(&ref_name);
            if seen.insert(short_name.to_lowercase()) {
                candidates.push(BranchCandidate::new(short_name));
            }
        }

        debug!(work_item = %id, count = candidates.len(), "collected candidate branches");
        Resolved::clean(candidates)
    }

    /// Scans the candidates one at a time and stops at the first branch with
    /// an active review request.
    pub async fn find_active_review_request(
        &self,
        repository: &RepositoryRef,
        id: WorkItemId,
        title: &str,
        prefix: &str,
    ) -> Resolved<Option<PullRequestMatch>> {
        let (candidates, mut warnings) = self
            .candidate_branches(repository, id, title, prefix)
            .await
            .into_parts();

        for candidate in &candidates {
            let requests = match self
                .client
                .list_active_review_requests(repository, candidate.as_str())
                .await
            {
                Ok(requests) => requests,
                Err(error) => {
                    warn!(
                        branch = candidate.as_str(),
                        error = %error,
                        "review request lookup failed; skipping branch"
                    );
                    warnings.push(ResolutionWarning::new(
                        format!("branch {}", candidate.as_str()),
                        error.to_string(),
                    ));
                    continue;
                }
            };

            if let Some(mut found) = requests.into_iter().next() {
                if found.project.trim().is_empty() {
                    found.project = repository.project.clone();
                }
                if found.source_branch.is_empty() {
                    found.source_branch = candidate.as_str().to_owned();
                }
                return Resolved::new(Some(found), warnings);
            }
        }

        Resolved::new(None, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRemoteClient, RemoteCall};

    fn repository() -> RepositoryRef {
        RepositoryRef::from_parts(Some("https://dev.azure.com/acme"), Some("Payments"), Some("api"))
            .expect("repository")
    }

    fn names(candidates: &[BranchCandidate]) -> Vec<&str> {
        candidates.iter().map(BranchCandidate::as_str).collect()
    }

    fn review_queries(client: &FakeRemoteClient) -> Vec<String> {
        client
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::ListActiveReviewRequests { source_branch } => Some(source_branch),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn canonical_name_leads_and_matching_refs_follow() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_branch("refs/heads/main");
        client.add_branch("refs/heads/jane/123-old-title");
        client.add_branch("refs/heads/tor/123-fix-bug");
        client.add_branch("refs/heads/feature/456-fix-bug");
        client.add_branch("refs/tags/other/123-fix-bug");
        client.add_branch("refs/heads/bob/123-fix-bug");

        let resolved = BranchMatcher::new(client)
            .candidate_branches(&repository(), WorkItemId::new(123), "Fix Bug!!", "tor/")
            .await;

        assert!(resolved.warnings.is_empty());
        assert_eq!(
            names(&resolved.value),
            vec!["tor/123-fix-bug", "jane/123-old-title", "bob/123-fix-bug"]
        );
    }

    #[tokio::test]
    async fn case_variants_of_a_branch_are_queried_once() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_branch("refs/heads/tor/123-FIX-BUG");
        client.add_branch("refs/heads/Jane/123-Old");
        client.add_branch("refs/heads/jane/123-old");

        let matcher = BranchMatcher::new(client.clone());
        let resolved = matcher
            .candidate_branches(&repository(), WorkItemId::new(123), "Fix Bug!!", "tor/")
            .await;
        assert_eq!(
            names(&resolved.value),
            vec!["tor/123-fix-bug", "Jane/123-Old"]
        );

        matcher
            .find_active_review_request(&repository(), WorkItemId::new(123), "Fix Bug!!", "tor/")
            .await;
        assert_eq!(
            review_queries(&client),
            vec!["tor/123-fix-bug", "Jane/123-Old"]
        );
    }

    #[tokio::test]
    async fn listing_failure_keeps_canonical_name_with_warning() {
        let client = Arc::new(FakeRemoteClient::default());
        client.fail_branch_listing("az: not logged in");

        let resolved = BranchMatcher::new(client)
            .candidate_branches(&repository(), WorkItemId::new(9), "Add login", "")
            .await;

        assert_eq!(names(&resolved.value), vec!["9-add-login"]);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(resolved.warnings[0].message.contains("not logged in"));
    }

    #[tokio::test]
    async fn first_candidate_with_a_review_request_wins() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_branch("refs/heads/jane/1-a-old");
        client.add_branch("refs/heads/max/1-a-older");
        client.add_review_request("jane/1-a-old", 77, "Old attempt");
        client.add_review_request("max/1-a-older", 78, "Older attempt");

        let resolved = BranchMatcher::new(client.clone())
            .find_active_review_request(&repository(), WorkItemId::new(1), "A", "tor/")
            .await;

        let found = resolved.value.expect("review request");
        assert_eq!(found.request_id, 77);
        assert_eq!(found.project, "Payments");
        assert_eq!(found.source_branch, "jane/1-a-old");
        assert_eq!(review_queries(&client), vec!["tor/1-a", "jane/1-a-old"]);
    }

    #[tokio::test]
    async fn failed_query_is_skipped_with_warning() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_branch("refs/heads/jane/1-a-old");
        client.fail_review_query("tor/1-a", "HTTP 503");
        client.add_review_request("jane/1-a-old", 5, "Fix");

        let resolved = BranchMatcher::new(client)
            .find_active_review_request(&repository(), WorkItemId::new(1), "A", "tor/")
            .await;

        assert_eq!(resolved.value.map(|found| found.request_id), Some(5));
        assert_eq!(resolved.warnings.len(), 1);
        assert_eq!(resolved.warnings[0].subject, "branch tor/1-a");
    }

    #[tokio::test]
    async fn no_review_request_is_none() {
        let client = Arc::new(FakeRemoteClient::default());

        let resolved = BranchMatcher::new(client.clone())
            .find_active_review_request(&repository(), WorkItemId::new(3), "Nothing", "")
            .await;

        assert!(resolved.value.is_none());
        assert!(resolved.warnings.is_empty());
        assert_eq!(review_queries(&client), vec!["3-nothing"]);
    }
}
