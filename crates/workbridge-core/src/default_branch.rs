//! Target branch resolution with a per-repository memo.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::branch_name::short_branch_name;
use crate::client::RemoteWorkClient;
use crate::model::{RepositoryRef, ResolutionWarning, Resolved};

pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Write once per repository, never invalidated.
    #[default]
    Forever,
    Ttl(Duration),
}

impl CachePolicy {
    /// Zero seconds means cache forever.
    pub fn from_ttl_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Forever
        } else {
            Self::Ttl(Duration::from_secs(secs))
        }
    }

    fn is_fresh(&self, stored_at: Instant) -> bool {
        match self {
            Self::Forever => true,
            Self::Ttl(ttl) => stored_at.elapsed() < *ttl,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoEntry {
    branch: String,
    stored_at: Instant,
}

#[derive(Clone)]
pub struct DefaultBranchResolver {
    client: Arc<dyn RemoteWorkClient>,
    source_branch: Option<String>,
    policy: CachePolicy,
    memo: Arc<RwLock<HashMap<String, MemoEntry>>>,
}

impl DefaultBranchResolver {
    pub fn new(
        client: Arc<dyn RemoteWorkClient>,
        source_branch: Option<String>,
        policy: CachePolicy,
    ) -> Self {
        let source_branch = source_branch
            .map(|branch| short_branch_name(branch.trim()).to_owned())
            .filter(|branch| !branch.is_empty());
        Self {
            client,
            source_branch,
            policy,
            memo: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The configured source branch if there is one, otherwise the
    /// repository default branch.
    pub async fn target_branch(&self, repository: &RepositoryRef) -> Resolved<String> {
        match &self.source_branch {
            Some(branch) => Resolved::clean(branch.clone()),
            None => self.repository_default_branch(repository).await,
        }
    }

    /// Falls back to `main` when the remote cannot be asked. The fallback is
    /// not memoized so the next call tries again.
    pub async fn repository_default_branch(&self, repository: &RepositoryRef) -> Resolved<String> {
        let key = repository.key();
        if let Some(branch) = self.cached(&key) {
            debug!(repository = %key, branch = %branch, "default branch memo hit");
            return Resolved::clean(branch);
        }

        match self.client.get_repository_default_branch(repository).await {
            Ok(branch) => {
                let branch = short_branch_name(branch.trim()).to_owned();
                if branch.is_empty() {
                    return Resolved::clean(FALLBACK_DEFAULT_BRANCH.to_owned());
                }
                self.store(key, branch.clone());
                Resolved::clean(branch)
            }
            Err(error) => {
                warn!(
                    repository = %key,
                    error = %error,
                    "could not read repository default branch; using {FALLBACK_DEFAULT_BRANCH}"
                );
                Resolved::new(
                    FALLBACK_DEFAULT_BRANCH.to_owned(),
                    vec![ResolutionWarning::new(
                        format!("default branch of {}", repository.repository),
                        error.to_string(),
                    )],
                )
            }
        }
    }

    fn cached(&self, key: &str) -> Option<String> {
        let memo = self.memo.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        memo.get(key)
            .filter(|entry| self.policy.is_fresh(entry.stored_at))
            .map(|entry| entry.branch.clone())
    }

    fn store(&self, key: String, branch: String) {
        let mut memo = self
            .memo
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.policy == CachePolicy::Forever && memo.contains_key(&key) {
            return;
        }
        memo.insert(
            key,
            MemoEntry {
                branch,
                stored_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRemoteClient, RemoteCall};

    fn repository() -> RepositoryRef {
        RepositoryRef::from_parts(Some("https://dev.azure.com/acme"), Some("Payments"), None)
            .expect("repository")
    }

    fn default_branch_calls(client: &FakeRemoteClient) -> usize {
        client
            .calls()
            .into_iter()
            .filter(|call| *call == RemoteCall::GetRepositoryDefaultBranch)
            .count()
    }

    #[tokio::test]
    async fn strips_heads_prefix_and_memoizes_forever() {
        let client = Arc::new(FakeRemoteClient::default());
        client.set_default_branch("refs/heads/develop");
        let resolver = DefaultBranchResolver::new(client.clone(), None, CachePolicy::Forever);

        assert_eq!(resolver.target_branch(&repository()).await.value, "develop");
        client.set_default_branch("refs/heads/trunk");
        assert_eq!(resolver.target_branch(&repository()).await.value, "develop");
        assert_eq!(default_branch_calls(&client), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let client = Arc::new(FakeRemoteClient::default());
        client.set_default_branch("refs/heads/develop");
        let resolver =
            DefaultBranchResolver::new(client.clone(), None, CachePolicy::Ttl(Duration::ZERO));

        resolver.repository_default_branch(&repository()).await;
        client.set_default_branch("refs/heads/trunk");
        let second = resolver.repository_default_branch(&repository()).await;

        assert_eq!(second.value, "trunk");
        assert_eq!(default_branch_calls(&client), 2);
    }

    #[tokio::test]
    async fn configured_source_branch_skips_the_remote() {
        let client = Arc::new(FakeRemoteClient::default());
        let resolver = DefaultBranchResolver::new(
            client.clone(),
            Some(" refs/heads/release/2.0 ".to_owned()),
            CachePolicy::Forever,
        );

        assert_eq!(resolver.target_branch(&repository()).await.value, "release/2.0");
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_falls_back_to_main_without_memoizing() {
        let client = Arc::new(FakeRemoteClient::default());
        client.fail_default_branch("repository not reachable");
        let resolver = DefaultBranchResolver::new(client.clone(), None, CachePolicy::Forever);

        let first = resolver.target_branch(&repository()).await;
        assert_eq!(first.value, FALLBACK_DEFAULT_BRANCH);
        assert_eq!(first.warnings.len(), 1);

        let second = resolver.target_branch(&repository()).await;
        assert_eq!(second.value, FALLBACK_DEFAULT_BRANCH);
        assert_eq!(default_branch_calls(&client), 2);
    }

    #[test]
    fn zero_ttl_seconds_means_forever() {
        assert_eq!(CachePolicy::from_ttl_secs(0), CachePolicy::Forever);
        assert_eq!(
            CachePolicy::from_ttl_secs(90),
            CachePolicy::Ttl(Duration::from_secs(90))
        );
    }
}
