//! Parent, sibling, child and related lookups for a single work item.
//!
//! Only the relation listings are load-bearing: if the originating item (or
//! its parent) cannot be listed the whole resolution fails. Detail lookups for
//! the items that hang off those listings are fanned out concurrently and a
//! failed lookup only drops that one item, recorded as a warning.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::client::RemoteWorkClient;
use crate::error::CoreError;
use crate::identifiers::WorkItemId;
use crate::model::{
    RelationGraph, RelationKind, ResolutionWarning, Resolved, WorkItemIdentity, WorkItemRecord,
};

pub const DEFAULT_FAN_OUT_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSettings {
    pub fan_out_limit: usize,
}

impl Default for RelationSettings {
    fn default() -> Self {
        Self {
            fan_out_limit: DEFAULT_FAN_OUT_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct RelationGraphResolver {
    client: Arc<dyn RemoteWorkClient>,
    fan_out_limit: usize,
}

/// Ids already placed in the graph. Anything in here is never fetched again
/// as a child or sibling, which keeps a malformed remote graph from looping
/// back onto the originating item.
#[derive(Debug)]
struct VisitedIds {
    ids: HashSet<WorkItemId>,
}

impl VisitedIds {
    fn new(origin: WorkItemId) -> Self {
        Self {
            ids: HashSet::from([origin]),
        }
    }

    fn contains(&self, id: WorkItemId) -> bool {
        self.ids.contains(&id)
    }

    fn insert(&mut self, id: WorkItemId) {
        self.ids.insert(id);
    }
}

struct ParentSide {
    parent: Option<WorkItemIdentity>,
    siblings: Vec<WorkItemIdentity>,
    warnings: Vec<ResolutionWarning>,
}

impl ParentSide {
    fn none() -> Self {
        Self {
            parent: None,
            siblings: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl RelationGraphResolver {
    pub fn new(
        client: Arc<dyn RemoteWorkClient>,
        settings: RelationSettings,
    ) -> Result<Self, CoreError> {
        if settings.fan_out_limit == 0 {
            return Err(CoreError::Configuration(
                "relation fan-out limit must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            client,
            fan_out_limit: settings.fan_out_limit,
        })
    }

    pub fn with_default_settings(client: Arc<dyn RemoteWorkClient>) -> Self {
        Self {
            client,
            fan_out_limit: DEFAULT_FAN_OUT_LIMIT,
        }
    }

    pub fn fan_out_limit(&self) -> usize {
        self.fan_out_limit
    }

    pub async fn resolve(&self, id: WorkItemId) -> Result<Resolved<RelationGraph>, CoreError> {
        debug!(work_item = %id, "resolving relation graph");
        let record = self.fetch_edges(id).await?;
        let mut visited = VisitedIds::new(id);
        let mut warnings = Vec::new();

        let parent_id = match record.edges_of(RelationKind::Parent).into_iter().next() {
            Some(parent_id) if visited.contains(parent_id) => {
                warn!(work_item = %id, "work item lists itself as its parent; ignoring");
                warnings.push(ResolutionWarning::new(
                    format!("work item {id}"),
                    "work item lists itself as its parent",
                ));
                None
            }
            other => other,
        };
        if let Some(parent_id) = parent_id {
            visited.insert(parent_id);
        }

        let child_ids = self.bounded_ids(record.edges_of(RelationKind::Child), &visited);
        let related_ids = self.bounded_ids(
            record.edges_of(RelationKind::Related),
            &VisitedIds::new(id),
        );

        let parent_side = async {
            match parent_id {
                Some(parent_id) => self.resolve_parent_side(id, parent_id, &visited).await,
                None => Ok(ParentSide::none()),
            }
        };
        let (parent_side, children, related) = tokio::join!(
            parent_side,
            self.fetch_many_lite(&child_ids),
            self.fetch_many_lite(&related_ids),
        );
        let parent_side = parent_side?;

        warnings.extend(parent_side.warnings);
        let (children, child_warnings) = children.into_parts();
        warnings.extend(child_warnings);
        let (related, related_warnings) = related.into_parts();
        warnings.extend(related_warnings);

        Ok(Resolved::new(
            RelationGraph {
                parent: parent_side.parent,
                siblings: parent_side.siblings,
                children,
                related,
            },
            warnings,
        ))
    }

    pub async fn fetch_lite(&self, id: WorkItemId) -> Result<WorkItemIdentity, CoreError> {
        self.client
            .get_item(id, false)
            .await
            .map(|record| record.identity)
    }

    /// Looks up every id concurrently. Results keep the order of `ids`;
    /// failed lookups are omitted and reported as warnings.
    pub async fn fetch_many_lite(&self, ids: &[WorkItemId]) -> Resolved<Vec<WorkItemIdentity>> {
        let results = join_all(ids.iter().map(|id| self.fetch_lite(*id))).await;

        let mut items = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(identity) => items.push(identity),
                Err(error) => {
                    warn!(work_item = %id, error = %error, "omitting related work item");
                    warnings.push(ResolutionWarning::new(
                        format!("work item {id}"),
                        error.to_string(),
                    ));
                }
            }
        }

        Resolved::new(items, warnings)
    }

    async fn fetch_edges(&self, id: WorkItemId) -> Result<WorkItemRecord, CoreError> {
        self.client
            .get_item(id, true)
            .await
            .map_err(|error| error.into_relation_fetch(id))
    }

    async fn resolve_parent_side(
        &self,
        origin: WorkItemId,
        parent_id: WorkItemId,
        visited: &VisitedIds,
    ) -> Result<ParentSide, CoreError> {
        let parent_record = match self.fetch_edges(parent_id).await {
            Ok(record) => record,
            Err(CoreError::NotFound(_)) => {
                warn!(work_item = %origin, parent = %parent_id, "parent link points at a missing work item");
                return Ok(ParentSide {
                    parent: None,
                    siblings: Vec::new(),
                    warnings: vec![ResolutionWarning::new(
                        format!("work item {parent_id}"),
                        "parent work item was not found",
                    )],
                });
            }
            Err(error) => return Err(error),
        };

        let sibling_ids = self.bounded_ids(parent_record.edges_of(RelationKind::Child), visited);
        let (siblings, warnings) = self.fetch_many_lite(&sibling_ids).await.into_parts();

        Ok(ParentSide {
            parent: Some(parent_record.identity),
            siblings,
            warnings,
        })
    }

    fn bounded_ids(&self, ids: Vec<WorkItemId>, visited: &VisitedIds) -> Vec<WorkItemId> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter(|id| !visited.contains(*id))
            .filter(|id| seen.insert(*id))
            .take(self.fan_out_limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRemoteClient, RemoteCall};
    use std::time::Duration;

    fn id(value: u64) -> WorkItemId {
        WorkItemId::new(value)
    }

    fn ids(items: &[WorkItemIdentity]) -> Vec<u64> {
        items.iter().map(|item| item.id.get()).collect()
    }

    fn resolver(client: &Arc<FakeRemoteClient>) -> RelationGraphResolver {
        RelationGraphResolver::with_default_settings(client.clone())
    }

    #[tokio::test]
    async fn resolves_parent_and_siblings_excluding_self() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(100u64, "Epic").with_type("Epic"));
        client.add_item(WorkItemIdentity::new(101u64, "Story A"));
        client.add_item(WorkItemIdentity::new(102u64, "Story B").with_state("Active"));
        client.link_child(100, 101);
        client.link_child(100, 102);

        let resolved = resolver(&client).resolve(id(101)).await.expect("resolve");

        assert!(resolved.warnings.is_empty());
        let graph = resolved.value;
        assert_eq!(graph.parent.as_ref().map(|parent| parent.id), Some(id(100)));
        assert_eq!(ids(&graph.siblings), vec![102]);
        assert_eq!(graph.siblings[0].state, "Active");
        assert!(graph.children.is_empty());
        assert!(graph.related.is_empty());
    }

    #[tokio::test]
    async fn resolves_children_and_related_in_discovery_order() {
        let client = Arc::new(FakeRemoteClient::default());
        for (value, title) in [(50u64, "Feature"), (61, "c1"), (62, "c2"), (63, "c3"), (200, "r")] {
            client.add_item(WorkItemIdentity::new(value, title));
        }
        client.link_child(50, 63);
        client.link_child(50, 61);
        client.link_child(50, 62);
        client.link_related(50, 200);
        client.set_delay(63, Duration::from_millis(30));

        let graph = resolver(&client).resolve(id(50)).await.expect("resolve").value;

        assert!(graph.parent.is_none());
        assert!(graph.siblings.is_empty());
        assert_eq!(ids(&graph.children), vec![63, 61, 62]);
        assert_eq!(ids(&graph.related), vec![200]);
    }

    #[tokio::test(start_paused = true)]
    async fn sibling_and_related_lookups_run_concurrently() {
        let client = Arc::new(FakeRemoteClient::default());
        for (value, title) in [
            (100u64, "Epic"),
            (101, "me"),
            (102, "s1"),
            (103, "s2"),
            (104, "s3"),
            (200, "r1"),
            (201, "r2"),
        ] {
            client.add_item(WorkItemIdentity::new(value, title));
        }
        for child in [101, 104, 102, 103] {
            client.link_child(100, child);
        }
        client.link_related(101, 201);
        client.link_related(101, 200);
        for slow in [102, 103, 104, 200, 201] {
            client.set_delay(slow, Duration::from_millis(100));
        }

        let started = tokio::time::Instant::now();
        let graph = resolver(&client).resolve(id(101)).await.expect("resolve").value;
        let elapsed = started.elapsed();

        assert_eq!(ids(&graph.siblings), vec![104, 102, 103]);
        assert_eq!(ids(&graph.related), vec![201, 200]);
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn no_parent_edge_means_no_parent_lookup() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(10u64, "Lonely"));

        let graph = resolver(&client).resolve(id(10)).await.expect("resolve").value;

        assert_eq!(graph, RelationGraph::default());
        assert_eq!(
            client.calls(),
            vec![RemoteCall::GetItem {
                id: id(10),
                expand_relations: true
            }]
        );
    }

    #[tokio::test]
    async fn only_the_first_parent_edge_is_used() {
        let client = Arc::new(FakeRemoteClient::default());
        for (value, title) in [(1u64, "first parent"), (2, "second parent"), (3, "child")] {
            client.add_item(WorkItemIdentity::new(value, title));
        }
        client.link_parent(3, 1);
        client.link_parent(3, 2);

        let graph = resolver(&client).resolve(id(3)).await.expect("resolve").value;

        assert_eq!(graph.parent.map(|parent| parent.id), Some(id(1)));
        assert!(!client.calls().contains(&RemoteCall::GetItem {
            id: id(2),
            expand_relations: true
        }));
    }

    #[tokio::test]
    async fn failed_detail_lookups_are_omitted_with_warnings() {
        let client = Arc::new(FakeRemoteClient::default());
        for (value, title) in [(100u64, "Epic"), (101, "me"), (102, "ok"), (103, "broken")] {
            client.add_item(WorkItemIdentity::new(value, title));
        }
        client.link_child(100, 101);
        client.link_child(100, 103);
        client.link_child(100, 102);
        client.fail_lite(103, "az exited with status 1");

        let resolved = resolver(&client).resolve(id(101)).await.expect("resolve");

        assert_eq!(ids(&resolved.value.siblings), vec![102]);
        assert_eq!(resolved.warnings.len(), 1);
        assert_eq!(resolved.warnings[0].subject, "work item 103");
        assert!(resolved.warnings[0].message.contains("az exited with status 1"));
    }

    #[tokio::test]
    async fn relation_listing_failure_is_fatal() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(5u64, "x"));
        client.fail_relations(5, "network unreachable");

        let error = resolver(&client).resolve(id(5)).await.expect_err("fatal");

        assert!(matches!(error, CoreError::RelationFetch { id: failed, .. } if failed == id(5)));
    }

    #[tokio::test]
    async fn parent_listing_failure_is_fatal() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(1u64, "parent"));
        client.add_item(WorkItemIdentity::new(2u64, "child"));
        client.link_child(1, 2);
        client.fail_relations(1, "timeout");

        let error = resolver(&client).resolve(id(2)).await.expect_err("fatal");

        assert!(matches!(error, CoreError::RelationFetch { id: failed, .. } if failed == id(1)));
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let client = Arc::new(FakeRemoteClient::default());

        let error = resolver(&client).resolve(id(404)).await.expect_err("missing");

        assert_eq!(error, CoreError::NotFound(id(404)));
    }

    #[tokio::test]
    async fn dangling_parent_link_degrades_to_no_parent() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(2u64, "orphan"));
        client.link_parent(2, 999);

        let resolved = resolver(&client).resolve(id(2)).await.expect("resolve");

        assert!(resolved.value.parent.is_none());
        assert!(resolved.value.siblings.is_empty());
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[tokio::test]
    async fn self_referencing_links_never_reenter_the_origin() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(1u64, "parent"));
        client.add_item(WorkItemIdentity::new(2u64, "loop"));
        client.link_parent(2, 2);
        client.link_child(2, 2);
        client.link_child(2, 1);
        client.link_related(2, 2);

        let resolved = resolver(&client).resolve(id(2)).await.expect("resolve");
        let graph = resolved.value;

        assert!(graph.parent.is_none());
        assert_eq!(ids(&graph.children), vec![1]);
        assert!(graph.related.is_empty());
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[tokio::test]
    async fn parent_is_not_repeated_as_child_or_sibling() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(1u64, "parent"));
        client.add_item(WorkItemIdentity::new(2u64, "child"));
        client.link_child(1, 2);
        client.link_child(2, 1);
        client.link_child(1, 1);

        let graph = resolver(&client).resolve(id(2)).await.expect("resolve").value;

        assert_eq!(graph.parent.map(|parent| parent.id), Some(id(1)));
        assert!(graph.children.is_empty());
        assert!(graph.siblings.is_empty());
    }

    #[tokio::test]
    async fn fan_out_is_capped_after_deduplication() {
        let client = Arc::new(FakeRemoteClient::default());
        client.add_item(WorkItemIdentity::new(1u64, "parent"));
        for value in 10..20u64 {
            client.add_item(WorkItemIdentity::new(value, format!("child {value}")));
        }
        client.link_child(1, 10);
        client.link_child(1, 10);
        for value in 11..20 {
            client.link_child(1, value);
        }

        let resolver =
            RelationGraphResolver::new(client.clone(), RelationSettings { fan_out_limit: 3 })
                .expect("resolver");
        let graph = resolver.resolve(id(1)).await.expect("resolve").value;

        assert_eq!(ids(&graph.children), vec![10, 11, 12]);
        let lite_lookups = client
            .calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    RemoteCall::GetItem {
                        expand_relations: false,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(lite_lookups, 3);
    }

    #[test]
    fn zero_fan_out_limit_is_rejected() {
        let client = Arc::new(FakeRemoteClient::default());
        let result = RelationGraphResolver::new(client, RelationSettings { fan_out_limit: 0 });
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }
}
