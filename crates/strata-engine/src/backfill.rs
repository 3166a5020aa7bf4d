//! Bulk backfill: seed commit history for pre-versioning folder trees.
//!
//! Projects are walked in fixed-size batches; per batch every live
//! non-reserved folder without history gets one synthesized platform commit
//! whose change set is the latest version of each direct child folder and
//! secret, plus an immediate checkpoint. Environment roots additionally
//! anchor a tree checkpoint covering the whole environment. All bulk inserts
//! are chunked to a row ceiling; each chunk is one transaction.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{EngineError, PitEngine};

/// Commit message marking backfill-synthesized commits; rollback keys on it.
pub const BACKFILL_MESSAGE: &str = "Initialized folder";

/// Order in which a batch's folders are walked. The synthesized change sets
/// are computed from pre-fetched version maps, so the resulting rows are
/// identical either way; the order only affects insert locality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalOrder {
    LeafFirst,
    RootFirst,
}

impl fmt::Display for TraversalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraversalOrder::LeafFirst => "leaf-first",
            TraversalOrder::RootFirst => "root-first",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TraversalOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leaf-first" => Ok(TraversalOrder::LeafFirst),
            "root-first" => Ok(TraversalOrder::RootFirst),
            other => Err(format!("unknown traversal order: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BackfillConfig {
    /// Projects per batch.
    pub project_batch_size: usize,
    /// Row ceiling per bulk insert chunk.
    pub insert_batch_rows: usize,
    pub traversal: TraversalOrder,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        BackfillConfig {
            project_batch_size: 100,
            insert_batch_rows: 9000,
            traversal: TraversalOrder::LeafFirst,
        }
    }
}

/// Row counts and skip set of one backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub projects: usize,
    pub batches: usize,
    pub folders_seen: usize,
    pub folders_committed: usize,
    pub folders_already_versioned: usize,
    pub commits: usize,
    pub changes: usize,
    pub checkpoints: usize,
    pub checkpoint_resources: usize,
    pub tree_checkpoints: usize,
    pub tree_checkpoint_resources: usize,
    /// Folders left untouched because their environment has no root folder.
    pub skipped_folders: Vec<FolderId>,
}

impl<S: PitStore> PitEngine<S> {
    /// Run the backfill over every project. Idempotent: folders that already
    /// have commits are left alone, so a re-run is a no-op.
    pub async fn run_backfill(
        &self,
        config: &BackfillConfig,
    ) -> Result<BackfillReport, EngineError> {
        let projects = self.store().list_project_ids().await?;
        let total_batches = projects.len().div_ceil(config.project_batch_size.max(1));
        let mut report = BackfillReport {
            projects: projects.len(),
            batches: total_batches,
            ..Default::default()
        };

        for (index, chunk) in projects.chunks(config.project_batch_size.max(1)).enumerate() {
            info!(
                batch = index + 1,
                total = total_batches,
                projects = chunk.len(),
                "backfill batch start"
            );
            self.backfill_batch(chunk, config, &mut report).await?;
        }
        info!(
            commits = report.commits,
            checkpoints = report.checkpoints,
            tree_checkpoints = report.tree_checkpoints,
            skipped = report.skipped_folders.len(),
            "backfill complete"
        );
        Ok(report)
    }

    /// Delete every commit the backfill synthesized; cascades remove change
    /// rows, checkpoints and tree checkpoints. Returns commits removed.
    pub async fn rollback_backfill(&self) -> Result<u64, EngineError> {
        let removed = self.store().delete_platform_commits(BACKFILL_MESSAGE).await?;
        info!(commits = removed, "backfill rollback complete");
        Ok(removed)
    }

    async fn backfill_batch(
        &self,
        projects: &[ProjectId],
        config: &BackfillConfig,
        report: &mut BackfillReport,
    ) -> Result<(), EngineError> {
        let folders = self.store().list_folders_for_projects(projects).await?;
        report.folders_seen += folders.len();

        // Environments without a resolvable root are broken data: skip and
        // report, never fail the run.
        let mut by_env: BTreeMap<EnvironmentId, Vec<Folder>> = BTreeMap::new();
        for folder in folders {
            by_env.entry(folder.environment_id).or_default().push(folder);
        }
        let mut healthy: Vec<Folder> = Vec::new();
        let mut roots: BTreeMap<EnvironmentId, FolderId> = BTreeMap::new();
        for (env_id, group) in by_env {
            match group.iter().find(|f| f.parent_id.is_none() && !f.is_reserved) {
                Some(root) => {
                    roots.insert(env_id, root.id);
                    healthy.extend(group.into_iter().filter(|f| !f.is_reserved));
                }
                None => {
                    let ids: Vec<FolderId> =
                        group.iter().filter(|f| !f.is_reserved).map(|f| f.id).collect();
                    warn!(
                        environment = %env_id.0,
                        folders = ids.len(),
                        "environment has no root folder, skipping"
                    );
                    report.skipped_folders.extend(ids);
                }
            }
        }

        let ordered = sort_by_hierarchy(healthy, config.traversal);
        let all_ids: Vec<FolderId> = ordered.iter().map(|f| f.id).collect();
        let already: HashSet<FolderId> = self
            .store()
            .folder_ids_with_commits(&all_ids)
            .await?
            .into_iter()
            .collect();
        report.folders_already_versioned += already.len();

        let latest_folder_version: HashMap<FolderId, FolderVersionId> = self
            .store()
            .latest_folder_versions(&all_ids)
            .await?
            .into_iter()
            .map(|v| (v.folder_id, v.id))
            .collect();
        let mut secrets_by_folder: HashMap<FolderId, Vec<SecretVersionId>> = HashMap::new();
        for version in self.store().latest_secret_versions(&all_ids).await? {
            secrets_by_folder
                .entry(version.folder_id)
                .or_default()
                .push(version.id);
        }
        let mut children: HashMap<FolderId, Vec<FolderId>> = HashMap::new();
        for folder in &ordered {
            if let Some(parent) = folder.parent_id {
                children.entry(parent).or_default().push(folder.id);
            }
        }

        let mut pending: Vec<(FolderId, EnvironmentId, Vec<CommitChange>)> = Vec::new();
        for folder in &ordered {
            if already.contains(&folder.id) {
                continue;
            }
            let mut changes: Vec<CommitChange> = Vec::new();
            if let Some(child_ids) = children.get(&folder.id) {
                for child in child_ids {
                    if let Some(version_id) = latest_folder_version.get(child) {
                        changes.push(CommitChange::FolderAdd(*version_id));
                    }
                }
            }
            if let Some(secret_versions) = secrets_by_folder.get(&folder.id) {
                for version_id in secret_versions {
                    changes.push(CommitChange::SecretAdd(*version_id));
                }
            }
            // empty folders get no commit but stay covered by the tree rows
            if changes.is_empty() {
                continue;
            }
            pending.push((folder.id, folder.environment_id, changes));
        }
        report.folders_committed += pending.len();

        // slice::chunks panics on 0
        let chunk_rows = config.insert_batch_rows.max(1);

        // phase 1: commits
        let commit_params: Vec<CreateCommitParams> = pending
            .iter()
            .map(|(folder_id, environment_id, _)| CreateCommitParams {
                folder_id: *folder_id,
                environment_id: *environment_id,
                actor: Actor::platform(),
                message: Some(BACKFILL_MESSAGE.to_string()),
            })
            .collect();
        let mut commits: Vec<Commit> = Vec::with_capacity(commit_params.len());
        for chunk in commit_params.chunks(chunk_rows) {
            commits.extend(self.store().insert_commits(chunk).await?);
        }
        report.commits += commits.len();

        // phase 2: one checkpoint per synthesized commit
        let commit_ids: Vec<CommitId> = commits.iter().map(|c| c.id).collect();
        let mut checkpoints: Vec<Checkpoint> = Vec::with_capacity(commit_ids.len());
        for chunk in commit_ids.chunks(chunk_rows) {
            checkpoints.extend(self.store().insert_checkpoints(chunk).await?);
        }
        report.checkpoints += checkpoints.len();

        // phase 3: change rows and checkpoint resources. The checkpoint state
        // equals the commit's ADD set since these are the folder's first
        // commits.
        let mut change_rows: Vec<(CommitId, CommitChange)> = Vec::new();
        let mut resource_rows: Vec<(CheckpointId, VersionRef)> = Vec::new();
        for (i, (_, _, changes)) in pending.iter().enumerate() {
            for change in changes {
                change_rows.push((commits[i].id, *change));
                resource_rows.push((checkpoints[i].id, change.version_ref()));
            }
        }
        for chunk in change_rows.chunks(chunk_rows) {
            report.changes += self.store().insert_commit_changes(chunk).await? as usize;
        }
        for chunk in resource_rows.chunks(chunk_rows) {
            report.checkpoint_resources +=
                self.store().insert_checkpoint_resources(chunk).await? as usize;
        }

        // phase 4: tree checkpoints for environments whose root got a commit
        // this run (roots with no changes stay uncovered and are logged).
        let mut commit_by_folder: HashMap<FolderId, CommitId> =
            commits.iter().map(|c| (c.folder_id, c.id)).collect();
        let already_ids: Vec<FolderId> = already.iter().copied().collect();
        for commit in self
            .store()
            .latest_commits_for_folders(&already_ids, None)
            .await?
        {
            commit_by_folder.entry(commit.folder_id).or_insert(commit.id);
        }

        let mut tree_envs: Vec<EnvironmentId> = Vec::new();
        let mut root_commit_ids: Vec<CommitId> = Vec::new();
        for (env_id, root_id) in &roots {
            match commit_by_folder.get(root_id) {
                Some(commit_id) if !already.contains(root_id) => {
                    tree_envs.push(*env_id);
                    root_commit_ids.push(*commit_id);
                }
                Some(_) => {}
                None => {
                    info!(environment = %env_id.0, "root folder empty, no tree checkpoint");
                }
            }
        }
        let mut tree_checkpoints: Vec<TreeCheckpoint> = Vec::with_capacity(root_commit_ids.len());
        for chunk in root_commit_ids.chunks(chunk_rows) {
            tree_checkpoints.extend(self.store().insert_tree_checkpoints(chunk).await?);
        }
        report.tree_checkpoints += tree_checkpoints.len();

        // phase 5: coverage rows, one per live non-reserved folder of each
        // snapshotted environment.
        let tcp_by_env: HashMap<EnvironmentId, TreeCheckpointId> = tree_envs
            .iter()
            .copied()
            .zip(tree_checkpoints.iter().map(|t| t.id))
            .collect();
        let mut coverage: Vec<(TreeCheckpointId, TreeCheckpointResource)> = Vec::new();
        for folder in &ordered {
            if let Some(tree_checkpoint_id) = tcp_by_env.get(&folder.environment_id) {
                coverage.push((
                    *tree_checkpoint_id,
                    TreeCheckpointResource {
                        folder_id: folder.id,
                        commit_id: commit_by_folder.get(&folder.id).copied(),
                    },
                ));
            }
        }
        for chunk in coverage.chunks(chunk_rows) {
            report.tree_checkpoint_resources +=
                self.store().insert_tree_checkpoint_resources(chunk).await? as usize;
        }
        Ok(())
    }
}

/// Level-order walk from the roots, reversed for leaf-first. Folders whose
/// parent is missing from the set are treated as roots; a visited set guards
/// against parent cycles in broken data, and unreachable folders are
/// appended so none are lost.
fn sort_by_hierarchy(folders: Vec<Folder>, order: TraversalOrder) -> Vec<Folder> {
    let present: HashSet<FolderId> = folders.iter().map(|f| f.id).collect();
    let mut children: HashMap<FolderId, Vec<FolderId>> = HashMap::new();
    let mut by_id: HashMap<FolderId, Folder> = HashMap::new();
    let mut queue: VecDeque<FolderId> = VecDeque::new();

    for folder in folders {
        match folder.parent_id {
            Some(parent) if present.contains(&parent) => {
                children.entry(parent).or_default().push(folder.id);
            }
            _ => queue.push_back(folder.id),
        }
        by_id.insert(folder.id, folder);
    }

    let mut visited: HashSet<FolderId> = HashSet::new();
    let mut ordered: Vec<Folder> = Vec::with_capacity(by_id.len());
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(child_ids) = children.get(&id) {
            queue.extend(child_ids.iter().copied());
        }
        if let Some(folder) = by_id.remove(&id) {
            ordered.push(folder);
        }
    }
    // anything left sits on a cycle
    ordered.extend(by_id.into_values());

    if order == TraversalOrder::LeafFirst {
        ordered.reverse();
    }
    ordered
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn folder(id: FolderId, parent: Option<FolderId>) -> Folder {
        Folder {
            id,
            environment_id: EnvironmentId(Uuid::new_v4()),
            parent_id: parent,
            name: "f".into(),
            version: 1,
            is_reserved: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hierarchy_sort_leaf_first_puts_children_before_parents() {
        let root = FolderId(Uuid::new_v4());
        let mid = FolderId(Uuid::new_v4());
        let leaf = FolderId(Uuid::new_v4());
        let folders = vec![
            folder(mid, Some(root)),
            folder(root, None),
            folder(leaf, Some(mid)),
        ];

        let ordered = sort_by_hierarchy(folders, TraversalOrder::LeafFirst);
        let pos = |id: FolderId| ordered.iter().position(|f| f.id == id).unwrap();
        assert!(pos(leaf) < pos(mid));
        assert!(pos(mid) < pos(root));

        let ordered = sort_by_hierarchy(
            vec![folder(mid, Some(root)), folder(root, None), folder(leaf, Some(mid))],
            TraversalOrder::RootFirst,
        );
        let pos = |id: FolderId| ordered.iter().position(|f| f.id == id).unwrap();
        assert!(pos(root) < pos(mid));
        assert!(pos(mid) < pos(leaf));
    }

    #[test]
    fn hierarchy_sort_survives_cycles_and_dangling_parents() {
        let a = FolderId(Uuid::new_v4());
        let b = FolderId(Uuid::new_v4());
        let dangling = FolderId(Uuid::new_v4());
        // a and b point at each other; dangling points at a folder outside
        // the set.
        let folders = vec![
            folder(a, Some(b)),
            folder(b, Some(a)),
            folder(dangling, Some(FolderId(Uuid::new_v4()))),
        ];

        let ordered = sort_by_hierarchy(folders, TraversalOrder::LeafFirst);
        assert_eq!(ordered.len(), 3);
        let ids: HashSet<FolderId> = ordered.iter().map(|f| f.id).collect();
        assert!(ids.contains(&a) && ids.contains(&b) && ids.contains(&dangling));
    }

    #[test]
    fn traversal_order_roundtrip() {
        for order in [TraversalOrder::LeafFirst, TraversalOrder::RootFirst] {
            assert_eq!(order.to_string().parse::<TraversalOrder>(), Ok(order));
        }
        assert!("sideways".parse::<TraversalOrder>().is_err());
    }
}
