//! State comparison between two points of a folder's history.

use std::collections::{BTreeMap, HashSet};

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{CommitRef, EngineError, PitEngine};

/// Operation needed to move the current state toward the target state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffOp {
    Create,
    Update,
    Delete,
}

/// One entry of a state comparison.
#[derive(Clone, Debug)]
pub struct StateDiff {
    pub op: DiffOp,
    /// Target-side state for Create/Update, current-side state for Delete.
    pub state: ResourceState,
    /// Current-side version replaced by an Update.
    pub from_version: Option<VersionRef>,
}

impl<S: PitStore> PitEngine<S> {
    /// Diff the folder's state at `current` against its state at `target`.
    ///
    /// With no current commit every target resource is reported with
    /// `default_op` (a rollback preview into unversioned state). Unchanged
    /// resources are omitted.
    pub async fn compare_states(
        &self,
        folder_id: &FolderId,
        current: Option<CommitId>,
        target: CommitId,
        default_op: DiffOp,
    ) -> Result<Vec<StateDiff>, EngineError> {
        let target_state = self.resolve_folder(folder_id, CommitRef::Id(target)).await?;
        let Some(current) = current else {
            return Ok(target_state
                .into_iter()
                .map(|state| StateDiff {
                    op: default_op,
                    state,
                    from_version: None,
                })
                .collect());
        };

        let current_state = self
            .resolve_folder(folder_id, CommitRef::Id(current))
            .await?;
        let current_map: BTreeMap<ResourceKey, ResourceState> = current_state
            .into_iter()
            .map(|s| (s.identity(), s))
            .collect();

        let mut out = Vec::new();
        let mut target_keys: HashSet<ResourceKey> = HashSet::new();
        for state in target_state {
            let key = state.identity();
            target_keys.insert(key);
            match current_map.get(&key) {
                None => out.push(StateDiff {
                    op: DiffOp::Create,
                    state,
                    from_version: None,
                }),
                Some(cur) if cur.version_ref() != state.version_ref() => out.push(StateDiff {
                    op: DiffOp::Update,
                    state,
                    from_version: Some(cur.version_ref()),
                }),
                Some(_) => {}
            }
        }
        for (key, state) in current_map {
            if !target_keys.contains(&key) {
                out.push(StateDiff {
                    op: DiffOp::Delete,
                    state,
                    from_version: None,
                });
            }
        }
        Ok(out)
    }
}
