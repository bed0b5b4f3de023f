#![forbid(unsafe_code)]

use super::{OrderUpdate, StorageEngine, StoreError, now_ms};
use cs_core::model::ContentItem;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering as AtomicOrdering;

const SESSION_KEY_PREFIX: &str = "history:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Reorder,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Reorder => "reorder",
        }
    }
}

/// One reversible mutation in a project's session ledger. Snapshots are
/// whole content items; their binary payloads cross into the text-only
/// session store base64-encoded by the serde layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndoAction {
    pub id: String,
    pub kind: ActionKind,
    pub ts_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<ContentItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_order: Vec<OrderUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_order: Vec<OrderUpdate>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectHistory {
    #[serde(default)]
    undo_stack: Vec<UndoAction>,
    #[serde(default)]
    redo_stack: Vec<UndoAction>,
}

impl StorageEngine {
    /// Records a create/update/delete action against a project's ledger.
    /// Exactly one snapshot is populated for create and delete, both for
    /// update; anything else is rejected before it can poison the stack.
    pub fn record_action(
        &self,
        project_id: &str,
        kind: ActionKind,
        content_id: &str,
        before: Option<ContentItem>,
        after: Option<ContentItem>,
    ) -> Result<String, StoreError> {
        match kind {
            ActionKind::Create if before.is_none() && after.is_some() => {}
            ActionKind::Update if before.is_some() && after.is_some() => {}
            ActionKind::Delete if before.is_some() && after.is_none() => {}
            ActionKind::Reorder => {
                return Err(StoreError::InvalidInput(
                    "reorder actions go through record_reorder",
                ));
            }
            _ => {
                return Err(StoreError::InvalidInput(
                    "snapshot shape does not match action kind",
                ));
            }
        }
        let action = UndoAction {
            id: self.next_action_id(),
            kind,
            ts_ms: now_ms(),
            content_id: Some(content_id.to_string()),
            before,
            after,
            before_order: Vec::new(),
            after_order: Vec::new(),
        };
        self.push_action(project_id, action)
    }

    /// Records a reorder batch. Both sequences cover every item the batch
    /// touched, with the order values before and after.
    pub fn record_reorder(
        &self,
        project_id: &str,
        before_order: Vec<OrderUpdate>,
        after_order: Vec<OrderUpdate>,
    ) -> Result<String, StoreError> {
        let action = UndoAction {
            id: self.next_action_id(),
            kind: ActionKind::Reorder,
            ts_ms: now_ms(),
            content_id: None,
            before: None,
            after: None,
            before_order,
            after_order,
        };
        self.push_action(project_id, action)
    }

    /// Pops the most recent action and applies its inverse, moving it to
    /// the redo stack. Returns `None` when there is nothing to undo. If the
    /// inverse fails, the action goes back onto the undo stack before the
    /// error surfaces — history is never lost to a failed application.
    pub fn undo(&self, project_id: &str) -> Result<Option<ActionKind>, StoreError> {
        let mut history = self.load_history(project_id)?;
        let Some(action) = history.undo_stack.pop() else {
            return Ok(None);
        };
        let kind = action.kind;
        if let Err(err) = self.apply_inverse(&action) {
            history.undo_stack.push(action);
            self.save_history(project_id, &history)?;
            return Err(err);
        }
        history.redo_stack.push(action);
        self.save_history(project_id, &history)?;
        Ok(Some(kind))
    }

    /// Symmetric to [`StorageEngine::undo`]: reapplies the forward effect.
    pub fn redo(&self, project_id: &str) -> Result<Option<ActionKind>, StoreError> {
        let mut history = self.load_history(project_id)?;
        let Some(action) = history.redo_stack.pop() else {
            return Ok(None);
        };
        let kind = action.kind;
        if let Err(err) = self.apply_forward(&action) {
            history.redo_stack.push(action);
            self.save_history(project_id, &history)?;
            return Err(err);
        }
        history.undo_stack.push(action);
        self.save_history(project_id, &history)?;
        Ok(Some(kind))
    }

    /// Drops both stacks for a project. Used when the project is deleted.
    pub fn clear_history(&self, project_id: &str) {
        let key = session_key(project_id);
        self.with_session(|session| session.remove(&key));
    }

    /// (undo, redo) stack depths, for UI enablement.
    pub fn history_counts(&self, project_id: &str) -> Result<(usize, usize), StoreError> {
        let history = self.load_history(project_id)?;
        Ok((history.undo_stack.len(), history.redo_stack.len()))
    }

    fn apply_inverse(&self, action: &UndoAction) -> Result<(), StoreError> {
        match action.kind {
            ActionKind::Create => {
                let key = action
                    .content_id
                    .as_deref()
                    .ok_or(StoreError::Corrupt("create action missing content id"))?;
                self.remove_item(key)
            }
            ActionKind::Update | ActionKind::Delete => {
                let snapshot = action
                    .before
                    .as_ref()
                    .ok_or(StoreError::Corrupt("action missing before snapshot"))?;
                self.restore_item(snapshot)
            }
            ActionKind::Reorder => self.update_order(&action.before_order).map(|_| ()),
        }
    }

    fn apply_forward(&self, action: &UndoAction) -> Result<(), StoreError> {
        match action.kind {
            ActionKind::Create | ActionKind::Update => {
                let snapshot = action
                    .after
                    .as_ref()
                    .ok_or(StoreError::Corrupt("action missing after snapshot"))?;
                self.restore_item(snapshot)
            }
            ActionKind::Delete => {
                let key = action
                    .content_id
                    .as_deref()
                    .ok_or(StoreError::Corrupt("delete action missing content id"))?;
                self.remove_item(key)
            }
            ActionKind::Reorder => self.update_order(&action.after_order).map(|_| ()),
        }
    }

    fn push_action(&self, project_id: &str, action: UndoAction) -> Result<String, StoreError> {
        let mut history = self.load_history(project_id)?;
        let action_id = action.id.clone();
        history.undo_stack.push(action);
        if history.undo_stack.len() > self.history_limit {
            // Oldest first: whatever an evicted action captured is
            // unrecoverable for the rest of the session.
            let excess = history.undo_stack.len() - self.history_limit;
            history.undo_stack.drain(..excess);
        }
        // Any fresh mutation invalidates the redo side.
        history.redo_stack.clear();
        self.save_history(project_id, &history)?;
        Ok(action_id)
    }

    fn load_history(&self, project_id: &str) -> Result<ProjectHistory, StoreError> {
        let key = session_key(project_id);
        match self.with_session(|session| session.get(&key)) {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(ProjectHistory::default()),
        }
    }

    fn save_history(&self, project_id: &str, history: &ProjectHistory) -> Result<(), StoreError> {
        let key = session_key(project_id);
        let text = serde_json::to_string(history)?;
        self.with_session(|session| session.put(&key, text));
        Ok(())
    }

    fn next_action_id(&self) -> String {
        let seq = self.action_seq.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        format!("act_{seq:06}")
    }
}

fn session_key(project_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{project_id}")
}
