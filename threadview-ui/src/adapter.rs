use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use threadview_core::{CommentError, CommentId, CommentStore, Forest};
use tracing::{debug, warn};

use crate::rows::{build_rows, CommentRow};

/// Transient per-comment state owned by the view, never stored in the forest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUiState {
    /// Edit draft, present while the editor is open
    pub editing: Option<String>,
    /// Reply draft, present while the reply box is open
    pub replying: Option<String>,
}

impl NodeUiState {
    fn is_idle(&self) -> bool {
        self.editing.is_none() && self.replying.is_none()
    }
}

pub type UiStates = HashMap<CommentId, NodeUiState>;

/// Something the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetUserName(String),
    SetComposerDraft(String),
    SubmitComposer,
    /// Open the reply box, or close it (dropping the draft) if already open
    ToggleReply(CommentId),
    SetReplyDraft(CommentId, String),
    SubmitReply(CommentId),
    CancelReply(CommentId),
    StartEdit(CommentId),
    SetEditDraft(CommentId, String),
    SaveEdit(CommentId),
    CancelEdit(CommentId),
    Delete(CommentId),
}

/// Result of dispatching an intent
#[derive(Debug)]
pub enum Outcome {
    /// The store installed a new forest
    Updated,
    /// Only transient view state changed
    ViewChanged,
    /// Nothing to do: blank draft, or the box the intent targets is closed
    Ignored,
    /// The store refused the operation; the forest is unchanged
    Rejected(CommentError),
}

impl Outcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Outcome::Updated)
    }
}

/// Presentation side of the comment section: the store plus everything the
/// user is in the middle of typing.
pub struct CommentView {
    store: CommentStore,
    user_name: String,
    composer: String,
    states: UiStates,
}

impl CommentView {
    pub const DEFAULT_USER_NAME: &'static str = "Anonymous User";

    pub fn new(store: CommentStore) -> Self {
        Self {
            store,
            user_name: Self::DEFAULT_USER_NAME.to_string(),
            composer: String::new(),
            states: UiStates::new(),
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn forest(&self) -> &Forest {
        self.store.forest()
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn composer_draft(&self) -> &str {
        &self.composer
    }

    pub fn states(&self) -> &UiStates {
        &self.states
    }

    pub fn node_state(&self, id: CommentId) -> Option<&NodeUiState> {
        self.states.get(&id)
    }

    pub fn edit_draft(&self, id: CommentId) -> Option<&str> {
        self.node_state(id).and_then(|s| s.editing.as_deref())
    }

    pub fn reply_draft(&self, id: CommentId) -> Option<&str> {
        self.node_state(id).and_then(|s| s.replying.as_deref())
    }

    pub fn is_editing(&self, id: CommentId) -> bool {
        self.edit_draft(id).is_some()
    }

    pub fn is_replying(&self, id: CommentId) -> bool {
        self.reply_draft(id).is_some()
    }

    // Submit controls are disabled while their draft is blank

    pub fn can_submit_composer(&self) -> bool {
        !self.composer.trim().is_empty()
    }

    pub fn can_submit_reply(&self, id: CommentId) -> bool {
        self.reply_draft(id).is_some_and(|d| !d.trim().is_empty())
    }

    pub fn can_save_edit(&self, id: CommentId) -> bool {
        self.edit_draft(id).is_some_and(|d| !d.trim().is_empty())
    }

    /// Rows for the current forest and view state
    pub fn rows(&self, now: DateTime<Utc>, date_format: &str) -> Vec<CommentRow> {
        build_rows(self.forest(), &self.states, now, date_format)
    }

    /// Apply one user intent
    pub fn dispatch(&mut self, intent: Intent) -> Outcome {
        debug!(?intent, "dispatch");
        let outcome = match intent {
            Intent::SetUserName(name) => {
                self.user_name = name;
                Outcome::ViewChanged
            }
            Intent::SetComposerDraft(text) => {
                self.composer = text;
                Outcome::ViewChanged
            }
            Intent::SubmitComposer => self.submit_composer(),
            Intent::ToggleReply(id) => self.toggle_reply(id),
            Intent::SetReplyDraft(id, text) => self.update_state(id, |s| match &mut s.replying {
                Some(draft) => {
                    *draft = text;
                    true
                }
                None => false,
            }),
            Intent::SubmitReply(id) => self.submit_reply(id),
            Intent::CancelReply(id) => self.update_state(id, |s| s.replying.take().is_some()),
            Intent::StartEdit(id) => self.start_edit(id),
            Intent::SetEditDraft(id, text) => self.update_state(id, |s| match &mut s.editing {
                Some(draft) => {
                    *draft = text;
                    true
                }
                None => false,
            }),
            Intent::SaveEdit(id) => self.save_edit(id),
            Intent::CancelEdit(id) => self.update_state(id, |s| s.editing.take().is_some()),
            Intent::Delete(id) => match self.store.delete_subtree(id) {
                Ok(_) => Outcome::Updated,
                Err(err) => Outcome::Rejected(err),
            },
        };

        match &outcome {
            Outcome::Updated => self.prune_states(),
            Outcome::Rejected(err) => {
                warn!(%err, "intent rejected");
                if err.is_not_found() {
                    self.prune_states();
                }
            }
            _ => {}
        }
        outcome
    }

    fn submit_composer(&mut self) -> Outcome {
        if !self.can_submit_composer() {
            return Outcome::Ignored;
        }
        match self.store.post_top_level(&self.user_name, &self.composer) {
            Ok(_) => {
                self.composer.clear();
                Outcome::Updated
            }
            Err(err) => Outcome::Rejected(err),
        }
    }

    fn toggle_reply(&mut self, id: CommentId) -> Outcome {
        if !self.forest().contains(id) {
            return Outcome::Rejected(CommentError::NotFound(id));
        }
        let state = self.states.entry(id).or_default();
        state.replying = match state.replying.take() {
            Some(_) => None,
            None => Some(String::new()),
        };
        if state.is_idle() {
            self.states.remove(&id);
        }
        Outcome::ViewChanged
    }

    fn submit_reply(&mut self, id: CommentId) -> Outcome {
        if !self.can_submit_reply(id) {
            return Outcome::Ignored;
        }
        let draft = self.reply_draft(id).unwrap_or_default().to_string();
        match self.store.post_reply(id, &self.user_name, &draft) {
            Ok(_) => {
                if let Some(state) = self.states.get_mut(&id) {
                    state.replying = None;
                }
                Outcome::Updated
            }
            Err(err) => Outcome::Rejected(err),
        }
    }

    fn start_edit(&mut self, id: CommentId) -> Outcome {
        let Some(content) = self.forest().find(id).map(|n| n.content().to_string()) else {
            return Outcome::Rejected(CommentError::NotFound(id));
        };
        let state = self.states.entry(id).or_default();
        if state.editing.is_some() {
            return Outcome::Ignored;
        }
        state.editing = Some(content);
        Outcome::ViewChanged
    }

    fn save_edit(&mut self, id: CommentId) -> Outcome {
        if !self.can_save_edit(id) {
            return Outcome::Ignored;
        }
        let draft = self.edit_draft(id).unwrap_or_default().to_string();
        match self.store.update_content(id, &draft) {
            Ok(_) => {
                if let Some(state) = self.states.get_mut(&id) {
                    state.editing = None;
                }
                Outcome::Updated
            }
            Err(err) => Outcome::Rejected(err),
        }
    }

    /// Run `apply` on an existing state entry; it reports whether it changed anything
    fn update_state<F>(&mut self, id: CommentId, apply: F) -> Outcome
    where
        F: FnOnce(&mut NodeUiState) -> bool,
    {
        let Some(state) = self.states.get_mut(&id) else {
            return Outcome::Ignored;
        };
        if !apply(state) {
            return Outcome::Ignored;
        }
        if state.is_idle() {
            self.states.remove(&id);
        }
        Outcome::ViewChanged
    }

    /// Forget view state of comments that are gone, and of idle comments
    fn prune_states(&mut self) {
        let live: HashSet<CommentId> = self.store.forest().ids().into_iter().collect();
        self.states
            .retain(|id, state| live.contains(id) && !state.is_idle());
    }
}
