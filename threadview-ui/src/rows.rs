use chrono::{DateTime, Utc};
use threadview_core::{relative_time_with_format, CommentId, Forest};

use crate::adapter::UiStates;

/// What the user can do from a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Reply,
    Edit,
    Delete,
    SaveEdit,
    CancelEdit,
    SubmitReply,
    CancelReply,
}

impl RowAction {
    pub fn label(&self) -> &'static str {
        match self {
            RowAction::Reply => "Reply",
            RowAction::Edit => "Edit",
            RowAction::Delete => "Delete",
            RowAction::SaveEdit => "Save",
            RowAction::CancelEdit => "Cancel edit",
            RowAction::SubmitReply => "Send reply",
            RowAction::CancelReply => "Cancel reply",
        }
    }
}

/// One rendered comment, flattened out of the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: CommentId,
    /// Parent hops from the forest root
    pub depth: usize,
    pub author: String,
    /// Stored content, or the edit draft while editing
    pub body: String,
    pub time_label: String,
    pub editing: bool,
    /// Reply draft while the reply box is open
    pub reply_draft: Option<String>,
    pub reply_placeholder: String,
    pub actions: Vec<RowAction>,
}

impl CommentRow {
    pub fn is_replying(&self) -> bool {
        self.reply_draft.is_some()
    }
}

/// Flatten `forest` into rows, depth first, replies right after their parent
pub fn build_rows(
    forest: &Forest,
    states: &UiStates,
    now: DateTime<Utc>,
    date_format: &str,
) -> Vec<CommentRow> {
    forest
        .iter()
        .map(|(depth, node)| {
            let state = states.get(&node.id());
            let edit_draft = state.and_then(|s| s.editing.clone());
            let reply_draft = state.and_then(|s| s.replying.clone());

            let mut actions = vec![RowAction::Reply, RowAction::Edit, RowAction::Delete];
            if edit_draft.is_some() {
                actions.extend([RowAction::SaveEdit, RowAction::CancelEdit]);
            }
            if reply_draft.is_some() {
                actions.extend([RowAction::SubmitReply, RowAction::CancelReply]);
            }

            CommentRow {
                id: node.id(),
                depth,
                author: node.author().to_string(),
                editing: edit_draft.is_some(),
                body: edit_draft.unwrap_or_else(|| node.content().to_string()),
                time_label: relative_time_with_format(node.created_at(), now, date_format),
                reply_draft,
                reply_placeholder: format!("Reply to {}...", node.author()),
                actions,
            }
        })
        .collect()
}

/// Section title
pub fn header(forest: &Forest) -> String {
    format!("Comments ({})", forest.root_count())
}

/// Indented text rendering, one comment per block, for non-interactive output
pub fn plain_text(forest: &Forest, rows: &[CommentRow], indent_width: usize) -> String {
    let mut out = header(forest);
    out.push('\n');

    for row in rows {
        let pad = " ".repeat(row.depth * indent_width);
        out.push_str(&format!("{}#{} {} ({})\n", pad, row.id, row.author, row.time_label));
        for line in row.body.lines() {
            out.push_str(&format!("{}  {}\n", pad, line));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NodeUiState;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use threadview_core::demo_forest;

    fn now() -> DateTime<Utc> {
        // 2024-01-15 12:02:05 UTC
        Utc.timestamp_opt(1_705_320_125, 0).unwrap()
    }

    #[test]
    fn test_rows_follow_nesting() {
        let rows = build_rows(&demo_forest(), &UiStates::new(), now(), "%Y");
        let shape: Vec<(u64, usize)> = rows.iter().map(|r| (r.id.get(), r.depth)).collect();
        assert_eq!(shape, vec![(1, 0), (2, 1), (3, 0)]);

        assert_eq!(rows[0].author, "John Doe");
        assert_eq!(rows[0].time_label, "1 hours ago");
        assert_eq!(rows[2].time_label, "2 minutes ago");
        assert_eq!(rows[1].reply_placeholder, "Reply to Jane Smith...");
        assert_eq!(rows[1].actions, vec![RowAction::Reply, RowAction::Edit, RowAction::Delete]);
    }

    #[test]
    fn test_rows_show_drafts_and_conditional_actions() {
        let mut states = UiStates::new();
        states.insert(
            CommentId::new(2),
            NodeUiState {
                editing: Some("draft body".into()),
                replying: Some("draft reply".into()),
            },
        );
        let rows = build_rows(&demo_forest(), &states, now(), "%Y");

        let jane = &rows[1];
        assert!(jane.editing);
        assert_eq!(jane.body, "draft body");
        assert_eq!(jane.reply_draft.as_deref(), Some("draft reply"));
        assert_eq!(
            jane.actions,
            vec![
                RowAction::Reply,
                RowAction::Edit,
                RowAction::Delete,
                RowAction::SaveEdit,
                RowAction::CancelEdit,
                RowAction::SubmitReply,
                RowAction::CancelReply,
            ]
        );
        assert_eq!(rows[0].body, "This is a great post! Thanks for sharing.");
    }

    #[test]
    fn test_plain_text_indents_replies() {
        let forest = demo_forest();
        let rows = build_rows(&forest, &UiStates::new(), now(), "%Y");
        let text = plain_text(&forest, &rows, 4);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Comments (2)");
        assert_eq!(lines[1], "#1 John Doe (1 hours ago)");
        assert_eq!(lines[3], "    #2 Jane Smith (1 hours ago)");
        assert_eq!(lines[4], "      I totally agree with you!");
    }
}
