pub mod adapter;
pub mod config;
pub mod rows;
pub mod tui;
pub mod widget;

pub use adapter::{CommentView, Intent, NodeUiState, Outcome, UiStates};
pub use config::UiConfig;
pub use rows::{build_rows, header, plain_text, CommentRow, RowAction};
pub use tui::{run_tui, App, Focus};
pub use widget::CommentTreeWidget;
