use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::rows::CommentRow;

/// Draws comment rows top to bottom, each reply level shifted right
pub struct CommentTreeWidget<'a> {
    pub rows: &'a [CommentRow],
    pub selected: Option<usize>,
    pub top: usize,
    pub indent_width: u16,
}

impl<'a> CommentTreeWidget<'a> {
    pub fn new(rows: &'a [CommentRow]) -> Self {
        Self { rows, selected: None, top: 0, indent_width: 4 }
    }

    pub fn selected(mut self, selected: Option<usize>) -> Self { self.selected = selected; self }
    pub fn top(mut self, top: usize) -> Self { self.top = top; self }
    pub fn indent(mut self, indent_width: u16) -> Self { self.indent_width = indent_width; self }
}

/// Screen lines one row takes
pub fn row_height(row: &CommentRow) -> usize {
    // header + body + actions, plus the reply box when open
    2 + body_lines(row).len() + usize::from(row.is_replying())
}

/// First row to draw so that `selected` stays on screen
pub fn scroll_top(
    rows: &[CommentRow],
    selected: usize,
    current_top: usize,
    height: usize,
) -> usize {
    if rows.is_empty() {
        return 0;
    }
    let selected = selected.min(rows.len() - 1);
    if selected < current_top {
        return selected;
    }

    let mut top = current_top;
    while top < selected
        && rows[top..=selected].iter().map(row_height).sum::<usize>() > height
    {
        top += 1;
    }
    top
}

/// Cut `text` to `max_width` display columns, marking the cut with an ellipsis
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.width();
        // keep one column for the ellipsis
        if used + width > max_width - 1 {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}

fn body_lines(row: &CommentRow) -> Vec<&str> {
    if row.body.is_empty() {
        vec![""]
    } else {
        row.body.split('\n').collect()
    }
}

/// Lines for one row, without indentation
fn row_lines(row: &CommentRow, selected: bool, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(row_height(row));

    let marker = if selected { "▶ " } else { "● " };
    lines.push(Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Blue)),
        Span::styled(
            truncate_to_width(&row.author, width.saturating_sub(2)),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(row.time_label.clone(), Style::default().fg(Color::DarkGray)),
    ]));

    let body_style = if row.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    for (i, text) in body_lines(row).into_iter().enumerate() {
        let prefix = if row.editing && i == 0 { "✎ " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(prefix, body_style),
            Span::styled(truncate_to_width(text, width.saturating_sub(2)), body_style),
        ]));
    }

    if let Some(draft) = &row.reply_draft {
        let (text, style) = if draft.is_empty() {
            let hint = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
            (row.reply_placeholder.clone(), hint)
        } else {
            (draft.replace('\n', " "), Style::default().fg(Color::Green))
        };
        lines.push(Line::from(vec![
            Span::styled("  ↳ ", Style::default().fg(Color::Green)),
            Span::styled(truncate_to_width(&text, width.saturating_sub(4)), style),
        ]));
    }

    let labels: Vec<&str> = row.actions.iter().map(|a| a.label()).collect();
    lines.push(Line::from(Span::styled(
        format!("  {}", labels.join(" · ")),
        Style::default().fg(Color::DarkGray),
    )));

    lines
}

impl<'a> Widget for CommentTreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bottom = area.y + area.height;
        let mut y = area.y;

        for (idx, row) in self.rows.iter().enumerate().skip(self.top) {
            if y >= bottom {
                break;
            }
            // deep threads keep at least half the width for text
            let indent = u16::try_from(row.depth)
                .unwrap_or(u16::MAX)
                .saturating_mul(self.indent_width)
                .min(area.width / 2);
            let x = area.x + indent;
            let width = area.width - indent;
            let is_selected = self.selected == Some(idx);

            let start = y;
            for line in row_lines(row, is_selected, width as usize) {
                if y >= bottom {
                    break;
                }
                buf.set_line(x, y, &line, width);
                y += 1;
            }

            if is_selected {
                let highlight = Rect { x, y: start, width, height: y - start };
                buf.set_style(highlight, Style::default().bg(Color::Rgb(40, 44, 52)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::UiStates;
    use crate::rows::build_rows;
    use chrono::{TimeZone, Utc};
    use threadview_core::demo_forest;

    fn demo_rows() -> Vec<CommentRow> {
        let now = Utc.timestamp_opt(1_705_320_125, 0).unwrap();
        build_rows(&demo_forest(), &UiStates::new(), now, "%Y")
    }

    fn line_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol().to_string()).collect()
    }

    #[test]
    fn render_indents_replies() {
        let rows = demo_rows();
        let area = Rect { x: 0, y: 0, width: 60, height: 12 };
        let mut buf = Buffer::empty(area);
        CommentTreeWidget::new(&rows).indent(4).render(area, &mut buf);

        assert!(line_text(&buf, 0).starts_with("● John Doe  1 hours ago"));
        assert!(line_text(&buf, 1).starts_with("  This is a great post!"));
        assert!(line_text(&buf, 2).starts_with("  Reply · Edit · Delete"));
        // reply sits one level in
        assert!(line_text(&buf, 3).starts_with("    ● Jane Smith"));
        assert!(line_text(&buf, 6).starts_with("● Bob Johnson  2 minutes ago"));
    }

    #[test]
    fn render_reply_box_and_selection() {
        let mut rows = demo_rows();
        rows[2].reply_draft = Some(String::new());
        let area = Rect { x: 0, y: 0, width: 60, height: 12 };
        let mut buf = Buffer::empty(area);
        CommentTreeWidget::new(&rows).selected(Some(2)).render(area, &mut buf);

        assert!(line_text(&buf, 6).starts_with("▶ Bob Johnson"));
        assert!(line_text(&buf, 8).starts_with("  ↳ Reply to Bob Johnson..."));
        assert_eq!(buf[(0, 6)].bg, Color::Rgb(40, 44, 52));
        assert_ne!(buf[(0, 0)].bg, Color::Rgb(40, 44, 52));
    }

    #[test]
    fn render_starts_at_top_row() {
        let rows = demo_rows();
        let area = Rect { x: 0, y: 0, width: 40, height: 3 };
        let mut buf = Buffer::empty(area);
        CommentTreeWidget::new(&rows).top(2).render(area, &mut buf);
        assert!(line_text(&buf, 0).starts_with("● Bob Johnson"));
    }

    #[test]
    fn render_very_deep_row_keeps_max_indent() {
        let mut rows = demo_rows();
        rows.truncate(1);
        rows[0].depth = 65_536;
        let area = Rect { x: 0, y: 0, width: 40, height: 3 };
        let mut buf = Buffer::empty(area);
        CommentTreeWidget::new(&rows).indent(4).render(area, &mut buf);

        // capped at half the width, never wrapped back to the root column
        let line = line_text(&buf, 0);
        assert!(line.starts_with(&format!("{}● John Doe", " ".repeat(20))));
    }

    #[test]
    fn truncate_respects_wide_chars() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello world", 6), "hello…");
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn scroll_keeps_selection_visible() {
        let rows = demo_rows();
        // each demo row is three lines high
        assert_eq!(scroll_top(&rows, 0, 0, 6), 0);
        assert_eq!(scroll_top(&rows, 2, 0, 6), 1);
        assert_eq!(scroll_top(&rows, 2, 0, 9), 0);
        assert_eq!(scroll_top(&rows, 0, 2, 6), 0);
        assert_eq!(scroll_top(&[], 3, 1, 6), 0);
    }
}
