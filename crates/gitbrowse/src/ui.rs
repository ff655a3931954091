//! UI rendering for the TUI

use crate::app::App;
use crate::modal::Mode;
use gitbrowse_core::{Backend, BlameLine};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Main drawing function
pub fn draw<B: Backend>(frame: &mut Frame, app: &mut App<B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Blame lines
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Prompt / pending count
        ])
        .split(frame.area());

    let len = app.lines().len();
    app.modal.set_viewport_height(chunks[0].height as usize, len);

    draw_content(frame, app, chunks[0]);
    draw_status_bar(frame, app, chunks[1]);
    draw_command_line(frame, app, chunks[2]);
}

fn draw_content<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let state = &app.modal.state;
    let width = area.width as usize;
    let style = RowStyle {
        id_width: app.id_width,
        tab_width: app.tab_width,
        term: app.search_term(),
    };

    let rows: Vec<Line> = app
        .lines()
        .iter()
        .enumerate()
        .skip(state.scroll_line)
        .take(area.height as usize)
        .map(|(index, line)| style.render(line, index == state.highlight_line, width))
        .collect();

    frame.render_widget(Paragraph::new(rows), area);
}

struct RowStyle<'a> {
    id_width: usize,
    tab_width: usize,
    term: Option<&'a str>,
}

impl RowStyle<'_> {
    /// `<short id> <marker><text>`, with lines changed by the current
    /// commit marked and coloured
    fn render(&self, line: &BlameLine, highlighted: bool, width: usize) -> Line<'static> {
        let id = line.revision.get(..self.id_width).unwrap_or(&line.revision);
        let (marker, text_style) = if line.current {
            ("+ ", Style::default().fg(Color::Green))
        } else {
            ("  ", Style::default())
        };
        let text = expand_tabs(line.text.trim_end_matches(['\n', '\r']), self.tab_width);

        let mut spans = vec![
            Span::styled(format!("{} ", id), Style::default().fg(Color::Yellow)),
            Span::styled(marker, text_style),
        ];
        spans.extend(match_spans(&text, self.term, text_style));

        if highlighted {
            let used: usize = spans.iter().map(|span| span.content.width()).sum();
            spans.push(Span::raw(" ".repeat(width.saturating_sub(used))));
            for span in &mut spans {
                span.style = span.style.add_modifier(Modifier::REVERSED);
            }
        }

        Line::from(spans)
    }
}

/// Split `text` around occurrences of the search term, emphasising them
fn match_spans(text: &str, term: Option<&str>, style: Style) -> Vec<Span<'static>> {
    let Some(term) = term.filter(|t| !t.is_empty()) else {
        return vec![Span::styled(text.to_string(), style)];
    };

    let emphasis = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let mut spans = Vec::new();
    let mut last = 0;
    for (start, matched) in text.match_indices(term) {
        if start > last {
            spans.push(Span::styled(text[last..start].to_string(), style));
        }
        spans.push(Span::styled(matched.to_string(), emphasis));
        last = start + matched.len();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), style));
    }
    spans
}

/// Replace tabs with spaces up to the next multiple of `tab_width` columns
fn expand_tabs(text: &str, tab_width: usize) -> String {
    if !text.contains('\t') {
        return text.to_string();
    }
    let tab_width = tab_width.max(1);
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        if c == '\t' {
            let spaces = tab_width - column % tab_width;
            out.push_str(&" ".repeat(spaces));
            column += spaces;
        } else {
            out.push(c);
            column += c.width().unwrap_or(0);
        }
    }
    out
}

/// Cut `text` down to at most `max_width` columns
fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width {
            break;
        }
        out.push(c);
        used += w;
    }
    out
}

fn draw_status_bar<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let style = Style::default().add_modifier(Modifier::REVERSED);
    let width = area.width as usize;

    let position = format!(" {} ", app.position_text());
    let room = width.saturating_sub(position.width());
    let status = truncate_to_width(&format!(" {}", app.status_text()), room);
    let padding = " ".repeat(room.saturating_sub(status.width()));

    let line = Line::from(vec![
        Span::styled(status, style),
        Span::styled(padding, style),
        Span::styled(position, style.add_modifier(Modifier::BOLD)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_command_line<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let state = &app.modal.state;
    let text = match app.modal.mode() {
        Mode::Input(mode) => {
            let prompt = app.modal.trigger_for(mode).unwrap_or(':');
            let text = format!("{}{}", prompt, state.input);
            let x = area.x + (text.width() as u16).min(area.width.saturating_sub(1));
            frame.set_cursor_position((x, area.y));
            text
        }
        Mode::Command => state
            .numeric_prefix
            .map(|count| count.to_string())
            .unwrap_or_default(),
    };
    frame.render_widget(Paragraph::new(truncate_to_width(&text, area.width as usize)), area);
}
