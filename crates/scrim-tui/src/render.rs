//! Frame rendering: input row, filtered list, footer.

use crate::app::App;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use scrim_core::Registry;

const SPINNER_FRAMES: [&str; 4] = ["▌", "▀", "▐", "▄"];

/// Accent bar glyphs: solid for highlighted lines.
const BAR: &str = "▌";
const BAR_HIGHLIGHT: &str = "█";

const NAME_WIDTH: usize = 10;

pub fn render_ui(f: &mut Frame, app: &mut App, registry: &Registry, busy: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_input(f, app, busy, chunks[0]);
    render_list(f, app, chunks[1]);
    render_footer(f, app, registry, chunks[2]);
}

fn render_input(f: &mut Frame, app: &App, busy: bool, area: ratatui::layout::Rect) {
    let lead = if busy {
        Span::raw(SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()])
    } else {
        Span::styled(">", Style::default().fg(Color::DarkGray))
    };

    let line = Line::from(vec![lead, Span::raw(" "), Span::raw(app.input.as_str())]);
    f.render_widget(Paragraph::new(line), area);

    // u16 casts are bounded by the terminal width
    #[allow(clippy::cast_possible_truncation)]
    f.set_cursor_position((
        area.x + (app.cursor_position as u16 + 2).min(area.width.saturating_sub(1)),
        area.y,
    ));
}

fn render_list(f: &mut Frame, app: &mut App, area: ratatui::layout::Rect) {
    let height = (area.height as usize).max(1);
    app.page = height;

    // Keep the cursor inside the window
    if app.index < app.scroll {
        app.scroll = app.index;
    }
    if app.index >= app.scroll + height {
        app.scroll = app.index + 1 - height;
    }

    let mut rows = Vec::with_capacity(height);
    for (offset, item) in app.lines.iter().skip(app.scroll).take(height).enumerate() {
        let selected = app.scroll + offset == app.index;

        let mut style = Style::default();
        if selected {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if item.highlight {
            style = style.add_modifier(Modifier::BOLD);
        }

        rows.push(Line::from(vec![
            Span::raw(pad_right(&item.script, NAME_WIDTH)),
            Span::styled(
                if item.highlight { BAR_HIGHLIGHT } else { BAR },
                Style::default().fg(Color::Indexed(item.colour)),
            ),
            Span::raw(" "),
            Span::styled(item.display.clone(), style),
        ]));
    }

    f.render_widget(Paragraph::new(rows), area);
}

fn render_footer(f: &mut Frame, app: &App, registry: &Registry, area: ratatui::layout::Rect) {
    let mut spans = vec![Span::styled("# ", Style::default().fg(Color::DarkGray))];

    for script in registry.iter() {
        if spans.len() > 1 {
            spans.push(Span::raw(" "));
        }
        let style = if app.visible_scripts.iter().any(|n| n == script.name()) {
            Style::default().add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(script.name().to_string(), style));
    }

    if let Some(message) = &app.status_message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Pad without `format!` in the row loop.
fn pad_right(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(width.max(s.len()));
    out.push_str(s);
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}
