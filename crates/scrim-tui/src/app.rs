//! Application state and per-frame refresh for the TUI.

use scrim_core::{Engine, Registry, Selection, display_text, line_matches, resolve, strip_directives};
use std::sync::Arc;

/// One row of the filtered list.
pub struct VisibleLine {
    /// Owning script name.
    pub script: String,
    /// Directive-stripped text; this is what a selection passes back to
    /// the script.
    pub text: String,
    /// Column-filtered cell text actually rendered.
    pub display: String,
    pub highlight: bool,
    pub colour: u8,
}

/// Main application state. Owned by the render loop; execution tasks
/// never touch it directly.
pub struct App {
    pub input: String,
    pub cursor_position: usize,
    pub selection: Selection,
    pub lines: Vec<VisibleLine>,
    pub visible_scripts: Vec<String>,
    pub index: usize,
    pub scroll: usize,
    /// List height from the last draw, used for paging.
    pub page: usize,
    pub status_message: Option<String>,
    pub should_quit: bool,
    pub spinner_frame: usize,
    last_query: String,
}

impl App {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            selection: Selection {
                scripts: Vec::new(),
                query: String::new(),
            },
            lines: Vec::new(),
            visible_scripts: Vec::new(),
            index: 0,
            scroll: 0,
            page: 1,
            status_message: None,
            should_quit: false,
            spinner_frame: 0,
            last_query: String::new(),
        }
    }

    /// Recompute everything derived from the query: the active set,
    /// debounce windows, pending loads, the filtered list, and interval
    /// staleness. Runs once per loop iteration, after events applied.
    pub fn refresh(&mut self, engine: &mut Engine) {
        let registry = Arc::clone(engine.registry());
        let table = Arc::clone(engine.table());

        let selection = resolve(&self.input, &table, &registry);

        // The very first empty query is not a change; debounce only
        // fires once the user actually types.
        if selection.query != self.last_query {
            engine.query_changed(&selection);
            self.last_query.clone_from(&selection.query);
        }

        engine.ensure_loaded(&selection);
        self.rebuild_visible(&selection, &registry);
        engine.check_intervals(&self.visible_scripts);
        self.selection = selection;
    }

    fn rebuild_visible(&mut self, selection: &Selection, registry: &Registry) {
        self.lines.clear();
        self.visible_scripts.clear();

        for name in &selection.scripts {
            let Some(script) = registry.get(name) else {
                continue;
            };
            let conf = script.conf();

            let mut script_visible = false;
            let mut shown = 0usize;
            for raw in script.lines() {
                if !(self.input.is_empty() || line_matches(&raw, &selection.query)) {
                    continue;
                }
                script_visible = true;
                if conf.preview.is_some_and(|cap| shown >= cap) {
                    continue;
                }
                shown += 1;

                let (text, style) = strip_directives(&raw);
                self.lines.push(VisibleLine {
                    script: name.clone(),
                    text: text.to_string(),
                    display: display_text(text, &conf.columns),
                    highlight: style.highlight,
                    colour: conf.colour,
                });
            }
            if script_visible {
                self.visible_scripts.push(name.clone());
            }
        }

        if self.index >= self.lines.len() {
            self.index = self.lines.len().saturating_sub(1);
        }
    }

    pub fn active_line(&self) -> Option<&VisibleLine> {
        self.lines.get(self.index)
    }

    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    pub fn select_next(&mut self) {
        self.index = (self.index + 1).min(self.lines.len().saturating_sub(1));
    }

    pub fn select_previous(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.index = 0;
    }

    pub fn select_last(&mut self) {
        self.index = self.lines.len().saturating_sub(1);
    }

    pub fn page_down(&mut self) {
        self.index = (self.index + self.page).min(self.lines.len().saturating_sub(1));
    }

    pub fn page_up(&mut self) {
        self.index = self.index.saturating_sub(self.page);
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        self.cursor_position = self.clamp_cursor(self.cursor_position.saturating_add(1));
    }

    pub fn enter_char(&mut self, c: char) {
        let byte_index = self.byte_index();
        self.input.insert(byte_index, c);
        self.move_cursor_right();
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            let current_index = self.cursor_position;
            let before_char_to_delete = self.input.chars().take(current_index - 1);
            let after_char_to_delete = self.input.chars().skip(current_index);
            self.input = before_char_to_delete.chain(after_char_to_delete).collect();
            self.move_cursor_left();
        }
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.clamp(0, self.input.chars().count())
    }

    /// Byte offset of the char cursor, for `String::insert`.
    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
