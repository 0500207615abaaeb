//! Connection dialog: edits the connection string and closes with OK or Cancel

use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// How the dialog was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogResult {
    /// Still open, or never shown
    #[default]
    None,
    Ok,
    Cancel,
}

/// Text input dialog for the connection string
#[derive(Debug, Clone, Default)]
pub struct ConnectionDialog {
    pub input_text: String,
    /// Cursor position in characters
    pub input_cursor: usize,
    pub result: DialogResult,
}

impl ConnectionDialog {
    /// Opens the dialog pre-filled with `initial`
    pub fn open(&mut self, initial: &str) {
        self.input_text = initial.to_string();
        self.input_cursor = initial.chars().count();
        self.result = DialogResult::None;
    }

    pub fn confirm(&mut self) {
        self.result = DialogResult::Ok;
    }

    pub fn cancel(&mut self) {
        self.result = DialogResult::Cancel;
    }

    /// Add character to input text
    pub fn add_char(&mut self, c: char) {
        let at = self.byte_offset(self.input_cursor);
        self.input_text.insert(at, c);
        self.input_cursor += 1;
    }

    /// Backspace in input text
    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            let at = self.byte_offset(self.input_cursor - 1);
            self.input_text.remove(at);
            self.input_cursor -= 1;
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.input_cursor < self.input_text.chars().count() {
            self.input_cursor += 1;
        }
    }

    /// The edited connection string, trimmed
    pub fn value(&self) -> &str {
        self.input_text.trim()
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.input_text
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.input_text.len())
    }
}

/// Render the dialog centered on screen
pub fn render_dialog<B: Backend>(f: &mut Frame<B>, dialog: &ConnectionDialog) {
    let screen_area = f.size();
    let width = screen_area.width.saturating_sub(4).clamp(20, 80).min(screen_area.width);
    let height = 7.min(screen_area.height);
    let dialog_area = Rect {
        x: (screen_area.width.saturating_sub(width)) / 2,
        y: (screen_area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    f.render_widget(Clear, dialog_area);
    let block = Block::default()
        .title("Connection")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(block, dialog_area);

    let inner_area = Rect {
        x: dialog_area.x + 1,
        y: dialog_area.y + 1,
        width: dialog_area.width.saturating_sub(2),
        height: dialog_area.height.saturating_sub(2),
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(inner_area);

    let label = Paragraph::new("Connection string:").style(Style::default().fg(Color::White));
    f.render_widget(label, chunks[0]);

    let input = Paragraph::new(dialog.input_text.as_str()).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(input, chunks[1]);

    let buttons = Paragraph::new("[Enter] OK   [Esc] Cancel")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(buttons, chunks[3]);

    let cursor_x = chunks[1].x + dialog.input_cursor.min(u16::MAX as usize) as u16;
    if cursor_x < chunks[1].x + chunks[1].width {
        f.set_cursor(cursor_x, chunks[1].y);
    }
}
