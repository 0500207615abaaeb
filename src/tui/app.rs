//! Application state for the table browser

use crate::catalog::{DbInfo, TableInfo};
use crate::tui::dialog::{ConnectionDialog, DialogResult};
use crossterm::event::KeyCode;
use ratatui::widgets::TableState;
use tracing::{info, warn};

/// Which screen is in front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Main,
    Dialog,
}

/// Main application structure
#[derive(Debug)]
pub struct App {
    pub screen: Screen,
    pub connection_string: String,
    pub command_timeout: u32,
    pub show_status_tips: bool,
    pub tables: Vec<TableInfo>,
    pub table_state: TableState,
    pub status: String,
    pub dialog: ConnectionDialog,
    pub should_quit: bool,
}

impl App {
    /// Starts on the dialog when there is no connection string yet
    pub fn new(connection_string: Option<String>, command_timeout: u32, show_status_tips: bool) -> Self {
        let mut app = App {
            screen: Screen::Main,
            connection_string: connection_string.unwrap_or_default(),
            command_timeout,
            show_status_tips,
            tables: Vec::new(),
            table_state: TableState::default(),
            status: String::new(),
            dialog: ConnectionDialog::default(),
            should_quit: false,
        };
        if app.connection_string.trim().is_empty() {
            app.open_dialog();
        }
        app
    }

    /// Reloads the table report; failures land in the status line
    pub fn reload(&mut self) {
        if self.connection_string.trim().is_empty() {
            self.tables.clear();
            self.table_state.select(None);
            self.status = "No connection string; press c to connect".to_string();
            return;
        }

        let report = DbInfo::new(self.connection_string.clone())
            .with_timeout(self.command_timeout)
            .table_infos();
        match report {
            Ok(tables) => {
                info!(tables = tables.len(), "Loaded table report");
                self.status = format!("{} tables", tables.len());
                self.table_state
                    .select(if tables.is_empty() { None } else { Some(0) });
                self.tables = tables;
            }
            Err(err) => {
                warn!(error = %err, "Failed to load table report");
                self.tables.clear();
                self.table_state.select(None);
                self.status = format!("Failed to load tables: {}", err);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match self.screen {
            Screen::Main => self.handle_main_key(key),
            Screen::Dialog => self.handle_dialog_key(key),
        }
    }

    pub fn selected_table(&self) -> Option<&TableInfo> {
        self.table_state.selected().and_then(|i| self.tables.get(i))
    }

    /// Result of the last dialog shown
    pub fn dialog_result(&self) -> DialogResult {
        self.dialog.result
    }

    fn handle_main_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up => self.select_prev(),
            KeyCode::Down => self.select_next(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('c') => self.open_dialog(),
            _ => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Enter => {
                self.dialog.confirm();
                self.connection_string = self.dialog.value().to_string();
                self.screen = Screen::Main;
                self.reload();
            }
            KeyCode::Esc => {
                self.dialog.cancel();
                self.screen = Screen::Main;
                if self.connection_string.trim().is_empty() {
                    self.status = "No connection string; press c to connect".to_string();
                }
            }
            KeyCode::Char(c) => self.dialog.add_char(c),
            KeyCode::Backspace => self.dialog.backspace(),
            KeyCode::Left => self.dialog.cursor_left(),
            KeyCode::Right => self.dialog.cursor_right(),
            _ => {}
        }
    }

    fn open_dialog(&mut self) {
        self.dialog.open(&self.connection_string);
        self.screen = Screen::Dialog;
    }

    fn select_prev(&mut self) {
        if self.tables.is_empty() {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => 0,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    fn select_next(&mut self) {
        if self.tables.is_empty() {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < self.tables.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.table_state.select(Some(i));
    }
}
