//! Terminal User Interface (TUI) for Tablescope
//!
//! Two screens: the table grid and the connection dialog drawn over it.

pub mod app;
pub mod dialog;
pub mod main_screen;

pub use app::{App, Screen};
pub use dialog::{render_dialog, ConnectionDialog, DialogResult};
pub use main_screen::render_main;

use crate::core::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tracing::info;

/// Draw the current screen
pub fn render_ui<B: Backend>(f: &mut Frame<B>, app: &mut App) {
    render_main(f, app);
    if app.screen == Screen::Dialog {
        render_dialog(f, &app.dialog);
    }
}

/// Run the interactive TUI until the user quits
pub fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = event_loop(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    info!(screen = ?app.screen, "Starting table browser");
    if app.screen == Screen::Main {
        app.reload();
    }

    while !app.should_quit {
        terminal.draw(|f| render_ui(f, app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key_event) = event::read()? {
                app.handle_key(key_event.code);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SampleDatabase;
    use crossterm::event::KeyCode;
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|line| line.iter().map(|c| c.symbol.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_main_screen_lists_tables() {
        let db = SampleDatabase::with_sample_data();
        let mut app = App::new(Some(db.connection_string.clone()), 30, true);
        app.reload();

        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        terminal.draw(|f| render_ui(f, &mut app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("posts"));
        assert!(text.contains("categories"));
        assert!(text.contains("4 tables"));
        assert!(text.contains("r reload"));
    }

    #[test]
    fn test_dialog_is_drawn_over_main() {
        let mut app = App::new(None, 30, false);
        app.handle_key(KeyCode::Char('a'));

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|f| render_ui(f, &mut app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("Connection string:"));
        assert!(text.contains("[Enter] OK"));
        assert!(!text.contains("r reload"));
    }
}
