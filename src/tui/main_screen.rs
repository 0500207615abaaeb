//! Main screen: the table grid and the status line

use crate::tui::app::App;
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

const TIPS: &str = "Up/Down select | r reload | c connect | q quit";

pub fn render_main<B: Backend>(f: &mut Frame<B>, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(f.size());

    let header = Row::new(vec![Cell::from("Table"), Cell::from("Rows")]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let rows: Vec<Row> = app
        .tables
        .iter()
        .map(|t| Row::new(vec![Cell::from(t.name.clone()), Cell::from(t.records.to_string())]))
        .collect();
    let widths = [Constraint::Percentage(70), Constraint::Percentage(30)];
    let table = Table::new(rows)
        .header(header)
        .block(
            Block::default()
                .title(format!("Tables ({})", app.connection_string))
                .borders(Borders::ALL),
        )
        .widths(&widths)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(table, chunks[0], &mut app.table_state);

    let status = if app.show_status_tips {
        format!("{}  [{}]", app.status, TIPS)
    } else {
        app.status.clone()
    };
    let status = Paragraph::new(status).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[1]);
}
