use crate::catalog::TableInfo;
use crate::core::db::DataTable;
use crate::core::{DalError, Result, Value};

/// Results Grid Module for Tablescope
///
/// A plain grid of headers and rows built from query results or the table
/// report. It renders aligned text for the terminal and exports to CSV,
/// JSON and Markdown.
use serde_json::{Map, Number};

/// Represents a single cell in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: String,
    pub cell_type: CellType,
}

/// Kind of value a cell was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        let cell_type = match value {
            Value::Null => CellType::Null,
            Value::Integer(_) => CellType::Integer,
            Value::Real(_) => CellType::Real,
            Value::Text(_) => CellType::Text,
            Value::Blob(_) => CellType::Blob,
        };
        Cell {
            content: value.to_string(),
            cell_type,
        }
    }
}

/// Represents a row of cells in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub row_index: usize,
}

/// Represents the entire grid structure.
#[derive(Debug, Clone, Default)]
pub struct ResultsGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultsGrid {
    /// Creates a new, empty ResultsGrid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid with one row per record of `table`
    pub fn from_table(table: &DataTable) -> Self {
        let mut grid = ResultsGrid::new();
        grid.set_headers(table.columns().to_vec());
        for record in table.rows() {
            grid.add_cells(record.values().iter().map(Cell::from).collect());
        }
        grid
    }

    /// The table report: one `(name, rows)` line per table
    pub fn from_table_infos(infos: &[TableInfo]) -> Self {
        let mut grid = ResultsGrid::new();
        grid.set_headers(vec!["name".to_string(), "rows".to_string()]);
        for info in infos {
            grid.add_cells(vec![
                Cell::from(&Value::from(info.name.as_str())),
                Cell::from(&Value::Integer(info.records)),
            ]);
        }
        grid
    }

    /// Sets the headers for the grid.
    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    /// Adds a row of text cells.
    pub fn add_row(&mut self, row: Vec<String>) {
        let cells = row
            .into_iter()
            .map(|content| Cell {
                content,
                cell_type: CellType::Text,
            })
            .collect();
        self.add_cells(cells);
    }

    pub fn add_cells(&mut self, cells: Vec<Cell>) {
        self.rows.push(Row {
            cells,
            row_index: self.rows.len(),
        });
    }

    /// Width of each column: the longest header or cell content
    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(|r| r.cells.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        (0..columns)
            .map(|i| {
                let header = self.headers.get(i).map(|h| h.chars().count()).unwrap_or(0);
                self.rows
                    .iter()
                    .filter_map(|r| r.cells.get(i))
                    .map(|c| c.content.chars().count())
                    .fold(header, usize::max)
            })
            .collect()
    }

    /// Renders the grid as aligned text with a header underline.
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut output = String::new();
        if !self.headers.is_empty() {
            output.push_str(&pad_line(self.headers.iter().map(String::as_str), &widths));
            output.push('\n');
            let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            output.push_str(&underline.join("-|-"));
            output.push('\n');
        }
        for row in &self.rows {
            output.push_str(&pad_line(row.cells.iter().map(|c| c.content.as_str()), &widths));
            output.push('\n');
        }
        output
    }

    /// Exports the grid data to a specified format.
    /// Supported formats: table, CSV, JSON, Markdown.
    pub fn export(&self, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "table" => Ok(self.render()),
            "csv" => Ok(self.export_to_csv()),
            "json" => self.export_to_json(),
            "markdown" => Ok(self.export_to_markdown()),
            _ => Err(DalError::Ui(format!(
                "Unsupported export format: '{}'. Supported formats: table, csv, json, markdown",
                format
            ))),
        }
    }

    fn export_to_csv(&self) -> String {
        let mut output = String::new();
        if !self.headers.is_empty() {
            let headers: Vec<String> = self.headers.iter().map(|h| csv_field(h)).collect();
            output.push_str(&headers.join(","));
            output.push('\n');
        }
        for row in &self.rows {
            let fields: Vec<String> = row.cells.iter().map(|c| csv_field(&c.content)).collect();
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }

    fn export_to_json(&self) -> Result<String> {
        let rows: Vec<Map<String, serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .zip(&self.headers)
                    .map(|(cell, header)| (header.clone(), json_value(cell)))
                    .collect()
            })
            .collect();
        Ok(serde_json::to_string(&rows)?)
    }

    fn export_to_markdown(&self) -> String {
        let mut output = String::new();
        if !self.headers.is_empty() {
            output.push_str(&self.headers.join(" | "));
            output.push('\n');
            let underline: Vec<String> = self
                .headers
                .iter()
                .map(|h| "-".repeat(h.chars().count().max(3)))
                .collect();
            output.push_str(&underline.join(" | "));
            output.push('\n');
        }
        for row in &self.rows {
            let row_content: Vec<String> = row
                .cells
                .iter()
                .map(|cell| cell.content.replace('|', "\\|"))
                .collect();
            output.push_str(&row_content.join(" | "));
            output.push('\n');
        }
        output
    }
}

fn pad_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(content, width)| format!("{:<width$}", content, width = *width))
        .collect();
    padded.join(" | ").trim_end().to_string()
}

fn csv_field(content: &str) -> String {
    if content.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", content.replace('"', "\"\""))
    } else {
        content.to_string()
    }
}

fn json_value(cell: &Cell) -> serde_json::Value {
    match cell.cell_type {
        CellType::Null => serde_json::Value::Null,
        CellType::Integer => cell
            .content
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(cell.content.clone())),
        CellType::Real => cell
            .content
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(cell.content.clone())),
        CellType::Text | CellType::Blob => serde_json::Value::String(cell.content.clone()),
    }
}
