//! Arranges candidate mappings into a column-major grid and renders it.
//!
//! Entries are sorted, chunked into columns of at most `max_rows`, and each
//! column is sized independently: keys are padded to the widest key in
//! *that* column, and the column width comes from its widest formatted cell.

use crate::format::{text_width, visible_width, EntryFormatter};
use crate::mapping::{KeyStroke, MappingEntry, SortPolicy};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Extra columns added to every column's measured width.
pub const COLUMN_MARGIN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPolicy {
    /// Must be at least 1.
    pub max_rows: usize,
    pub include_typed_sequence: bool,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            max_rows: 10,
            include_typed_sequence: true,
        }
    }
}

/// Display-ready markup, opaque to everything but the popup surface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderedBlock(String);

impl RenderedBlock {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Formatted cells, top to bottom.
    pub cells: Vec<String>,
    /// Width every key in this column was padded to.
    pub key_width: usize,
    /// Display width of the widest cell plus [`COLUMN_MARGIN`].
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    pub columns: Vec<Column>,
    max_rows: usize,
}

impl Grid {
    /// Sort `entries` and split them into columns of `max_rows`.
    pub fn build(
        entries: &[MappingEntry],
        sort: SortPolicy,
        max_rows: usize,
        formatter: &dyn EntryFormatter,
    ) -> Self {
        debug_assert!(max_rows >= 1, "max_rows must be at least 1");

        let mut sorted = entries.to_vec();
        sort.sort(&mut sorted);

        let max_rows = max_rows.max(1);
        let columns = sorted
            .chunks(max_rows)
            .map(|chunk| Self::column(chunk, formatter))
            .collect();
        Self { columns, max_rows }
    }

    fn column(chunk: &[MappingEntry], formatter: &dyn EntryFormatter) -> Column {
        let key_width = chunk.iter().map(|e| text_width(&e.key)).max().unwrap_or(0);

        let cells: Vec<String> = chunk
            .iter()
            .map(|e| {
                let pad = key_width.saturating_sub(text_width(&e.key));
                let key = format!("{}{}", " ".repeat(pad), e.key);
                formatter.format(&key, &e.description, e.is_prefix)
            })
            .collect();

        let widest = cells.iter().map(|c| visible_width(c)).max().unwrap_or(0);

        Column {
            cells,
            key_width,
            width: widest + COLUMN_MARGIN,
        }
    }

    /// Always `max_rows` tall, short columns padded with empty cells.
    /// An empty grid has no rows.
    pub fn rows(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.max_rows
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.columns.get(column)?.cells.get(row).map(String::as_str)
    }

    /// Emit the grid row-major as a table, one `<td>` per column per row.
    pub fn render(&self) -> String {
        let mut out = String::from("<table>");
        for row in 0..self.rows() {
            out.push_str("<tr>");
            for column in &self.columns {
                let cell = column.cells.get(row).map_or("", String::as_str);
                let _ = write!(out, "<td width='{}'>{}</td>", column.width, cell);
            }
            out.push_str("</tr>");
        }
        out.push_str("</table>");
        out
    }
}

/// Build the popup content for one request.
pub fn layout(
    entries: &[MappingEntry],
    sort: SortPolicy,
    typed: &[KeyStroke],
    policy: &LayoutPolicy,
    formatter: &dyn EntryFormatter,
) -> RenderedBlock {
    let grid = Grid::build(entries, sort, policy.max_rows, formatter);
    let mut out = grid.render();

    if policy.include_typed_sequence {
        out.push_str("<hr>");
        out.push_str(&formatter.format_typed_sequence(typed));
    }

    RenderedBlock(out)
}
