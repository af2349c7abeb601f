//! Flattening of boards into the plain-text context.

use std::collections::HashMap;

use super::Board;

/// Per-column fallback values for blank cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefaults {
    defaults: HashMap<String, String>,
    /// Shown for blank columns that have no registered default; such
    /// columns are omitted when unset.
    missing_marker: Option<String>,
}

impl Default for ColumnDefaults {
    fn default() -> Self {
        Self::new([
            ("Status", "Pending"),
            ("Owner", "Unassigned"),
            ("Due Date", "No deadline"),
            ("Priority", "Normal"),
            ("Stage", "Early stage"),
            ("Deal Value", "Value not finalized"),
        ])
    }
}

impl ColumnDefaults {
    pub fn new<I, K, V>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            defaults: defaults
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            missing_marker: None,
        }
    }

    pub fn with_missing_marker(mut self, marker: impl Into<String>) -> Self {
        self.missing_marker = Some(marker.into());
        self
    }

    /// Value to display for a column, or `None` when the line is omitted.
    pub fn display_value<'a>(&'a self, title: &str, text: Option<&'a str>) -> Option<&'a str> {
        match text {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => self
                .defaults
                .get(title)
                .or(self.missing_marker.as_ref())
                .map(String::as_str),
        }
    }
}

/// Renders boards in order: a header per board, then every item's columns.
pub fn format_boards(boards: &[Board], defaults: &ColumnDefaults) -> String {
    let mut text = String::new();
    for board in boards {
        text.push_str(&format!("\nBoard: {}\n", board.name));
        text.push_str(&"-".repeat(40));
        text.push('\n');

        for item in board.items() {
            text.push_str(&format!("Task: {}\n", item.name));
            for col in &item.column_values {
                let title = &col.column.title;
                if let Some(value) = defaults.display_value(title, col.text.as_deref()) {
                    text.push_str(&format!("{title}: {value}\n"));
                }
            }
            text.push('\n');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Column, ColumnValue, Item, ItemsPage};

    fn col(title: &str, text: Option<&str>) -> ColumnValue {
        ColumnValue {
            text: text.map(str::to_string),
            column: Column {
                title: title.to_string(),
            },
        }
    }

    fn board(name: &str, items: Vec<Item>) -> Board {
        Board {
            id: None,
            name: name.to_string(),
            items_page: ItemsPage { items },
        }
    }

    #[test]
    fn renders_headers_items_and_defaults() {
        let boards = vec![board(
            "Work Orders",
            vec![Item {
                name: "Install pumps".into(),
                column_values: vec![
                    col("Status", Some("Done")),
                    col("Owner", Some("  ")),
                    col("Due Date", None),
                    col("Notes", Some("")),
                ],
            }],
        )];
        let text = format_boards(&boards, &ColumnDefaults::default());
        let expected = format!(
            "\nBoard: Work Orders\n{}\nTask: Install pumps\nStatus: Done\n\
             Owner: Unassigned\nDue Date: No deadline\n\n",
            "-".repeat(40)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn blank_defaulted_columns_are_never_empty() {
        let defaults = ColumnDefaults::default();
        for title in ["Status", "Owner", "Due Date", "Priority", "Stage", "Deal Value"] {
            for blank in [None, Some(""), Some(" \t")] {
                let value = defaults.display_value(title, blank).unwrap();
                assert!(!value.trim().is_empty(), "{title} rendered blank");
            }
        }
    }

    #[test]
    fn missing_marker_fills_unregistered_columns() {
        let defaults = ColumnDefaults::default().with_missing_marker("not available");
        assert_eq!(defaults.display_value("Notes", None), Some("not available"));
        assert_eq!(defaults.display_value("Status", None), Some("Pending"));
    }

    #[test]
    fn boards_keep_response_order() {
        let boards = vec![board("B", vec![]), board("A", vec![])];
        let text = format_boards(&boards, &ColumnDefaults::default());
        assert!(text.find("Board: B").unwrap() < text.find("Board: A").unwrap());
    }
}
