//! Locally persisted board layout.
//!
//! Column order and the order of cards inside a column are view-local: they
//! are never sent to the server. They are kept per project in
//! `<data_dir>/<project>_layout.json` so they survive a restart of the client
//! on the same machine.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LayoutError;
use crate::projection::Column;

/// Saved column and card order for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardLayout {
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default)]
    pub card_order: BTreeMap<String, Vec<String>>,
}

impl BoardLayout {
    /// Load a layout, falling back to an empty one if the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return BoardLayout::default();
        }
        match fs::read_to_string(path) {
            Ok(buf) => match serde_json::from_str(&buf) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "layout file is corrupt, starting fresh");
                    BoardLayout::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "layout file unreadable, starting fresh");
                BoardLayout::default()
            }
        }
    }

    /// Save the layout using an atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        let io_err = |source| LayoutError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp).map_err(io_err)?;
        f.write_all(data.as_bytes()).map_err(io_err)?;
        f.flush().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Remember the current column order.
    pub fn record_columns(&mut self, columns: &[Column]) {
        self.column_order = columns.iter().map(|c| c.id.clone()).collect();
    }

    /// Remember the current card order of one column.
    pub fn record_cards(&mut self, column: &Column) {
        let ids = column.cards.iter().map(|t| t.id.clone()).collect();
        self.card_order.insert(column.id.clone(), ids);
    }
}

/// Layout file for a project.
pub fn layout_path(data_dir: &Path, project: &str) -> PathBuf {
    data_dir.join(format!("{}_layout.json", sanitize_project_name(project)))
}

/// Convert a project id to a safe file name stem.
/// Lowercases and collapses anything non-alphanumeric into single underscores.
pub fn sanitize_project_name(project: &str) -> String {
    project
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
