//! Consumer-preference profile from an uploaded survey table.

use crate::table::DataTable;
use nutriwave_protocol::CustomerProfile;
use serde::{Deserialize, Serialize};

/// Column choice meaning "no column for this metric".
pub const NONE_COLUMN: &str = "(none)";

/// Column chosen for each of the four metrics. `None`, an empty name or
/// [`NONE_COLUMN`] all mean "not selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileColumns {
    pub beany: Option<String>,
    pub sweet: Option<String>,
    pub texture: Option<String>,
    pub overall: Option<String>,
}

impl ProfileColumns {
    pub fn is_empty(&self) -> bool {
        [&self.beany, &self.sweet, &self.texture, &self.overall]
            .into_iter()
            .all(|c| selected(c.as_deref()).is_none())
    }
}

fn selected(column: Option<&str>) -> Option<&str> {
    column
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != NONE_COLUMN)
}

/// Mean of the numeric cells of `column`. Non-numeric and empty cells are
/// skipped, as are non-finite values (`inf`, `NaN`). No numeric cells, or
/// no such column, gives `None`.
pub fn column_mean(table: &DataTable, column: &str) -> Option<f64> {
    let Some(cells) = table.column(column) else {
        tracing::warn!(column, "selected profile column not found in table");
        return None;
    };
    let (sum, count) = cells
        .filter_map(|cell| cell.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        tracing::debug!(column, "no numeric cells");
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn extract(table: &DataTable, columns: &ProfileColumns) -> CustomerProfile {
    let mean = |c: &Option<String>| selected(c.as_deref()).and_then(|c| column_mean(table, c));
    let profile = CustomerProfile {
        rows: table.row_count(),
        beany_mean: mean(&columns.beany),
        sweet_mean: mean(&columns.sweet),
        texture_mean: mean(&columns.texture),
        overall_mean: mean(&columns.overall),
    };
    tracing::info!(rows = profile.rows, "extracted customer profile");
    profile
}

/// Selected columns the table does not have.
pub fn missing_columns(table: &DataTable, columns: &ProfileColumns) -> Vec<String> {
    [&columns.beany, &columns.sweet, &columns.texture, &columns.overall]
        .into_iter()
        .filter_map(|c| selected(c.as_deref()))
        .filter(|c| table.column_index(c).is_none())
        .map(str::to_string)
        .collect()
}
