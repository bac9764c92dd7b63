//! Per-frame score log parsing.
//!
//! The quality tools emit one line per frame and label:
//!
//! ```text
//! vif: 0 0.923
//! vif: 1 0.911
//! adm: 0 0.801
//! ```
//!
//! Frame indices for one label must appear contiguously starting at 0.
//! Tools interleave banners and several labels in one log, so lines that do
//! not start with the requested label are skipped.

use std::path::Path;

use crate::error::{LogParseError, MediaError, MediaResult};

/// Parse the per-frame series for `label` out of log `content`.
///
/// A matching line has the shape `"<label>: <frame_index> <value>"`. The
/// parse fails when zero lines match, when the frame index sequence has a
/// gap or repeat, or when a matching line carries an unparseable index or
/// value.
pub fn parse_labeled_series(content: &str, label: &str) -> Result<Vec<f64>, LogParseError> {
    let prefix = format!("{}:", label);
    let mut values = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(&prefix) else {
            continue;
        };

        let mut fields = rest.split_whitespace();
        let (Some(idx_str), Some(value_str), None) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(LogParseError::BadLine {
                label: label.to_string(),
                line_no: line_no + 1,
            });
        };

        let (Ok(idx), Ok(value)) = (idx_str.parse::<usize>(), value_str.parse::<f64>()) else {
            return Err(LogParseError::BadLine {
                label: label.to_string(),
                line_no: line_no + 1,
            });
        };

        if idx != values.len() {
            return Err(LogParseError::NonContiguous {
                label: label.to_string(),
                expected: values.len(),
                found: idx,
            });
        }
        values.push(value);
    }

    if values.is_empty() {
        return Err(LogParseError::Empty {
            label: label.to_string(),
        });
    }

    Ok(values)
}

/// Read a log file and parse the per-frame series for `label`.
pub async fn read_labeled_series(path: &Path, label: &str) -> MediaResult<Vec<f64>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_labeled_series(&content, label).map_err(MediaError::from)
}
