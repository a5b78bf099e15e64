//! JSON-lines history of seen workflow runs.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;

use super::{MonitorError, WorkflowRecord};

/// Load every record, keyed by run id. Later lines win; undecodable lines are skipped.
pub fn load_history(path: &Path) -> Result<HashMap<String, WorkflowRecord>, MonitorError> {
    let mut history = HashMap::new();
    if !path.exists() {
        return Ok(history);
    }

    let file = File::open(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| MonitorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkflowRecord>(&line) {
            Ok(record) => {
                history.insert(record.database_id.to_string(), record);
            }
            Err(e) => debug!("Skipping history line {}: {}", index + 1, e),
        }
    }

    Ok(history)
}

/// Append one record as a single JSON line.
pub fn append_to_history(path: &Path, record: &WorkflowRecord) -> Result<(), MonitorError> {
    let io_err = |source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(line.as_bytes()).map_err(io_err)?;
    Ok(())
}
