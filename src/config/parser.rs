//! Line-oriented parameter-file parser.
//!
//! ```text
//! datadir: /data/ppta/
//! out: /out/noise/
//! {0}
//! noise_model_file: model_0.json
//! {1}
//! noise_model_file: model_1.json
//! sn_lgA: -18 -11
//! ```
//!
//! Rows before the first `{N}` marker go to the global namespace; rows after it go
//! to model `N` until the next marker.

use std::fs;
use std::path::Path;

use crate::config::schema::FieldSchema;
use crate::domain::{RunConfig, Value, ValueKind};
use crate::error::WarpError;

/// Read and parse a parameter file.
pub fn parse_params_file(path: &Path, schema: &FieldSchema) -> Result<RunConfig, WarpError> {
    let text = fs::read_to_string(path).map_err(|e| WarpError::io(path, e))?;
    parse_params_str(path, &text, schema)
}

/// Parse parameter-file contents. `path` is only used for error messages.
pub fn parse_params_str(path: &Path, text: &str, schema: &FieldSchema) -> Result<RunConfig, WarpError> {
    let mut run = RunConfig::new(path);
    let mut current: Option<usize> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(model_id) = model_marker(line) {
            current = Some(run.open_model(model_id));
            continue;
        }

        let mut tokens = line.split_whitespace();
        let key = tokens.next().unwrap_or_default();
        let data: Vec<&str> = tokens.collect();

        let spec = schema.lookup(key).ok_or_else(|| WarpError::UnknownField {
            path: path.to_path_buf(),
            line: line_no,
            key: key.to_string(),
        })?;

        if data.is_empty() {
            return Err(WarpError::MissingValue {
                path: path.to_path_buf(),
                line: line_no,
                key: key.to_string(),
            });
        }

        let kinds: Vec<ValueKind> = if spec.kinds.len() == 1 {
            vec![spec.kinds[0]; data.len()]
        } else if data.len() > spec.kinds.len() {
            return Err(WarpError::FieldArity {
                path: path.to_path_buf(),
                line: line_no,
                key: key.to_string(),
                expected: spec.kinds.len(),
                got: data.len(),
            });
        } else {
            spec.kinds.clone()
        };

        let mut values = Vec::with_capacity(data.len());
        for (token, kind) in data.iter().zip(kinds) {
            let value = kind.convert(token).ok_or_else(|| WarpError::FieldType {
                path: path.to_path_buf(),
                line: line_no,
                key: key.to_string(),
                token: token.to_string(),
                expected: kind,
            })?;
            values.push(value);
        }

        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::List(values)
        };

        match current {
            Some(model_idx) => run.models[model_idx].fields.insert(spec.attr.clone(), value),
            None => run.globals.insert(spec.attr.clone(), value),
        };
    }

    if run.models.is_empty() {
        run.open_model(0);
    }

    Ok(run)
}

/// `Some(N)` if the text between the first `{` and the following `}` is all digits.
fn model_marker(line: &str) -> Option<u32> {
    let open = line.find('{')?;
    let rest = &line[open + 1..];
    let close = rest.find('}')?;
    let inner = &rest[..close];
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inner.parse().ok()
}
