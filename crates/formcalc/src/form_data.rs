use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use crate::value::Value;

/// Reserved top-level key holding cell styles in the JSON snapshot.
pub const STYLES_KEY: &str = "_styles";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("form data snapshot must be a JSON object")]
    NotAnObject,
    #[error("sheet `{sheet}` must be a JSON object")]
    InvalidSheet { sheet: String },
    #[error("cell `{sheet}:{cell}` must hold a number, string or boolean")]
    InvalidCell { sheet: String, cell: String },
    #[error("style entry `{path}` must be a JSON object")]
    InvalidStyle { path: String },
    #[error("invalid form data JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A `"Sheet:Cell"` reference.
///
/// The reserved [`STYLES_KEY`] sheet is not addressable: `"_styles:A1"` is treated as
/// malformed, so scripts can neither read nor overwrite style records as cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef<'a> {
    pub sheet: &'a str,
    pub cell: &'a str,
}

impl<'a> CellRef<'a> {
    /// Split `text` on `:`. Exactly two non-empty parts are required; the reserved styles
    /// sheet is never addressable.
    pub fn parse(text: &'a str) -> Option<Self> {
        let mut parts = text.split(':');
        let sheet = parts.next()?;
        let cell = parts.next()?;
        if parts.next().is_some() || sheet.is_empty() || cell.is_empty() || sheet == STYLES_KEY {
            return None;
        }
        Some(Self { sheet, cell })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellStyle {
    pub background_color: Value,
}

/// The document's cell values, `sheet -> cell -> value`, plus per-cell styles.
///
/// Serializes to the flat JSON snapshot shape with styles nested under [`STYLES_KEY`].
/// Keys are kept sorted so output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct FormData {
    sheets: BTreeMap<String, BTreeMap<String, Value>>,
    styles: BTreeMap<String, BTreeMap<String, CellStyle>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::try_from(value)
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(self.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty() && self.styles.is_empty()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, sheet: &str) -> Option<&BTreeMap<String, Value>> {
        self.sheets.get(sheet)
    }

    pub fn get(&self, sheet: &str, cell: &str) -> Option<&Value> {
        self.sheets.get(sheet)?.get(cell)
    }

    pub fn set(&mut self, sheet: &str, cell: &str, value: Value) {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .insert(cell.to_string(), value);
    }

    pub fn style(&self, sheet: &str, cell: &str) -> Option<&CellStyle> {
        self.styles.get(sheet)?.get(cell)
    }

    pub fn set_style(&mut self, sheet: &str, cell: &str, style: CellStyle) {
        self.styles
            .entry(sheet.to_string())
            .or_default()
            .insert(cell.to_string(), style);
    }

    /// Every stored cell as `(sheet, cell, value)`, in key order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.sheets.iter().flat_map(|(sheet, cells)| {
            cells
                .iter()
                .map(move |(cell, value)| (sheet.as_str(), cell.as_str(), value))
        })
    }

    /// Every stored style as `(sheet, cell, style)`, in key order.
    pub fn styles(&self) -> impl Iterator<Item = (&str, &str, &CellStyle)> {
        self.styles.iter().flat_map(|(sheet, cells)| {
            cells
                .iter()
                .map(move |(cell, style)| (sheet.as_str(), cell.as_str(), style))
        })
    }
}

fn scalar_from_json(value: &JsonValue) -> Option<Option<Value>> {
    match value {
        JsonValue::Null => Some(None),
        JsonValue::Bool(b) => Some(Some(Value::Boolean(*b))),
        JsonValue::Number(n) => n.as_f64().map(|v| Some(Value::Number(v))),
        JsonValue::String(s) => Some(Some(Value::String(s.clone()))),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Sheets serialized by PHP-style backends come through as `[]` when empty.
fn as_object_or_empty(value: &JsonValue) -> Option<Option<&JsonMap<String, JsonValue>>> {
    match value {
        JsonValue::Object(map) => Some(Some(map)),
        JsonValue::Array(items) if items.is_empty() => Some(None),
        _ => None,
    }
}

fn parse_styles(
    raw: &JsonValue,
) -> Result<BTreeMap<String, BTreeMap<String, CellStyle>>, SnapshotError> {
    let mut styles = BTreeMap::new();
    let Some(sheets) = as_object_or_empty(raw).ok_or_else(|| SnapshotError::InvalidStyle {
        path: STYLES_KEY.to_string(),
    })?
    else {
        return Ok(styles);
    };

    for (sheet, cells) in sheets {
        let Some(cells) = as_object_or_empty(cells).ok_or_else(|| SnapshotError::InvalidStyle {
            path: format!("{STYLES_KEY}.{sheet}"),
        })?
        else {
            continue;
        };

        let mut out = BTreeMap::new();
        for (cell, record) in cells {
            let path = format!("{STYLES_KEY}.{sheet}.{cell}");
            let JsonValue::Object(record) = record else {
                return Err(SnapshotError::InvalidStyle { path });
            };
            let color = match record.get("backgroundColor") {
                Some(raw) => scalar_from_json(raw).ok_or(SnapshotError::InvalidStyle { path })?,
                None => None,
            };
            if let Some(background_color) = color {
                out.insert(cell.clone(), CellStyle { background_color });
            }
        }
        if !out.is_empty() {
            styles.insert(sheet.clone(), out);
        }
    }
    Ok(styles)
}

impl TryFrom<JsonValue> for FormData {
    type Error = SnapshotError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let JsonValue::Object(root) = value else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut form_data = FormData::new();
        for (sheet, raw_cells) in &root {
            if sheet == STYLES_KEY {
                form_data.styles = parse_styles(raw_cells)?;
                continue;
            }
            if raw_cells.is_null() {
                continue;
            }

            let Some(cells) = as_object_or_empty(raw_cells).ok_or_else(|| {
                SnapshotError::InvalidSheet {
                    sheet: sheet.clone(),
                }
            })?
            else {
                form_data.sheets.entry(sheet.clone()).or_default();
                continue;
            };

            let entry = form_data.sheets.entry(sheet.clone()).or_default();
            for (cell, raw) in cells {
                let value = scalar_from_json(raw).ok_or_else(|| SnapshotError::InvalidCell {
                    sheet: sheet.clone(),
                    cell: cell.clone(),
                })?;
                if let Some(value) = value {
                    entry.insert(cell.clone(), value);
                }
            }
        }
        Ok(form_data)
    }
}

impl From<FormData> for JsonValue {
    fn from(form_data: FormData) -> Self {
        let mut root = JsonMap::new();
        for (sheet, cells) in form_data.sheets {
            let cells: JsonMap<String, JsonValue> = cells
                .iter()
                .map(|(cell, value)| (cell.clone(), value.to_json()))
                .collect();
            root.insert(sheet, JsonValue::Object(cells));
        }

        if !form_data.styles.is_empty() {
            let styles: JsonMap<String, JsonValue> = form_data
                .styles
                .iter()
                .map(|(sheet, cells)| {
                    let cells: JsonMap<String, JsonValue> = cells
                        .iter()
                        .map(|(cell, style)| {
                            let mut record = JsonMap::new();
                            record.insert(
                                "backgroundColor".to_string(),
                                style.background_color.to_json(),
                            );
                            (cell.clone(), JsonValue::Object(record))
                        })
                        .collect();
                    (sheet.clone(), JsonValue::Object(cells))
                })
                .collect();
            root.insert(STYLES_KEY.to_string(), JsonValue::Object(styles));
        }

        JsonValue::Object(root)
    }
}
