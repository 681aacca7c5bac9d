//! Functions callable from scripts.
//!
//! Built-ins never fail. Malformed cell references turn reads into `""` and writes into
//! no-ops, and unknown function names evaluate to `0`.

use crate::form_data::{CellRef, CellStyle, FormData};
use crate::value::Value;

pub(crate) fn call(name: &str, args: &[Value], form_data: &mut FormData) -> Value {
    match name {
        "getValue" => get_value(args, form_data),
        "setValue" => set_value(args, form_data),
        "parseFloat" => parse_float(args),
        "setBgColor" => set_bg_color(args, form_data),
        _ => {
            log::warn!("unknown function `{name}` evaluates to 0");
            Value::Number(0.0)
        }
    }
}

fn arg_or_empty(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_else(Value::empty_string)
}

fn cell_ref_text(args: &[Value]) -> String {
    args.first().map(Value::to_string_lossy).unwrap_or_default()
}

fn get_value(args: &[Value], form_data: &FormData) -> Value {
    let raw = cell_ref_text(args);
    let Some(cell_ref) = CellRef::parse(&raw) else {
        log::debug!("getValue: malformed cell reference `{raw}`");
        return Value::empty_string();
    };
    form_data
        .get(cell_ref.sheet, cell_ref.cell)
        .cloned()
        .unwrap_or_else(Value::empty_string)
}

fn set_value(args: &[Value], form_data: &mut FormData) -> Value {
    let raw = cell_ref_text(args);
    let value = arg_or_empty(args, 1);
    match CellRef::parse(&raw) {
        Some(cell_ref) => form_data.set(cell_ref.sheet, cell_ref.cell, value.clone()),
        None => log::debug!("setValue: malformed cell reference `{raw}`, nothing written"),
    }
    value
}

fn parse_float(args: &[Value]) -> Value {
    Value::Number(args.first().map_or(0.0, Value::to_number))
}

fn set_bg_color(args: &[Value], form_data: &mut FormData) -> Value {
    let raw = cell_ref_text(args);
    let color = arg_or_empty(args, 1);
    match CellRef::parse(&raw) {
        Some(cell_ref) => form_data.set_style(
            cell_ref.sheet,
            cell_ref.cell,
            CellStyle {
                background_color: color.clone(),
            },
        ),
        None => log::debug!("setBgColor: malformed cell reference `{raw}`, nothing written"),
    }
    color
}
