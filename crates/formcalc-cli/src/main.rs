use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use formcalc::{parse_script, ExecutionLimits, FormData, Interpreter, MAX_STATEMENTS, STYLES_KEY};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Parser)]
#[command(name = "formcalc")]
#[command(about = "Run form calculation scripts against a JSON form-data snapshot and emit deterministic JSON reports.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script and emit the resulting cell diffs.
    Run(RunArgs),
    /// Parse a script without evaluating it.
    Check(CheckArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Path to the calculation script.
    #[arg(long)]
    script: PathBuf,

    /// Optional form-data snapshot path. If omitted, reads JSON from stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Statement ceiling for the run. Values above the built-in ceiling are clamped.
    #[arg(long = "max-statements", default_value_t = MAX_STATEMENTS)]
    max_statements: usize,

    /// On failure, report the snapshot as left by the statements that ran instead of the
    /// unmodified input.
    #[arg(long = "keep-partial")]
    keep_partial: bool,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    /// Path to the calculation script.
    #[arg(long)]
    script: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CellDiff {
    before: Option<JsonValue>,
    after: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    ok: bool,
    error: Option<String>,
    /// Statements executed; absent when the run failed.
    statements: Option<usize>,
    /// Deterministic cell diffs, grouped by sheet name then cell id. Style changes are
    /// listed under `_styles` keyed by `sheet:cell`.
    cell_diffs: BTreeMap<String, BTreeMap<String, CellDiff>>,
    form_data_after: FormData,
}

impl RunReport {
    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
            statements: None,
            cell_diffs: BTreeMap::new(),
            form_data_after: FormData::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    ok: bool,
    statements: usize,
    error: Option<String>,
}

type Snapshot = BTreeMap<String, BTreeMap<String, JsonValue>>;

fn snapshot(form_data: &FormData) -> Snapshot {
    let mut out = Snapshot::new();
    for (sheet, cell, value) in form_data.cells() {
        out.entry(sheet.to_string())
            .or_default()
            .insert(cell.to_string(), value.to_json());
    }
    for (sheet, cell, style) in form_data.styles() {
        out.entry(STYLES_KEY.to_string()).or_default().insert(
            format!("{sheet}:{cell}"),
            json!({ "backgroundColor": style.background_color.to_json() }),
        );
    }
    out
}

fn diff_form_data(
    before: &FormData,
    after: &FormData,
) -> BTreeMap<String, BTreeMap<String, CellDiff>> {
    let before_snap = snapshot(before);
    let after_snap = snapshot(after);

    let mut out = BTreeMap::new();
    let sheet_names: BTreeSet<&String> = before_snap.keys().chain(after_snap.keys()).collect();

    for sheet_name in sheet_names {
        let before_cells = before_snap.get(sheet_name);
        let after_cells = after_snap.get(sheet_name);
        let cell_ids: BTreeSet<&String> = before_cells
            .into_iter()
            .flat_map(BTreeMap::keys)
            .chain(after_cells.into_iter().flat_map(BTreeMap::keys))
            .collect();

        let mut sheet_diffs: BTreeMap<String, CellDiff> = BTreeMap::new();
        for cell_id in cell_ids {
            let before_value = before_cells.and_then(|cells| cells.get(cell_id)).cloned();
            let after_value = after_cells.and_then(|cells| cells.get(cell_id)).cloned();
            if before_value == after_value {
                continue;
            }
            sheet_diffs.insert(
                cell_id.clone(),
                CellDiff {
                    before: before_value,
                    after: after_value,
                },
            );
        }

        if !sheet_diffs.is_empty() {
            out.insert(sheet_name.clone(), sheet_diffs);
        }
    }

    out
}

fn read_script(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
}

fn read_all_input(input: &Option<PathBuf>) -> Result<Vec<u8>, String> {
    if let Some(path) = input {
        std::fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))
    } else {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        Ok(buf)
    }
}

fn parse_form_data(bytes: &[u8]) -> Result<FormData, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(FormData::new());
    }
    let json = std::str::from_utf8(bytes)
        .map_err(|e| format!("Invalid form data snapshot: input is not UTF-8: {e}"))?;
    FormData::from_json_str(json).map_err(|e| format!("Invalid form data snapshot: {e}"))
}

fn run_script(before: &FormData, script: &str, args: &RunArgs) -> RunReport {
    let limits = ExecutionLimits {
        max_statements: args.max_statements,
    };
    let mut working = before.clone();

    match Interpreter::new(script).with_limits(limits).run(&mut working) {
        Ok(summary) => RunReport {
            ok: true,
            error: None,
            statements: Some(summary.statements),
            cell_diffs: diff_form_data(before, &working),
            form_data_after: working,
        },
        Err(err) => {
            let after = if args.keep_partial {
                working
            } else {
                before.clone()
            };
            RunReport {
                ok: false,
                error: Some(err.to_string()),
                statements: None,
                cell_diffs: diff_form_data(before, &after),
                form_data_after: after,
            }
        }
    }
}

/// Print `report` as one JSON line. A closed stdout is not an error.
fn emit<T: Serialize>(report: &T) {
    let json = match serde_json::to_string(report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize report: {e}");
            std::process::exit(2);
        }
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{json}").and_then(|()| stdout.flush()) {
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            eprintln!("Failed to write report: {e}");
            std::process::exit(2);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let script = match read_script(&args.script) {
                Ok(s) => s,
                Err(e) => {
                    emit(&RunReport::failed(e));
                    std::process::exit(1);
                }
            };

            let before = match read_all_input(&args.input).and_then(|b| parse_form_data(&b)) {
                Ok(form_data) => form_data,
                Err(e) => {
                    emit(&RunReport::failed(e));
                    std::process::exit(1);
                }
            };

            let report = run_script(&before, &script, &args);
            emit(&report);
            if !report.ok {
                std::process::exit(1);
            }
        }
        Command::Check(args) => {
            let report = match read_script(&args.script) {
                Ok(script) => match parse_script(&script) {
                    Ok(stmts) => CheckReport {
                        ok: true,
                        statements: stmts.len(),
                        error: None,
                    },
                    Err(e) => CheckReport {
                        ok: false,
                        statements: 0,
                        error: Some(e.to_string()),
                    },
                },
                Err(e) => CheckReport {
                    ok: false,
                    statements: 0,
                    error: Some(e),
                },
            };

            emit(&report);
            if !report.ok {
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcalc::{CellStyle, Value};

    #[test]
    fn diff_reports_changed_cells_and_styles() {
        let mut before = FormData::new();
        before.set("Sheet1", "A1", Value::from(1));
        before.set("Sheet1", "A2", Value::from("same"));

        let mut after = before.clone();
        after.set("Sheet1", "A1", Value::from(2));
        after.set("Sheet2", "B1", Value::from(true));
        after.set_style(
            "Sheet1",
            "A1",
            CellStyle {
                background_color: Value::from("#fff"),
            },
        );

        let diffs = diff_form_data(&before, &after);
        assert_eq!(
            serde_json::to_value(&diffs).unwrap(),
            json!({
                "Sheet1": { "A1": { "before": 1, "after": 2 } },
                "Sheet2": { "B1": { "before": null, "after": true } },
                "_styles": {
                    "Sheet1:A1": { "before": null, "after": { "backgroundColor": "#fff" } }
                }
            })
        );
    }

    #[test]
    fn snapshot_input_parsing() {
        assert_eq!(parse_form_data(b" \n").unwrap(), FormData::new());
        assert!(parse_form_data(b"[1, 2]").is_err());
        assert!(parse_form_data(b"{\"S\": {\"A1\": \xff}}").is_err());
        assert_eq!(
            parse_form_data(br#"{"S": {"A1": 2}}"#).unwrap().get("S", "A1"),
            Some(&Value::from(2))
        );
    }
}
