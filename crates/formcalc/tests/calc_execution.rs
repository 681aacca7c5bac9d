use formcalc::{
    execute_calculations, parse_script, CalcError, CellStyle, ExecutionLimits, FormData,
    Interpreter, Stmt, Value, MAX_STATEMENTS,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn form(raw: serde_json::Value) -> FormData {
    FormData::try_from(raw).unwrap()
}

fn result_of(expr: &str) -> Value {
    let mut form_data = FormData::new();
    let summary = Interpreter::new(&format!("let result = {expr};"))
        .run(&mut form_data)
        .unwrap();
    summary.variables["result"].clone()
}

#[test]
fn arithmetic_precedence_and_exponent_associativity() {
    assert_eq!(result_of("1 + 2 * 3"), Value::Number(7.0));
    assert_eq!(result_of("2 ** 3 ** 2"), Value::Number(512.0));
    assert_eq!(result_of("(2 ** 3) ** 2"), Value::Number(64.0));
    assert_eq!(result_of("10 - 4 - 3"), Value::Number(3.0));
    assert_eq!(result_of("-2 ** 2"), Value::Number(4.0));
}

#[test]
fn division_by_zero_yields_zero() {
    assert_eq!(result_of("10 / 0"), Value::Number(0.0));
}

#[test]
fn logical_or_short_circuits() {
    assert_eq!(result_of("0 || 5"), Value::Number(5.0));

    let before = form(json!({ "Sheet1": { "A1": 1 } }));
    let after =
        execute_calculations(&before, "const x = 3 || setValue(\"Sheet1:A1\", 99);").unwrap();
    assert_eq!(after, before);
}

#[test]
fn set_then_get_round_trips_through_the_snapshot() {
    let mut form_data = FormData::new();
    let summary = Interpreter::new(
        "setValue(\"Sheet1:A1\", 42);\nconst read = getValue(\"Sheet1:A1\");",
    )
    .run(&mut form_data)
    .unwrap();

    assert_eq!(summary.statements, 2);
    assert_eq!(summary.variables["read"], Value::Number(42.0));
    assert_eq!(form_data.to_json(), json!({ "Sheet1": { "A1": 42 } }));
}

#[test]
fn malformed_references_read_empty_and_write_nothing() {
    let before = form(json!({ "Sheet1": { "A1": "keep" } }));
    let mut form_data = before.clone();
    let summary = Interpreter::new(
        "const a = getValue('NoColon');\nsetValue('NoColon', 'x');\nsetValue('A:B:C', 'x');\nsetBgColor('', 'red');",
    )
    .run(&mut form_data)
    .unwrap();

    assert_eq!(summary.variables["a"], Value::from(""));
    assert_eq!(form_data, before);
}

#[test]
fn ternary_chain_grades_scores() {
    let script = "const score = getValue('Sheet1:score');\n\
                  const grade = score >= 80 ? \"A\" : score >= 60 ? \"B\" : \"C\";\n\
                  setValue('Sheet1:grade', grade);";

    for (score, grade) in [(85, "A"), (65, "B"), (10, "C")] {
        let before = form(json!({ "Sheet1": { "score": score } }));
        let after = execute_calculations(&before, script).unwrap();
        assert_eq!(
            after.get("Sheet1", "grade"),
            Some(&Value::from(grade)),
            "score {score}"
        );
    }
}

#[test]
fn ternary_evaluates_only_the_selected_branch() {
    let after = execute_calculations(
        &FormData::new(),
        "1 > 2 ? setValue('S:then', 1) : setValue('S:else', 2);",
    )
    .unwrap();
    assert_eq!(after.to_json(), json!({ "S": { "else": 2 } }));
}

#[test]
fn undeclared_variables_are_zero() {
    let after =
        execute_calculations(&FormData::new(), "setValue('S:A1', missing + 1)").unwrap();
    assert_eq!(after.get("S", "A1"), Some(&Value::Number(1.0)));
}

#[test]
fn numeric_strings_from_the_form_are_coerced() {
    let before = form(json!({ "Order": { "qty": "3", "price": "19.90 THB" } }));
    let after = execute_calculations(
        &before,
        "const total = getValue('Order:qty') * parseFloat(getValue('Order:price'));\n\
         setValue('Order:total', total);",
    )
    .unwrap();

    let Some(Value::Number(total)) = after.get("Order", "total") else {
        panic!("total should be numeric: {:?}", after.get("Order", "total"));
    };
    assert!((total - 59.7).abs() < 1e-9);
}

#[test]
fn set_bg_color_writes_reserved_styles_key() {
    let after = execute_calculations(
        &FormData::new(),
        "const c = setBgColor('Sheet1:A1', '#ff0000'); setValue('Sheet1:B1', c);",
    )
    .unwrap();

    assert_eq!(
        after.style("Sheet1", "A1"),
        Some(&CellStyle {
            background_color: Value::from("#ff0000")
        })
    );
    assert_eq!(
        after.to_json(),
        json!({
            "Sheet1": { "B1": "#ff0000" },
            "_styles": { "Sheet1": { "A1": { "backgroundColor": "#ff0000" } } }
        })
    );
}

#[test]
fn empty_script_returns_snapshot_unchanged() {
    let before = form(json!({ "Sheet1": { "A1": 1.5 }, "Empty": [] }));
    assert_eq!(execute_calculations(&before, "").unwrap(), before);
    assert_eq!(execute_calculations(&before, "  \n\t ").unwrap(), before);
    assert_eq!(execute_calculations(&before, "// just a note").unwrap(), before);
}

#[test]
fn strings_keep_escaped_characters() {
    assert_eq!(result_of(r#""a\"b""#), Value::from("a\"b"));
    assert_eq!(result_of(r"'line\nbreak'"), Value::from("linenbreak"));
    assert_eq!(result_of(r"'back\\slash'"), Value::from("back\\slash"));
}

#[test]
fn statement_ceiling_stops_evaluation() {
    let script: String = (1..=MAX_STATEMENTS + 1)
        .map(|i| format!("setValue('S:A1', {i});\n"))
        .collect();

    let mut form_data = FormData::new();
    let err = Interpreter::new(&script).run(&mut form_data).unwrap_err();
    assert_eq!(
        err,
        CalcError::ExecutionLimit {
            limit: MAX_STATEMENTS
        }
    );
    assert_eq!(
        err.to_string(),
        "Execution limit exceeded (possible infinite loop)"
    );
    assert!(!err.is_parse_error());
    // The statement past the ceiling was never evaluated.
    assert_eq!(
        form_data.get("S", "A1"),
        Some(&Value::Number(MAX_STATEMENTS as f64))
    );
}

#[test]
fn exactly_max_statements_succeeds() {
    let script = ";".repeat(MAX_STATEMENTS);
    let summary = Interpreter::new(&script)
        .run(&mut FormData::new())
        .unwrap();
    assert_eq!(summary.statements, MAX_STATEMENTS);
}

#[test]
fn lower_limits_apply_and_higher_limits_are_clamped() {
    let mut form_data = FormData::new();
    let err = Interpreter::new("let a = 1; let b = 2; let c = 3;")
        .with_limits(ExecutionLimits { max_statements: 2 })
        .run(&mut form_data)
        .unwrap_err();
    assert_eq!(err, CalcError::ExecutionLimit { limit: 2 });

    let script = ";".repeat(MAX_STATEMENTS + 1);
    let err = Interpreter::new(&script)
        .with_limits(ExecutionLimits {
            max_statements: usize::MAX,
        })
        .run(&mut form_data)
        .unwrap_err();
    assert_eq!(
        err,
        CalcError::ExecutionLimit {
            limit: MAX_STATEMENTS
        }
    );
}

#[test]
fn failed_run_rolls_back_through_execute_calculations() {
    let before = form(json!({ "Sheet1": { "A1": 1 } }));
    let script = "setValue('Sheet1:A1', 2);\nsetValue('Sheet1:A2', 3);\nconst x = (1 + ;";

    let err = execute_calculations(&before, script).unwrap_err();
    assert!(err.is_parse_error());
    assert_eq!(before.get("Sheet1", "A1"), Some(&Value::Number(1.0)));
    assert_eq!(before.get("Sheet1", "A2"), None);
}

#[test]
fn failed_run_keeps_partial_effects_in_place() {
    let mut form_data = form(json!({ "Sheet1": { "A1": 1 } }));
    let script = "setValue('Sheet1:A1', 2);\nsetValue('Sheet1:A2', 3);\nconst x = (1 + ;";

    let err = Interpreter::new(script).run(&mut form_data).unwrap_err();
    assert_eq!(
        err,
        CalcError::UnrecognizedToken {
            found: "`;`".to_string(),
            line: 3,
            col: 16,
        }
    );
    assert_eq!(
        form_data.to_json(),
        json!({ "Sheet1": { "A1": 2, "A2": 3 } })
    );
}

#[test]
fn parse_errors_are_reported_with_positions() {
    assert_eq!(
        execute_calculations(&FormData::new(), "setValue('S:A1', 1")
            .unwrap_err()
            .to_string(),
        "Parse error: expected `,` or `)`, found EOF"
    );
    assert_eq!(
        execute_calculations(&FormData::new(), "const = 4")
            .unwrap_err()
            .to_string(),
        "Parse error: expected identifier, found `=` at 1:7"
    );
}

#[test]
fn deeply_nested_scripts_fail_instead_of_overflowing() {
    let script = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
    let err = execute_calculations(&FormData::new(), &script).unwrap_err();
    assert_eq!(err, CalcError::ExpressionTooComplex { line: 1, col: 1 });

    let script = format!("const x = {}1", "-".repeat(50_000));
    let err = execute_calculations(&FormData::new(), &script).unwrap_err();
    assert!(matches!(err, CalcError::ExpressionTooComplex { .. }));
}

#[test]
fn long_sums_evaluate() {
    let mut form_data = FormData::new();
    for i in 1..=600 {
        form_data.set("S", &format!("A{i}"), Value::from(i));
    }
    let terms: Vec<String> = (1..=600).map(|i| format!("getValue('S:A{i}')")).collect();
    let script = format!("setValue('S:total', {});", terms.join(" + "));

    let after = execute_calculations(&form_data, &script).unwrap();
    assert_eq!(after.get("S", "total"), Some(&Value::Number(180_300.0)));
}

#[test]
fn long_ternary_tables_evaluate() {
    let arms: String = (0..150).map(|i| format!("x == {i} ? 'r{i}' : ")).collect();
    let script = format!(
        "const x = getValue('S:key');\nsetValue('S:out', {arms}'none');"
    );

    for (key, expected) in [(0, "r0"), (77, "r77"), (149, "r149"), (150, "none")] {
        let before = form(json!({ "S": { "key": key } }));
        let after = execute_calculations(&before, &script).unwrap();
        assert_eq!(after.get("S", "out"), Some(&Value::from(expected)), "key {key}");
    }
}

#[test]
fn styles_sheet_is_not_addressable_as_cells() {
    let before = form(json!({
        "S": { "A1": 1 },
        "_styles": { "S": { "A1": { "backgroundColor": "#fff" } } }
    }));
    let mut form_data = before.clone();
    let summary = Interpreter::new(
        "setValue('_styles:A1', 1);\nsetBgColor('_styles:A1', 'red');\nconst s = getValue('_styles:S');",
    )
    .run(&mut form_data)
    .unwrap();

    assert_eq!(summary.variables["s"], Value::from(""));
    assert_eq!(form_data, before);
}

#[test]
fn parse_script_does_not_touch_form_data() {
    let stmts = parse_script("setValue('S:A1', 1);;let x = 2").unwrap();
    assert_eq!(stmts.len(), 3);
    assert_eq!(stmts[1], Stmt::Empty);
}

#[test]
fn runs_are_deterministic() {
    let before = form(json!({ "Sheet1": { "A1": "12", "A2": 3 } }));
    let script = "const a = getValue('Sheet1:A1') * 2;\n\
                  setValue('Sheet1:B1', a > 20 ? 'big' : 'small');\n\
                  setBgColor('Sheet1:B1', a > 20 ? '#0f0' : '#f00');";

    let first = execute_calculations(&before, script).unwrap();
    let second = execute_calculations(&before, script).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
