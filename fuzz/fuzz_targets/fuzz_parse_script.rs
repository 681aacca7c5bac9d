#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep the harness itself bounded; calculation scripts are short in practice.
const MAX_FUZZ_SCRIPT_CHARS: usize = 16_384;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_SCRIPT_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    let mut count = 0usize;
    for (idx, _) in s.char_indices() {
        if count == max_chars {
            return &s[..idx];
        }
        count += 1;
    }
    s
}

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // Accept arbitrary bytes as input; treat invalid UTF-8 lossy.
    let input = String::from_utf8_lossy(data);
    let script = truncate_to_chars(&input, MAX_FUZZ_SCRIPT_CHARS);

    // The lexer never fails and always makes progress.
    let tokens = formcalc::tokenize(script);
    assert!(tokens.len() <= script.chars().count());

    if let Ok(stmts) = formcalc::parse_script(script) {
        assert!(stmts.len() <= formcalc::MAX_STATEMENTS);
    }
});
