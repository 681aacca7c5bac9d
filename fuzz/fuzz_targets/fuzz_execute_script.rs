#![no_main]

use libfuzzer_sys::fuzz_target;

use formcalc::{FormData, Interpreter, Value};

/// Keep evaluation fuzzing bounded: many inputs quickly, no giant allocations.
const MAX_EXEC_SCRIPT_CHARS: usize = 4_096;
const MAX_INPUT_BYTES: usize = MAX_EXEC_SCRIPT_CHARS * 4; // max UTF-8 bytes per char

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

fn seed_form_data() -> FormData {
    let mut form_data = FormData::new();
    form_data.set("Sheet1", "A1", Value::from(12));
    form_data.set("Sheet1", "A2", Value::from("3.5 kg"));
    form_data.set("Sheet1", "A3", Value::from(true));
    form_data.set("Weird Sheet", "B1", Value::from(""));
    form_data
}

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    let input = String::from_utf8_lossy(data);
    let script = truncate_to_chars(&input, MAX_EXEC_SCRIPT_CHARS);

    let seed = seed_form_data();
    let mut partial = seed.clone();
    let in_place = Interpreter::new(script).run(&mut partial);

    // The copying entry point must agree with the in-place one and leave its input alone.
    match formcalc::execute_calculations(&seed, script) {
        Ok(after) => {
            assert!(in_place.is_ok());
            // NaN cells never compare equal, so only compare the serialized shape.
            assert_eq!(after.to_json().to_string(), partial.to_json().to_string());
        }
        Err(err) => assert_eq!(Err(err), in_place.map(|_| ())),
    }
    assert_eq!(seed, seed_form_data());

    // Every state the interpreter can leave behind must serialize.
    let _ = partial.to_json().to_string();
});
