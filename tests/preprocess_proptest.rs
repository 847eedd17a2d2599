use std::io::Read;

use proptest::prelude::*;
use rsrconf::loader::normalize_only;
use rsrconf::EnvSubstitutor;

const LONG_VALUE: &str = "a-value-longer-than-most-of-the-read-buffers-used-here";

fn read_chunked(input: &[u8], chunk: usize) -> Result<Vec<u8>, String> {
    let mut reader = EnvSubstitutor::new(input);
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) => return Err(err.to_string()),
        }
    }
}

/// Source fragments that are complete on their own, so any sequence of them
/// is a well-formed relaxed source.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("{".to_string()),
        Just("}".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just(",".to_string()),
        Just(":".to_string()),
        Just(" \t\n".to_string()),
        Just("// line comment\n".to_string()),
        Just("/* block */".to_string()),
        Just("\"a // b /* c */\"".to_string()),
        Just("\"esc \\\" quote\"".to_string()),
        Just("*env:RSRCONF_PROP_LONG".to_string()),
        Just("\"*env:RSRCONF_PROP_LONG\"".to_string()),
        Just("*en".to_string()),
        Just("/".to_string()),
        "[a-z0-9]{1,6}",
    ]
}

fn source() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..40).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn chunk_size_does_not_change_output(input in source(), chunk in 1usize..64) {
        std::env::set_var("RSRCONF_PROP_LONG", LONG_VALUE);
        let whole = read_chunked(input.as_bytes(), input.len() + 1);
        let chunked = read_chunked(input.as_bytes(), chunk);
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn comments_do_not_change_output(
        tokens in prop::collection::vec("[a-z0-9\"{}\\[\\],:]{1,4}", 1..20),
        comments in prop::collection::vec(prop_oneof![
            Just(""),
            Just(" "),
            Just("// note\n"),
            Just("/* note */"),
        ], 20),
    ) {
        let plain = tokens.concat();
        // Comments only go between tokens while no string is open
        let mut commented = String::new();
        let mut quotes = 0;
        for (token, comment) in tokens.iter().zip(comments.iter().cycle()) {
            commented.push_str(token);
            quotes += token.matches('"').count();
            if quotes % 2 == 0 {
                commented.push_str(comment);
            }
        }
        prop_assert_eq!(
            normalize_only(plain.as_bytes()).map_err(|e| e.to_string()),
            normalize_only(commented.as_bytes()).map_err(|e| e.to_string())
        );
    }
}
