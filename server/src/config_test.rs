use super::*;

#[test]
fn parse_tokens_reads_pairs() {
    let tokens = parse_tokens("tok:1, tok2 : 2,").expect("valid table");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.get("tok").map(String::as_str), Some("1"));
    assert_eq!(tokens.get("tok2").map(String::as_str), Some("2"));
}

#[test]
fn parse_tokens_accepts_empty() {
    assert!(parse_tokens("").expect("empty table").is_empty());
}

#[test]
fn parse_tokens_rejects_half_entries() {
    for raw in ["tok", "tok:", ":1"] {
        assert!(matches!(parse_tokens(raw), Err(ConfigError::InvalidToken(_))));
    }
}
