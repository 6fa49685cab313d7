//! Shell quoting for generated scripts.

/// Quote `value` for POSIX sh. Plain words are returned unchanged.
pub fn quote(value: &str) -> String {
  let plain = !value.is_empty()
    && value
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '+' | '%' | '@' | ','));
  if plain {
    value.to_string()
  } else {
    format!("'{}'", value.replace('\'', r"'\''"))
  }
}
