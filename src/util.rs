//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  // Back off to a char boundary so multi-byte input can't panic the slice.
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}... ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_strings_pass_through() {
    assert_eq!(trunc_for_log("hello", 10), "hello");
  }

  #[test]
  fn long_strings_are_truncated_with_size() {
    let s = "x".repeat(300);
    let out = trunc_for_log(&s, 200);
    assert!(out.starts_with(&"x".repeat(200)));
    assert!(out.ends_with("(300 bytes total)"));
  }
}
