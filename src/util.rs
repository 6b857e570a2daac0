//! Small utility helpers used across modules.

use std::time::{SystemTime, UNIX_EPOCH};

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Answer normalization: surrounding whitespace trimmed, lowercased.
pub fn normalize_answer(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Log-safe preview of a possibly long string (char-boundary safe).
pub fn preview(s: &str, max_chars: usize) -> String {
  let mut out: String = s.chars().take(max_chars).collect();
  if s.chars().count() > max_chars {
    out.push('…');
  }
  out
}

/// Wall-clock milliseconds since the Unix epoch, for log timestamps.
pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as u64)
    .unwrap_or(0)
}
