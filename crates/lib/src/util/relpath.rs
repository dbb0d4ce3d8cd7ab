//! Relative slash-path sanitization.
//!
//! Bundle entries, manifest file references and release content all name files
//! by a relative, `/`-separated path. The same rule applies everywhere: after
//! lexical cleaning the path must be non-empty, relative and must not climb out
//! of its root.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelPathError {
  #[error("path is empty")]
  Empty,

  #[error("path must be relative")]
  Absolute,

  #[error("path traversal is not allowed")]
  Traversal,
}

/// Lexically clean a path: backslashes become `/`, empty and `.` segments are
/// dropped and `..` consumes the previous segment where one exists.
pub fn clean(raw: &str) -> String {
  let normalized = raw.trim().replace('\\', "/");
  let rooted = normalized.starts_with('/');

  let mut parts: Vec<&str> = Vec::new();
  for segment in normalized.split('/') {
    match segment {
      "" | "." => {}
      ".." => match parts.last() {
        Some(&last) if last != ".." => {
          parts.pop();
        }
        _ if rooted => {}
        _ => parts.push(".."),
      },
      other => parts.push(other),
    }
  }

  let joined = parts.join("/");
  match (rooted, joined.is_empty()) {
    (true, _) => format!("/{}", joined),
    (false, true) => ".".to_string(),
    (false, false) => joined,
  }
}

/// Clean and validate a relative path, returning its cleaned form.
pub fn sanitize(raw: &str) -> Result<String, RelPathError> {
  let cleaned = clean(raw);
  if cleaned == "." || cleaned.is_empty() {
    return Err(RelPathError::Empty);
  }
  if cleaned.starts_with('/') {
    return Err(RelPathError::Absolute);
  }
  if cleaned == ".." || cleaned.starts_with("../") {
    return Err(RelPathError::Traversal);
  }
  Ok(cleaned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clean_collapses_segments() {
    assert_eq!(clean("a//b/./c"), "a/b/c");
    assert_eq!(clean("a/b/../c"), "a/c");
    assert_eq!(clean("styles\\default.css"), "styles/default.css");
    assert_eq!(clean("/../etc"), "/etc");
    assert_eq!(clean("./"), ".");
  }

  #[test]
  fn sanitize_accepts_nested_relative_paths() {
    assert_eq!(sanitize(" assets/img/logo.svg ").unwrap(), "assets/img/logo.svg");
    assert_eq!(sanitize("assets/../index.html").unwrap(), "index.html");
  }

  #[test]
  fn sanitize_rejects_bad_paths() {
    assert_eq!(sanitize(""), Err(RelPathError::Empty));
    assert_eq!(sanitize("a/.."), Err(RelPathError::Empty));
    assert_eq!(sanitize("/etc/passwd"), Err(RelPathError::Absolute));
    assert_eq!(sanitize("../secret"), Err(RelPathError::Traversal));
    assert_eq!(sanitize("a/../../b"), Err(RelPathError::Traversal));
    assert_eq!(sanitize(".."), Err(RelPathError::Traversal));
  }
}
