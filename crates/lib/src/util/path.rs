//! Slash-separated path helpers.
//!
//! Graph paths, route keys and rpm macros are always `/`-separated regardless
//! of the host, so these operate on `&str` rather than `std::path`.

/// Lexically normalize a slash path: collapse repeated slashes, drop `.`
/// elements and resolve `..` against preceding elements.
pub fn clean(path: &str) -> String {
  if path.is_empty() {
    return ".".to_string();
  }

  let rooted = path.starts_with('/');
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
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
    (true, _) => format!("/{joined}"),
    (false, true) => ".".to_string(),
    (false, false) => joined,
  }
}

/// Join path elements with `/`, skipping empty elements, then [`clean`] the
/// result. Joining nothing but empty elements yields an empty string.
pub fn join<S: AsRef<str>>(elems: &[S]) -> String {
  let parts: Vec<&str> = elems.iter().map(AsRef::as_ref).filter(|e| !e.is_empty()).collect();
  if parts.is_empty() {
    return String::new();
  }
  clean(&parts.join("/"))
}

/// Last element of a path, ignoring trailing slashes.
pub fn base(path: &str) -> String {
  if path.is_empty() {
    return ".".to_string();
  }
  let trimmed = path.trim_end_matches('/');
  if trimmed.is_empty() {
    return "/".to_string();
  }
  match trimmed.rfind('/') {
    Some(idx) => trimmed[idx + 1..].to_string(),
    None => trimmed.to_string(),
  }
}

/// Everything but the last element of a path, cleaned.
pub fn dir(path: &str) -> String {
  match path.rfind('/') {
    Some(idx) => clean(&path[..=idx]),
    None => ".".to_string(),
  }
}

/// Whether `name` can be used as a single file or directory name.
pub fn is_path_segment(name: &str) -> bool {
  !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}
