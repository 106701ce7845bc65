//! Skip rules deciding whether an exchange is logged at all.

/// Returns true if `path` contains any of `skip_paths` as a substring.
///
/// Matching is deliberately loose: a rule of `"/health"` also skips
/// `"/healthy"` and `"/api/health/live"`.
pub fn skip_by_path(path: &str, skip_paths: &[String]) -> bool {
    skip_paths.iter().any(|p| path.contains(p.as_str()))
}

/// Returns true if `status` is one of `skip_status_codes`.
pub fn skip_by_status(status: u16, skip_status_codes: &[u16]) -> bool {
    skip_status_codes.contains(&status)
}
