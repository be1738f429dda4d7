use std::sync::LazyLock;

use regex::Regex;

/// Mutating keywords, matched anywhere in the upper-cased text.
static RE_FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DROP|DELETE|UPDATE|INSERT|ALTER|TRUNCATE|REPLACE").unwrap()
});

/// Lexical read-only check for ad-hoc SQL. Returns the rejection message on
/// failure. This is a keyword filter, not a parser: a keyword inside an
/// identifier (`last_updated`) is rejected too.
pub fn check_read_only(sql: &str) -> Result<(), String> {
    let normalized = sql.trim().to_uppercase();
    if !normalized.starts_with("SELECT") {
        return Err("Security Error: Only SELECT queries are allowed.".to_string());
    }
    if let Some(m) = RE_FORBIDDEN.find(&normalized) {
        return Err(format!(
            "Security Error: Keyword '{}' is not allowed.",
            m.as_str()
        ));
    }
    Ok(())
}
