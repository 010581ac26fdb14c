use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Syntactic email check; deliverability is not verified.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}
