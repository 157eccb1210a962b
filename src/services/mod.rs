pub mod accounts;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod lifecycle;
pub mod orders;

use once_cell::sync::Lazy;
use regex::Regex;

/// Digits with optional leading `+` and spaces, dashes or parentheses.
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("phone pattern is valid"));

/// Letters, digits, dots, dashes and underscores.
pub static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._\-]{3,32}$").expect("username pattern is valid"));
