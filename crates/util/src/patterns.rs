//! Naming rules for configuration keys, names and volume options.
//!
//! ConfigMap keys follow the Kubernetes data-key grammar. Secret keys use a
//! stricter rule that additionally requires an alphanumeric first and last
//! character.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keys of a ConfigMap: alphanumerics, `.`, `-` and `_`.
pub static CONFIG_MAP_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("config map key regex should compile"));

/// Keys of a Secret: as above, but starting and ending with an alphanumeric.
pub static SECRET_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([-._A-Za-z0-9]*[A-Za-z0-9])?$").expect("secret key regex should compile"));

/// Resource names: lowercase alphanumerics, `-` and `.`, alphanumeric at both ends.
pub static CONFIG_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-.a-z0-9]*[a-z0-9])?$").expect("config name regex should compile"));

/// Comma separated list of data keys, used for external sub-path mounts.
pub static MULTIPLE_KEYS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+(,[-._a-zA-Z0-9]+)*$").expect("multiple keys regex should compile"));

/// Octal digits only.
pub static OCTAL_DIGITS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-7]+$").expect("octal regex should compile"));

pub const CONFIG_MAP_KEY_MESSAGE: &str = "Key '{key}' must consist of alphanumeric characters, '.', '-' and '_'";

pub const SECRET_KEY_MESSAGE: &str =
    "Key '{key}' must start and end with an alphanumeric character and may only contain alphanumeric characters, '.', '-' and '_'";

/// A key naming rule paired with the message shown when a key breaks it.
///
/// The message may contain a `{key}` placeholder which is replaced with the
/// offending key.
#[derive(Debug, Clone)]
pub struct KeyRule {
    pattern: Regex,
    message: String,
}

impl KeyRule {
    /// Builds a rule from a pattern string.
    pub fn new(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?, message))
    }

    pub fn from_regex(pattern: Regex, message: impl Into<String>) -> Self {
        Self {
            pattern,
            message: message.into(),
        }
    }

    /// The rule used by ConfigMap editors.
    pub fn config_map() -> Self {
        Self::from_regex(CONFIG_MAP_KEY_PATTERN.clone(), CONFIG_MAP_KEY_MESSAGE)
    }

    /// The stricter rule used by Secret editors.
    pub fn secret() -> Self {
        Self::from_regex(SECRET_KEY_PATTERN.clone(), SECRET_KEY_MESSAGE)
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Empty keys never satisfy a rule.
    pub fn is_valid(&self, key: &str) -> bool {
        !key.is_empty() && self.pattern.is_match(key)
    }

    /// The error message for `key` with the placeholder substituted.
    pub fn message_for(&self, key: &str) -> String {
        self.message.replace("{key}", key)
    }

    /// Returns the error message when `key` breaks the rule.
    pub fn check(&self, key: &str) -> Result<(), String> {
        if self.is_valid(key) { Ok(()) } else { Err(self.message_for(key)) }
    }
}

impl Default for KeyRule {
    fn default() -> Self {
        Self::config_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_map_rule_accepts_dots_dashes_and_underscores() {
        let rule = KeyRule::config_map();
        assert!(rule.is_valid("LOG_LEVEL"));
        assert!(rule.is_valid("app.properties"));
        assert!(rule.is_valid(".hidden"));
        assert!(rule.is_valid("-leading-dash"));

        assert!(!rule.is_valid(""));
        assert!(!rule.is_valid("bad key!"));
        assert!(!rule.is_valid("path/like"));
    }

    #[test]
    fn secret_rule_is_stricter_at_the_edges() {
        let rule = KeyRule::secret();
        assert!(rule.is_valid("db-password"));
        assert!(rule.is_valid("a"));
        assert!(!rule.is_valid(".hidden"));
        assert!(!rule.is_valid("trailing_"));
    }

    #[test]
    fn message_substitutes_offending_key() {
        let rule = KeyRule::config_map();
        assert_eq!(
            rule.check("bad key"),
            Err("Key 'bad key' must consist of alphanumeric characters, '.', '-' and '_'".to_string())
        );
    }

    #[test]
    fn custom_rule_reports_invalid_patterns() {
        assert!(KeyRule::new("^[a-z]+$", "lowercase only").is_ok());
        assert!(KeyRule::new("([", "broken").is_err());
    }

    #[test]
    fn name_and_list_patterns() {
        assert!(CONFIG_NAME_PATTERN.is_match("app-config.v1"));
        assert!(!CONFIG_NAME_PATTERN.is_match("App-Config"));
        assert!(!CONFIG_NAME_PATTERN.is_match("-config"));
        assert!(MULTIPLE_KEYS_PATTERN.is_match("a.txt,b_key,c-1"));
        assert!(!MULTIPLE_KEYS_PATTERN.is_match("a,,b"));
        assert!(OCTAL_DIGITS_PATTERN.is_match("0644"));
        assert!(!OCTAL_DIGITS_PATTERN.is_match("0648"));
    }
}
