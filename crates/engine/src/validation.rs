//! Validation of the form fields that sit around the key/value editor.

use confmap_util::patterns::{CONFIG_NAME_PATTERN, MULTIPLE_KEYS_PATTERN, OCTAL_DIGITS_PATTERN};
use thiserror::Error;

/// Longest accepted resource name.
pub const MAX_NAME_LENGTH: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("This is a required field ({field})")]
    Required { field: &'static str },

    #[error("More than 253 characters are not allowed")]
    NameTooLong,

    #[error("Name must consist of lowercase alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character")]
    InvalidName,

    #[error("Mount path must be an absolute path without whitespace")]
    InvalidMountPath,

    #[error("More than 4 characters are not allowed")]
    PermissionTooLong,

    #[error("4 characters are allowed in octal format only, first character should be 0")]
    PermissionMissingLeadingZero,

    #[error("At least 3 characters are required")]
    PermissionTooShort,

    #[error("This is octal number, use numbers between 0 to 7")]
    PermissionNotOctal,

    #[error("Use (a-z), (0-9), (-), (_),(.); Use (,) to separate multiple keys")]
    InvalidSubPathKeys,
}

/// Checks a ConfigMap or Secret name.
pub fn validate_config_name(name: &str) -> Result<(), FieldError> {
    if name.is_empty() {
        return Err(FieldError::Required { field: "name" });
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(FieldError::NameTooLong);
    }
    if !CONFIG_NAME_PATTERN.is_match(name) {
        return Err(FieldError::InvalidName);
    }
    Ok(())
}

/// Checks the directory a volume is mounted at.
pub fn validate_mount_path(path: &str) -> Result<(), FieldError> {
    if path.is_empty() {
        return Err(FieldError::Required { field: "mount path" });
    }
    if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
        return Err(FieldError::InvalidMountPath);
    }
    Ok(())
}

/// Octal file mode of mounted files, always four digits with a leading `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePermission(String);

impl FilePermission {
    /// Parses `0644` or `644`; three digits gain a leading zero.
    pub fn parse(input: &str) -> Result<Self, FieldError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FieldError::Required {
                field: "file permission",
            });
        }
        if !OCTAL_DIGITS_PATTERN.is_match(input) {
            return Err(FieldError::PermissionNotOctal);
        }
        match input.len() {
            0..=2 => Err(FieldError::PermissionTooShort),
            3 => Ok(Self(format!("0{input}"))),
            4 if input.starts_with('0') => Ok(Self(input.to_string())),
            4 => Err(FieldError::PermissionMissingLeadingZero),
            _ => Err(FieldError::PermissionTooLong),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Splits a comma separated key list; whitespace is ignored.
pub fn parse_sub_path_keys(input: &str) -> Result<Vec<String>, FieldError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(FieldError::Required { field: "sub-path keys" });
    }
    if !MULTIPLE_KEYS_PATTERN.is_match(&compact) {
        return Err(FieldError::InvalidSubPathKeys);
    }
    Ok(compact.split(',').map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_names() {
        assert_eq!(validate_config_name("app-config"), Ok(()));
        assert_eq!(validate_config_name(""), Err(FieldError::Required { field: "name" }));
        assert_eq!(validate_config_name("App"), Err(FieldError::InvalidName));
        assert_eq!(validate_config_name("trailing-"), Err(FieldError::InvalidName));
        assert_eq!(validate_config_name(&"a".repeat(254)), Err(FieldError::NameTooLong));
    }

    #[test]
    fn mount_paths() {
        assert_eq!(validate_mount_path("/etc/config"), Ok(()));
        assert_eq!(validate_mount_path("relative/path"), Err(FieldError::InvalidMountPath));
        assert_eq!(validate_mount_path("/with space"), Err(FieldError::InvalidMountPath));
        assert!(matches!(validate_mount_path(""), Err(FieldError::Required { .. })));
    }

    #[test]
    fn file_permissions() {
        assert_eq!(FilePermission::parse("0644").map(FilePermission::into_string), Ok("0644".to_string()));
        assert_eq!(FilePermission::parse("755").map(FilePermission::into_string), Ok("0755".to_string()));
        assert_eq!(FilePermission::parse("1644"), Err(FieldError::PermissionMissingLeadingZero));
        assert_eq!(FilePermission::parse("06440"), Err(FieldError::PermissionTooLong));
        assert_eq!(FilePermission::parse("64"), Err(FieldError::PermissionTooShort));
        assert_eq!(FilePermission::parse("0689"), Err(FieldError::PermissionNotOctal));
        assert_eq!(FilePermission::parse("rw"), Err(FieldError::PermissionNotOctal));
    }

    #[test]
    fn sub_path_key_lists() {
        assert_eq!(
            parse_sub_path_keys(" app.properties , db_url "),
            Ok(vec!["app.properties".to_string(), "db_url".to_string()])
        );
        assert_eq!(parse_sub_path_keys("a,,b"), Err(FieldError::InvalidSubPathKeys));
        assert_eq!(parse_sub_path_keys("a/b"), Err(FieldError::InvalidSubPathKeys));
        assert!(matches!(parse_sub_path_keys("  "), Err(FieldError::Required { .. })));
    }
}
