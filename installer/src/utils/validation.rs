// Input validation utilities

use regex::Regex;
use std::sync::LazyLock;

use crate::error::InstallError;

/// Minimum administrator password length, in bytes of UTF-8.
pub const MIN_PASSWORD_LEN: usize = 6;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern is valid"));

/// Parse a user-supplied port. Anything but an integer in 0..=65535 is rejected.
pub fn parse_port(raw: &str) -> Result<u16, InstallError> {
    raw.trim().parse::<u16>().map_err(|_| {
        InstallError::invalid_input(format!(
            "Database port '{}' is not a valid port number.",
            raw
        ))
    })
}

/// Administrator username: required; letters, numbers and underscore only.
pub fn validate_admin_username(username: &str) -> Result<(), InstallError> {
    if !USERNAME_RE.is_match(username) {
        return Err(InstallError::invalid_input(
            "Administrator username is required and may only contain letters, numbers and '_'.",
        ));
    }
    Ok(())
}

/// Length is measured in bytes, so multi-byte characters count more than once.
pub fn validate_admin_password(password: &str) -> Result<(), InstallError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(InstallError::invalid_input(format!(
            "Administrator password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Only presence is checked; the address format is left to the operator.
pub fn validate_admin_email(email: &str) -> Result<(), InstallError> {
    if email.is_empty() {
        return Err(InstallError::invalid_input(
            "Administrator email is required.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn port_must_be_integer() {
        assert_eq!(parse_port("3306").unwrap(), 3306);
        assert_eq!(parse_port(" 5432 ").unwrap(), 5432);
        for bad in ["abc", "-1", "70000", "33.06", ""] {
            let err = parse_port(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "port {:?}", bad);
        }
    }

    #[test]
    fn username_rules() {
        assert!(validate_admin_username("admin_1").is_ok());
        assert!(validate_admin_username("ADMIN").is_ok());
        assert!(validate_admin_username("").is_err());
        assert!(validate_admin_username("admin!").is_err());
        assert!(validate_admin_username("ad min").is_err());
        assert!(validate_admin_username("管理员").is_err());
    }

    #[test]
    fn password_length_counts_bytes() {
        assert!(validate_admin_password("abc12").is_err());
        assert!(validate_admin_password("abcdef").is_ok());
        // Three characters, six bytes
        assert!(validate_admin_password("пар").is_ok());
        assert!(validate_admin_password("пa").is_err());
    }

    #[test]
    fn email_only_needs_to_be_present() {
        assert!(validate_admin_email("").is_err());
        assert!(validate_admin_email("   ").is_ok());
        assert!(validate_admin_email("not-an-address").is_ok());
        assert!(validate_admin_email("a@b.com").is_ok());
    }

    #[test]
    fn username_pattern_is_reused_across_calls() {
        for _ in 0..3 {
            assert!(validate_admin_username("admin_1").is_ok());
            assert_eq!(
                validate_admin_username("bad name").unwrap_err().kind(),
                ErrorKind::InvalidInput
            );
        }
    }
}
