use std::fmt;

use crate::error::CredentialError;

/// Usernames must be shorter than this many characters.
pub const USERNAME_LIMIT: usize = 255;
/// Passwords (login and enable) must be shorter than this many characters.
pub const PASSWORD_LIMIT: usize = 513;

/// Login material for SSH sessions. Read-only once built; `Debug` never shows secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    username: String,
    password: String,
    enable_password: Option<String>,
}

impl SessionCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        enable_password: Option<String>,
    ) -> Result<Self, CredentialError> {
        let username: String = username.into();
        let password: String = password.into();

        validate_username(&username)?;
        validate_secret("password", &password)?;
        if let Some(secret) = &enable_password {
            validate_secret("enable password", secret)?;
        }

        Ok(Self {
            username,
            password,
            enable_password,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn enable_password(&self) -> Option<&str> {
        self.enable_password.as_deref()
    }

    pub fn enable_required(&self) -> bool {
        self.enable_password.is_some()
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("enable_required", &self.enable_required())
            .finish()
    }
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    validate("username", username, USERNAME_LIMIT)
}

pub fn validate_secret(field: &'static str, secret: &str) -> Result<(), CredentialError> {
    validate(field, secret, PASSWORD_LIMIT)
}

fn validate(field: &'static str, value: &str, limit: usize) -> Result<(), CredentialError> {
    let len: usize = value.chars().count();
    if len == 0 {
        return Err(CredentialError::Empty { field });
    }
    if len >= limit {
        return Err(CredentialError::TooLong { field, limit });
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
