//! Password values that may point at a secret store.
//!
//! `[carddav] password` accepts a literal or a reference:
//!
//! - `pass::dav/alice` is the first line of `pass show dav/alice`
//! - `env::DAV_PASSWORD` is read from the environment
//!
//! References are safe to print; literals are not.

use std::process::Command;

/// Placeholder printed instead of a literal password.
pub const REDACTED: &str = "<redacted>";

/// A password as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// Literal password.
    Plain(&'a str),
    /// Entry in the `pass` password store.
    Pass(&'a str),
    /// Environment variable name.
    Env(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        if let Some(entry) = value.strip_prefix("pass::") {
            Self::Pass(entry.trim())
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var.trim())
        } else {
            Self::Plain(value)
        }
    }

    /// Looks the secret up.
    ///
    /// An empty store entry or variable is an error, since the server would
    /// only reject it later with a less helpful message.
    pub fn resolve(&self) -> Result<String, String> {
        match *self {
            Self::Plain(value) => Ok(value.to_string()),
            Self::Pass(entry) => non_empty(read_pass(entry)?, || {
                format!("`pass show {}` returned an empty password", entry)
            }),
            Self::Env(var) => {
                let value = std::env::var(var)
                    .map_err(|_| format!("environment variable `{}` is not set", var))?;
                non_empty(value, || format!("environment variable `{}` is empty", var))
            }
        }
    }

    /// Text safe to show in `config dump`.
    pub fn redacted(&self) -> String {
        match *self {
            Self::Plain(_) => REDACTED.to_string(),
            Self::Pass(entry) => format!("pass::{}", entry),
            Self::Env(var) => format!("env::{}", var),
        }
    }
}

/// Resolves a config value to the password it stands for.
pub fn resolve(value: &str) -> Result<String, String> {
    SecretRef::parse(value).resolve()
}

fn read_pass(entry: &str) -> Result<String, String> {
    if entry.is_empty() {
        return Err("`pass::` reference has no entry name".to_string());
    }

    let output = Command::new("pass")
        .args(["show", entry])
        .output()
        .map_err(|e| format!("cannot run `pass show {}`: {}", entry, e))?;

    if !output.status.success() {
        return Err(format!(
            "`pass show {}` exited with {}: {}",
            entry,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

fn non_empty(value: String, err: impl FnOnce() -> String) -> Result<String, String> {
    if value.is_empty() { Err(err()) } else { Ok(value) }
}
