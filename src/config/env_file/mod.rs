#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env::VarError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Variable naming an env file to read instead of `./.env`
pub const ENV_FILE_VAR: &str = "ENV_FILE";
const DEFAULT_ENV_FILE: &str = ".env";

/// Process variables that may override configuration values
pub const ZOHO_ENV_KEYS: [&str; 7] = [
    "ZOHO_CLIENT_ID",
    "ZOHO_CLIENT_SECRET",
    "ZOHO_REFRESH_TOKEN",
    "ZOHO_ORGANIZATION_ID",
    "ZOHO_ENVIRONMENT",
    "ZOHO_API_BASE_URL",
    "ZOHO_ACCOUNTS_URL",
];

/// Key/value source for configuration overrides.
///
/// Built from an optional env file with the `ZOHO_*` process variables
/// layered on top, so exported variables always win over file entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    #[inline]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            vars: pairs.into_iter().collect(),
        }
    }

    /// Read the env file (if any) and overlay the `ZOHO_*` process variables
    #[inline]
    pub fn detect() -> Result<Self> {
        let mut source = match env_file_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            Some(path) => {
                warn!(
                    "{} points at {}, which does not exist; using process environment only",
                    ENV_FILE_VAR,
                    path.display()
                );
                Self::default()
            }
            None => Self::default(),
        };

        for key in ZOHO_ENV_KEYS {
            match std::env::var(key) {
                Ok(value) => {
                    source.vars.insert(key.to_string(), value);
                }
                Err(VarError::NotPresent) => {}
                Err(VarError::NotUnicode(_)) => {
                    warn!("Ignoring {}: value is not valid UTF-8", key);
                }
            }
        }

        Ok(source)
    }

    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read env file: {}", path.display()))?;

        debug!("Loaded environment file {}", path.display());
        Ok(Self {
            vars: parse_env_file(&content),
        })
    }

    /// Look up a variable; blank values count as unset
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

fn env_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_FILE_VAR) {
        return Some(PathBuf::from(path));
    }

    let default = PathBuf::from(DEFAULT_ENV_FILE);
    default.is_file().then_some(default)
}

/// Parse `KEY=VALUE` lines.
///
/// Blank lines, `#` comments and a leading `export ` are skipped. Unquoted
/// values end at a ` #` comment. Single quotes are literal; double quotes
/// understand `\n`, `\t`, `\"` and `\\`. Text after a closing quote is ignored.
#[inline]
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), parse_value(value.trim())))
        })
        .collect()
}

fn parse_value(raw: &str) -> String {
    let parsed = match raw.chars().next() {
        Some('"') => raw.get(1..).and_then(unescape_double_quoted),
        Some('\'') => raw
            .get(1..)
            .and_then(|rest| rest.split_once('\''))
            .map(|(inner, _)| inner.to_string()),
        _ => Some(strip_inline_comment(raw).to_string()),
    };

    // an unterminated quote keeps the text as written
    parsed.unwrap_or_else(|| raw.to_string())
}

/// Read up to the closing `"`; `None` when the quote is never closed
fn unescape_double_quoted(rest: &str) -> Option<String> {
    let mut value = String::with_capacity(rest.len());
    let mut chars = rest.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => match chars.next()? {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                other @ ('"' | '\\' | '$') => value.push(other),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            },
            _ => value.push(c),
        }
    }

    None
}

fn strip_inline_comment(value: &str) -> &str {
    let mut after_blank = false;
    for (i, c) in value.char_indices() {
        if c == '#' && after_blank {
            return value.get(..i).unwrap_or(value).trim_end();
        }
        after_blank = c == ' ' || c == '\t';
    }
    value
}
