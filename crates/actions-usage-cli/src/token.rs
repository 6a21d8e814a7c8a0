//! Personal access token loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// File name looked up in the home directory when no path is given.
pub const TOKEN_FILE_NAME: &str = "actions-usage.tok";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token file {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot read token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {0} is empty")]
    Empty(PathBuf),
}

/// `$HOME/actions-usage.tok` (`%USERPROFILE%` on Windows).
pub fn default_token_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(TOKEN_FILE_NAME))
}

/// Read a token file, trimming surrounding whitespace.
pub fn read_token(path: &Path) -> Result<String, TokenError> {
    let raw = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => TokenError::NotFound(path.to_path_buf()),
        _ => TokenError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(TokenError::Empty(path.to_path_buf()));
    }
    Ok(token.to_string())
}

/// Setup guidance shown when no usable token is found.
pub fn instructions(path: Option<&Path>) -> String {
    let location = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| format!("~/{TOKEN_FILE_NAME}"));
    format!(
        "Token not found!\n\
         Before you can use this tool, you must create a read-only GitHub personal\n\
         access token and save it to:\n\n\
         '{location}'\n\n\
         (or point --token-file / ACTIONS_USAGE_TOKEN_FILE at another file)\n\n\
         https://github.com/settings/tokens\n"
    )
}
