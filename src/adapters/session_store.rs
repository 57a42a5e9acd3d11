use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie name to value, as last issued by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken {
    cookies: BTreeMap<String, String>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut token = Self::new();
        token.absorb(pairs);
        token
    }

    pub fn absorb<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.cookies.insert(name.into(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Value for a `Cookie` request header, or `None` when there is nothing to send.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session file {path} could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session file {path} is not a cookie map: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait SessionStore {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError>;
    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError>;
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SessionStoreError {
        SessionStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.io_error(error)),
        };

        let token = serde_json::from_str(&content).map_err(|source| SessionStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(token))
    }

    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|error| self.io_error(error))?;
        }

        let content = serde_json::to_string_pretty(token).map_err(|source| {
            SessionStoreError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|error| self.io_error(error))
    }
}

/// Keeps the token for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RefCell<Option<SessionToken>>,
    saves: RefCell<usize>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            token: RefCell::new(Some(token)),
            saves: RefCell::new(0),
        }
    }

    pub fn current(&self) -> Option<SessionToken> {
        self.token.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        Ok(self.current())
    }

    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        *self.token.borrow_mut() = Some(token.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
