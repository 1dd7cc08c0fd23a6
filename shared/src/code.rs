use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Human-shareable session identifier, e.g. `"04821"`.
///
/// Codes minted by the server are fixed-width decimal strings. Codes received
/// from clients are taken as-is (lossily, if not UTF-8) and simply fail lookup
/// when they do not name a live session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        SessionCode(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SessionCode {
    fn from(s: String) -> Self {
        SessionCode(s)
    }
}

impl From<&str> for SessionCode {
    fn from(s: &str) -> Self {
        SessionCode(s.to_owned())
    }
}

impl Borrow<str> for SessionCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
