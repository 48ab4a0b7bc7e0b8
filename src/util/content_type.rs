use crate::Error;
use mime::{self, Mime};
use std::fmt;
use std::str::FromStr;

/// Content type the filler is served as.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    inner: Mime,
}

impl ContentType {
    pub fn new(str: &str) -> Result<Self, Error> {
        let inner = str.parse()?;
        Ok(Self { inner })
    }

    /// Whether the filler should be the HTML page rather than random text.
    pub fn is_html(&self) -> bool {
        self.inner.type_() == mime::TEXT && self.inner.subtype() == mime::HTML
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::from(mime::TEXT_HTML)
    }
}

impl From<Mime> for ContentType {
    fn from(value: Mime) -> Self {
        Self { inner: value }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl FromStr for ContentType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
