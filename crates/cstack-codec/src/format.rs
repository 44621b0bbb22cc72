//! Stack file formats and object naming

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted stack format, derived from the object extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackFormat {
    /// Legacy XML dialect
    Xml,
    /// JSON dialect
    Ycs,
}

impl StackFormat {
    /// Format of an object, from its extension (case-insensitive)
    pub fn from_object_name(name: &str) -> Result<Self, ParseError> {
        let ext = extension(name).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xml") => Ok(Self::Xml),
            Some("ycs") => Ok(Self::Ycs),
            _ => Err(ParseError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Extension without dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Ycs => "ycs",
        }
    }

    /// Content type used when uploading
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Ycs => "application/json",
        }
    }
}

impl fmt::Display for StackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn extension(name: &str) -> Option<&str> {
    let file = file_name(name);
    let dot = file.rfind('.')?;
    (dot > 0).then(|| &file[dot + 1..])
}

/// Object name with its extension stripped, keeping any folder prefix
#[must_use]
pub fn object_basename(name: &str) -> &str {
    let file = file_name(name);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &name[..name.len() - (file.len() - dot)],
        _ => name,
    }
}

/// Object name with its extension replaced by the format's
#[must_use]
pub fn object_name_for(name: &str, format: StackFormat) -> String {
    format!("{}.{}", object_basename(name), format.extension())
}
