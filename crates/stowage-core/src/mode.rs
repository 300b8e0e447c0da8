use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Context the host application runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuntimeMode {
    #[default]
    Development,
    Testing,
    Production,
}

impl RuntimeMode {
    /// Stable modes trust the persisted state instead of rescanning.
    pub fn is_stable(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn allows_freezing(self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Sub-contexts such as "Production/Staging" map onto their root.
        let root = value.split('/').next().unwrap_or_default().trim();
        match root.to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            _ => Err(format!(
                "unknown runtime context '{value}': expected development, testing or production"
            )),
        }
    }
}

impl TryFrom<String> for RuntimeMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RuntimeMode> for String {
    fn from(value: RuntimeMode) -> Self {
        value.as_str().to_string()
    }
}
