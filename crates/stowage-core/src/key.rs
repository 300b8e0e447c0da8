use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{PackageError, PackageResult};

pub const PACKAGE_KEY_SEPARATOR: char = '.';
const MAX_PACKAGE_KEY_LEN: usize = 128;

/// Unique, validated name of a package such as `Acme.Demo`.
///
/// The canonical form keeps the casing it was created with. Lookups that
/// must ignore case go through [`PackageKey::lookup_form`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageKey(String);

impl PackageKey {
    pub fn parse(value: &str) -> PackageResult<Self> {
        validate_package_key(value)?;
        Ok(Self(value.to_string()))
    }

    /// Builds a key from relative directory segments, e.g. `["Acme", "Demo"]`.
    pub fn from_segments<I, S>(segments: I) -> PackageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|segment| segment.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lookup_form(&self) -> String {
        lookup_form(&self.0)
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PACKAGE_KEY_SEPARATOR)
    }

    /// Lower-cased `vendor/name-parts` form used as the manifest `name`.
    pub fn distribution_name(&self) -> String {
        let mut segments = self.segments();
        let vendor = segments.next().unwrap_or_default();
        let rest = segments.collect::<Vec<_>>().join("-");
        format!("{vendor}/{rest}").to_ascii_lowercase()
    }
}

/// Case-insensitive index form of any (possibly invalid) key string.
pub fn lookup_form(value: &str) -> String {
    value.to_ascii_lowercase()
}

pub fn is_valid_package_key(value: &str) -> bool {
    validate_package_key(value).is_ok()
}

/// Checks a key typed by a user, which may use any casing, e.g. `acme.demo`.
pub fn validate_key_reference(value: &str) -> PackageResult<()> {
    validate_key_shape(value, false)
}

fn validate_package_key(value: &str) -> PackageResult<()> {
    validate_key_shape(value, true)
}

fn validate_key_shape(value: &str, require_uppercase: bool) -> PackageResult<()> {
    let invalid = |reason: &str| PackageError::InvalidPackageKey {
        key: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_PACKAGE_KEY_LEN {
        return Err(invalid("must not be longer than 128 characters"));
    }

    let mut segment_count = 0_usize;
    for segment in value.split(PACKAGE_KEY_SEPARATOR) {
        segment_count += 1;
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return Err(invalid("segments must not be empty"));
        };
        if require_uppercase && !first.is_ascii_uppercase() {
            return Err(invalid("each segment must start with an uppercase letter"));
        }
        if !first.is_ascii_alphabetic() {
            return Err(invalid("each segment must start with a letter"));
        }
        if !chars.all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(invalid("segments may only contain ASCII letters and digits"));
        }
    }

    if segment_count < 2 {
        return Err(invalid("must consist of at least two dot-separated segments"));
    }

    Ok(())
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageKey {
    type Err = PackageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for PackageKey {
    type Error = PackageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_package_key(&value)?;
        Ok(Self(value))
    }
}

impl From<PackageKey> for String {
    fn from(key: PackageKey) -> Self {
        key.0
    }
}

impl AsRef<str> for PackageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
