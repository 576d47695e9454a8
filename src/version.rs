// src/version.rs

//! Three-component numeric version comparison.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, SupervisorError};

/// `major.minor.patch`; missing trailing components are `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl FromStr for Version {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SupervisorError::Validation("empty version string".to_string()));
        }

        let mut fields = [0u64; 3];
        for (idx, part) in s.split('.').enumerate() {
            if idx >= fields.len() {
                return Err(SupervisorError::Validation(format!(
                    "version '{s}' has more than three components"
                )));
            }
            fields[idx] = part.parse().map_err(|_| {
                SupervisorError::Validation(format!(
                    "version '{s}' has non-numeric component '{part}'"
                ))
            })?;
        }

        Ok(Version {
            major: fields[0],
            minor: fields[1],
            patch: fields[2],
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compare two version strings component-wise (numerically, not lexically).
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    let a: Version = a.parse()?;
    let b: Version = b.parse()?;
    Ok(a.cmp(&b))
}
