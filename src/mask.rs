// src/mask.rs

//! Redaction of sensitive fields in parameter bags.
//!
//! Parameter bags are modelled as a tagged tree ([`Params`]) and walked
//! structurally with an explicit depth counter. Depth 0 is the root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SupervisorError};

/// Replacement written over sensitive string values.
pub const MASK: &str = "*******";

/// Field names whose string values are masked (exact, case-sensitive).
pub const SENSITIVE_FIELDS: [&str; 6] = ["password", "psswd", "pwd", "passwd", "uri", "url"];

/// Deepest level that is still inspected.
pub const MAX_MASK_DEPTH: i32 = 4;

/// Leaf value of a parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Tree-shaped parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Sequence(Vec<Params>),
    Mapping(BTreeMap<String, Params>),
    Scalar(Scalar),
}

impl Params {
    pub fn str(value: impl Into<String>) -> Self {
        Params::Scalar(Scalar::Str(value.into()))
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, Params)>) -> Self {
        Params::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty() -> Self {
        Params::Mapping(BTreeMap::new())
    }

    /// Look up a key when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Params> {
        match self {
            Params::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Params::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::empty()
    }
}

/// Mask sensitive values in `params` starting at the root (depth 0).
pub fn mask_sensitive(params: &Params) -> Params {
    mask_from_depth(params, 0)
}

/// Mask sensitive values in `params`, treating it as sitting at `depth`.
///
/// Subtrees deeper than [`MAX_MASK_DEPTH`] are returned unchanged. A negative
/// depth is a caller bug and fails with [`SupervisorError::Validation`].
pub fn mask_at_depth(params: &Params, depth: i32) -> Result<Params> {
    if depth < 0 {
        return Err(SupervisorError::Validation(format!(
            "mask depth must be >= 0 (got {depth})"
        )));
    }
    Ok(mask_from_depth(params, depth))
}

fn mask_from_depth(params: &Params, depth: i32) -> Params {
    if depth > MAX_MASK_DEPTH {
        return params.clone();
    }

    match params {
        Params::Mapping(map) => Params::Mapping(
            map.iter()
                .map(|(key, value)| {
                    let masked = match value {
                        Params::Scalar(Scalar::Str(_)) if is_sensitive(key) => Params::str(MASK),
                        other => mask_from_depth(other, depth + 1),
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Params::Sequence(items) => Params::Sequence(
            items
                .iter()
                .map(|item| mask_from_depth(item, depth + 1))
                .collect(),
        ),
        Params::Scalar(_) => params.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_FIELDS.contains(&key)
}
