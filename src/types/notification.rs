//! Side effects produced by dispatch

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a cached result set that must be refetched
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheTarget(String);

impl CacheTarget {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheTarget {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Toast style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Default,
    Success,
    Destructive,
}

/// Short-lived user notification describing an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub variant: NotificationVariant,
}
