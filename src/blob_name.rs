//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Blob name type.

use crate::error::StoreError;
use std::path::{Path, PathBuf};

/// A human path-like blob identifier, opaque to the store.
///
/// Uniqueness is the caller's responsibility. The name is resolved to a file
/// path under a [`crate::StoreConfig`]'s root directory; path separators and
/// `..` components are rejected at construction so a blob name can never
/// resolve outside the configured root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobName(String);

impl BlobName {
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "blob name must not be empty".into(),
            ));
        }
        let mut components = Path::new(&name).components();
        let single_normal = matches!(components.next(), Some(std::path::Component::Normal(_)))
            && components.next().is_none();
        if !single_normal {
            return Err(StoreError::InvalidArgument(format!(
                "blob name {name:?} must not contain path separators or `..`"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn resolve(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.0)
    }
}

impl std::fmt::Display for BlobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(BlobName::new("").is_err());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(BlobName::new("../escape").is_err());
        assert!(BlobName::new("a/b").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        let name = BlobName::new("device-cred").unwrap();
        assert_eq!(name.as_str(), "device-cred");
    }
}
