// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use thiserror::Error;

use crate::types::{ElementKey, IndexPath};

/// Errors returned by [`CollectionLayoutEngine`](crate::CollectionLayoutEngine) and [`UpdateMap`](crate::UpdateMap).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CollectionError {
    /// The engine has pending invalidation; call `prepare` first.
    #[error("layout queried before prepare")]
    NotPrepared,
    /// No element with this identity exists for the current counts.
    #[error("no attributes for {key:?}")]
    OutOfRange {
        /// The requested identity.
        key: ElementKey,
    },
    /// A batch update is malformed or inconsistent with the data source.
    #[error("invalid batch update: {reason}")]
    InvalidUpdate {
        /// What is inconsistent.
        reason: &'static str,
        /// Offending index path, when there is one.
        path: Option<IndexPath>,
    },
}
