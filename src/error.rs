// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

/// Asset layer error type
///
/// None of these are fatal: they are reported to the immediate caller through
/// callback arguments or `Result`s and logged where they occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Address has no `/` separator
    AddressMalformed(String),

    /// Content system failed to fetch a group
    GroupFetchFailed { group: String, status: String },

    /// Item absent from a resident group, or present with another kind
    ItemNotFound { group: String, item: String },

    /// Group is not resident in the cache
    GroupNotResident(String),

    /// Remaining download size could not be determined
    SizeQueryFailed { group: String, status: String },

    /// Dependency download failed
    DownloadFailed { group: String, status: String },

    /// Catalog initialization, check or apply failed
    CatalogCheckFailed(String),

    /// Invalid configuration value
    ConfigError(String),

    /// Asset bytes could not be decoded
    DecodeError(String),

    /// Serialization error
    SerializationError(String),

    /// IO error (file operations, etc.)
    IoError(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::AddressMalformed(address) => {
                write!(f, "Malformed address (expected group/item): {address:?}")
            }
            AssetError::GroupFetchFailed { group, status } => {
                write!(f, "Failed to fetch group {group}: {status}")
            }
            AssetError::ItemNotFound { group, item } => {
                write!(f, "Item {item} not found in group {group}")
            }
            AssetError::GroupNotResident(group) => write!(f, "Group not resident: {group}"),
            AssetError::SizeQueryFailed { group, status } => {
                write!(f, "Failed to query download size of {group}: {status}")
            }
            AssetError::DownloadFailed { group, status } => {
                write!(f, "Failed to download group {group}: {status}")
            }
            AssetError::CatalogCheckFailed(msg) => write!(f, "Catalog check failed: {msg}"),
            AssetError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            AssetError::DecodeError(msg) => write!(f, "Decode error: {msg}"),
            AssetError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            AssetError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::SerializationError(err.to_string())
    }
}

impl From<image::ImageError> for AssetError {
    fn from(err: image::ImageError) -> Self {
        AssetError::DecodeError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;
