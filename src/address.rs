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

//! Address parsing.
//!
//! An address names one asset as `"<group>/<item>"`. The group key is the text
//! before the first `/` and the item key is the text after the last `/`.
//! Middle segments of a deeper address such as `"ui/icons/coin"` belong to
//! neither key: it resolves to group `ui`, item `coin`.
//!
//! ```
//! use group_assets::address;
//!
//! assert_eq!(address::split("common/atlas_common"), ("common", "atlas_common"));
//! assert_eq!(address::split("ui/icons/coin"), ("ui", "coin"));
//! ```

use crate::error::{AssetError, Result};

/// Separator between group and item keys
pub const SEPARATOR: char = '/';

/// Split an address into `(group, item)`, reporting a malformed address.
pub fn try_split(address: &str) -> Result<(&str, &str)> {
    let first = address
        .find(SEPARATOR)
        .ok_or_else(|| AssetError::AddressMalformed(address.to_string()))?;
    // A first separator guarantees a last one.
    let last = address.rfind(SEPARATOR).unwrap_or(first);
    Ok((&address[..first], &address[last + SEPARATOR.len_utf8()..]))
}

/// Split an address into `(group, item)`.
///
/// A malformed address is logged and resolves to two empty keys, which never
/// match a resident group.
pub fn split(address: &str) -> (&str, &str) {
    match try_split(address) {
        Ok(parts) => parts,
        Err(err) => {
            tracing::warn!(address, "{err}");
            ("", "")
        }
    }
}

/// Build an address from its keys
pub fn join(group: &str, item: &str) -> String {
    let mut address = String::with_capacity(group.len() + item.len() + 1);
    address.push_str(group);
    address.push(SEPARATOR);
    address.push_str(item);
    address
}
