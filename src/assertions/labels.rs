// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Labels for assertion types as defined in C2PA 1.x.

/// Label prefix for a data hash assertion.
pub const DATA_HASH: &str = "c2pa.hash.data";

/// Label prefix for an actions assertion.
pub const ACTIONS: &str = "c2pa.actions";

/// Label prefix for an ingredient assertion.
pub const INGREDIENT: &str = "c2pa.ingredient";

/// Label prefix for a claim thumbnail assertion.
///
/// The full label is `c2pa.thumbnail.claim.<ext>`.
pub const CLAIM_THUMBNAIL: &str = "c2pa.thumbnail.claim";

/// Label prefix for an ingredient thumbnail assertion.
pub const INGREDIENT_THUMBNAIL: &str = "c2pa.thumbnail.ingredient";

/// Returns `true` for assertions that bind the claim to the asset bytes.
pub fn is_hash_binding(label: &str) -> bool {
    label == DATA_HASH || label.starts_with("c2pa.hash.")
}
