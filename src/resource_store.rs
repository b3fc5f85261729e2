// Copyright 2023 Adobe. All rights reserved.
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

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{
    assertion::Assertion,
    error::{Error, Result},
    jumbf::labels::to_assertion_uri,
};

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
/// A reference to a resource to be used in JSON serialization.
pub struct ResourceRef {
    /// The mime type of the referenced resource.
    pub format: String,

    /// A URI that identifies the resource as referenced from the manifest.
    ///
    /// In a manifest definition this is the id the resource was added
    /// under. In a report it is the JUMBF URI of the assertion holding it.
    pub identifier: String,

    /// The algorithm used to hash the resource (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// The base64 encoded hash of the resource (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ResourceRef {
    pub fn new<S: Into<String>, I: Into<String>>(format: S, identifier: I) -> Self {
        Self {
            format: format.into(),
            identifier: identifier.into(),
            alg: None,
            hash: None,
        }
    }

    /// Describes a binary assertion of the manifest labeled `manifest_label`.
    pub(crate) fn from_assertion(
        manifest_label: &str,
        assertion: &Assertion,
        alg: &str,
        hash: &[u8],
    ) -> Self {
        Self {
            format: assertion.content_type().to_owned(),
            identifier: to_assertion_uri(manifest_label, assertion.label()),
            alg: Some(alg.to_owned()),
            hash: Some(STANDARD.encode(hash)),
        }
    }
}

/// Binary objects referenced from a manifest definition by id.
#[derive(Clone, Debug, Default)]
pub struct ResourceStore {
    resources: HashMap<String, Vec<u8>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the resource `id`.
    pub fn add<S: Into<String>>(&mut self, id: S, data: Vec<u8>) -> &mut Self {
        self.resources.insert(id.into(), data);
        self
    }

    pub fn get(&self, id: &str) -> Result<&[u8]> {
        self.resources
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::ResourceNotFound(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn add_and_get() {
        let mut store = ResourceStore::new();
        store.add("thumb.jpg", vec![1, 2, 3]);

        assert_eq!(store.get("thumb.jpg").unwrap(), &[1, 2, 3]);
        assert!(matches!(
            store.get("missing.jpg"),
            Err(Error::ResourceNotFound(_))
        ));
    }

    #[test]
    fn reference_from_assertion() {
        let thumb = Assertion::from_data_binary("c2pa.thumbnail.claim.jpeg", "image/jpeg", &[9]);
        let r = ResourceRef::from_assertion("urn:uuid:1", &thumb, "sha256", &[0xff, 0x00]);

        assert_eq!(r.format, "image/jpeg");
        assert_eq!(
            r.identifier,
            "self#jumbf=/c2pa/urn:uuid:1/c2pa.assertions/c2pa.thumbnail.claim.jpeg"
        );
        assert_eq!(r.hash.as_deref(), Some("/wA="));
    }
}
