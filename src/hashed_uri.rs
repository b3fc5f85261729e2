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

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `HashedUri` provides a reference to content available within the same
/// manifest store.
///
/// This is described in [§8.3, URI References], of the C2PA Technical
/// Specification.
///
/// [§8.3, URI References]: https://c2pa.org/specifications/specifications/1.0/specs/C2PA_Specification.html#_uri_references
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HashedUri {
    /// JUMBF URI reference
    url: String,

    /// A string identifying the cryptographic hash algorithm used to compute
    /// the hash
    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<String>,

    /// Byte string containing the hash value
    #[serde(with = "serde_bytes")]
    hash: Vec<u8>,
}

impl HashedUri {
    pub fn new(url: String, alg: Option<String>, hash_bytes: &[u8]) -> Self {
        Self {
            url,
            alg,
            hash: hash_bytes.to_vec(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub(crate) fn set_hash(&mut self, hash: Vec<u8>) {
        self.hash = hash;
    }
}

impl fmt::Debug for HashedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedUri")
            .field("url", &self.url)
            .field("alg", &self.alg)
            .field("hash", &hex::encode(&self.hash))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn cbor_shape() {
        let uri = HashedUri::new(
            "self#jumbf=c2pa.assertions/c2pa.hash.data".to_string(),
            Some("sha256".to_string()),
            &[1, 2, 3],
        );

        let cbor = serde_cbor::to_vec(&uri).unwrap();
        let value: serde_cbor::Value = serde_cbor::from_slice(&cbor).unwrap();
        let serde_cbor::Value::Map(map) = value else {
            unreachable!("hashed uri must encode as a map")
        };
        assert_eq!(
            map.get(&serde_cbor::Value::Text("hash".into())),
            Some(&serde_cbor::Value::Bytes(vec![1, 2, 3]))
        );

        let back: HashedUri = serde_cbor::from_slice(&cbor).unwrap();
        assert_eq!(back, uri);
        assert!(format!("{back:?}").contains("010203"));
    }
}
