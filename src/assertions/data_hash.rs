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

use serde::{Deserialize, Serialize};

use crate::{
    assertion::{Assertion, AssertionBase, AssertionCbor},
    assertions::labels,
    asset_io::CAIRead,
    error::{Error, Result},
    utils::hash_utils::{hash_stream_by_alg, vec_compare, HashRange, DEFAULT_HASH_ALG},
};

/// Helper class to create DataHash assertion
///
/// The hash covers every byte of the asset outside of `exclusions`, which
/// name the ranges occupied by the manifest store itself.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DataHash {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<Vec<HashRange>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
}

impl DataHash {
    /// Creates a data hash with no exclusions and an empty hash.
    pub fn new(name: &str, alg: &str) -> Self {
        DataHash {
            exclusions: None,
            name: Some(name.to_string()),
            alg: Some(alg.to_string()),
            hash: Vec::new(),
        }
    }

    /// Adds an exclusion hash range.
    pub fn add_exclusion(&mut self, exclusion: HashRange) {
        self.exclusions.get_or_insert_with(Vec::new).push(exclusion);
    }

    pub fn set_exclusions(&mut self, exclusions: Vec<HashRange>) {
        self.exclusions = if exclusions.is_empty() {
            None
        } else {
            Some(exclusions)
        };
    }

    pub fn set_hash(&mut self, hash: Vec<u8>) {
        self.hash = hash;
    }

    /// The algorithm recorded in the assertion, or the claim's.
    pub fn alg_or<'a>(&'a self, claim_alg: &'a str) -> &'a str {
        self.alg.as_deref().unwrap_or(claim_alg)
    }

    fn hash_stream(&self, stream: &mut dyn CAIRead, claim_alg: &str) -> Result<Vec<u8>> {
        hash_stream_by_alg(self.alg_or(claim_alg), stream, self.exclusions.clone())
    }

    /// Computes the hash of `stream` and stores it.
    pub fn gen_hash_from_stream(&mut self, stream: &mut dyn CAIRead) -> Result<()> {
        let hash = self.hash_stream(stream, DEFAULT_HASH_ALG)?;
        self.hash = hash;
        Ok(())
    }

    /// Recomputes the hash of `stream` and compares it to the stored one.
    ///
    /// Returns [`Error::HashMismatch`] when they differ.
    pub fn verify_stream_hash(&self, stream: &mut dyn CAIRead, claim_alg: &str) -> Result<()> {
        let hash = self.hash_stream(stream, claim_alg)?;

        if vec_compare(&hash, &self.hash) {
            Ok(())
        } else {
            Err(Error::HashMismatch(format!(
                "asset hash does not match {}",
                labels::DATA_HASH
            )))
        }
    }
}

impl AssertionCbor for DataHash {}

impl AssertionBase for DataHash {
    const LABEL: &'static str = labels::DATA_HASH;

    fn to_assertion(&self) -> Result<Assertion> {
        Self::to_cbor_assertion(self)
    }

    fn from_assertion(assertion: &Assertion) -> Result<Self> {
        Self::from_cbor_assertion(assertion)
    }
}
