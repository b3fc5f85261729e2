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
use uuid::Uuid;

use crate::{
    assertion::{label_with_instance, split_instance, Assertion, AssertionBase, AssertionData},
    assertions::{labels, DataHash, Ingredient},
    error::{Error, Result},
    hashed_uri::HashedUri,
    jumbf::{
        boxes::{
            BMFFBox, JUMBFCBORContentBox, JUMBFEmbeddedFileContentBox,
            JUMBFEmbeddedFileDescriptionBox, JUMBFJSONContentBox, JUMBFSuperBox,
            CAI_CBOR_ASSERTION_UUID, CAI_JSON_ASSERTION_UUID, JUMBF_EMBEDDED_FILE_UUID,
        },
        labels::{assertion_label_from_uri, to_relative_assertion_uri, to_signature_uri},
    },
    utils::hash_utils::{hash_by_alg, DEFAULT_HASH_ALG},
    ClaimGeneratorInfo,
};

/// An assertion as held by a claim, with the hash of its JUMBF box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimAssertion {
    assertion: Assertion,
    hash: Vec<u8>,
}

impl ClaimAssertion {
    pub(crate) fn new(assertion: Assertion, hash: Vec<u8>) -> Self {
        Self { assertion, hash }
    }

    pub fn label(&self) -> &str {
        self.assertion.label()
    }

    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// Hash of the assertion superbox payload, as found or as built.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }
}

/// A `Claim` gathers together all the `Assertion`s about an asset from an
/// actor at a given time, and it is signed by that actor.
///
/// Only the serialized fields take part in the signed CBOR. The rest is the
/// state the engine keeps alongside: the assertion payloads, the signature
/// and, for claims read from a store, the bytes they were read from.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    #[serde(skip)]
    label: String,

    #[serde(skip)]
    assertion_store: Vec<ClaimAssertion>,

    #[serde(skip)]
    signature_val: Vec<u8>,

    // claim CBOR as read, so signatures are checked over the signed bytes
    #[serde(skip)]
    original_bytes: Option<Vec<u8>>,

    // manifest superbox as read, header included
    #[serde(skip)]
    original_box: Option<Vec<u8>>,

    /// Free-form user agent of the software that created the claim.
    pub claim_generator: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_generator_info: Option<Vec<ClaimGeneratorInfo>>,

    signature: String,

    assertions: Vec<HashedUri>,

    #[serde(rename = "dc:format")]
    format: String,

    #[serde(rename = "dc:title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,

    #[serde(rename = "instanceID")]
    instance_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
}

impl Claim {
    /// Creates an unsigned claim with a fresh `urn:uuid:` label.
    pub fn new<S: Into<String>>(claim_generator: S, format: &str) -> Self {
        let label = format!("urn:uuid:{}", Uuid::new_v4());
        Self::new_with_label(&label, claim_generator, format)
    }

    pub(crate) fn new_with_label<S: Into<String>>(
        label: &str,
        claim_generator: S,
        format: &str,
    ) -> Self {
        Claim {
            label: label.to_owned(),
            assertion_store: Vec::new(),
            signature_val: Vec::new(),
            original_bytes: None,
            original_box: None,
            claim_generator: claim_generator.into(),
            claim_generator_info: None,
            signature: to_signature_uri(label),
            assertions: Vec::new(),
            format: format.to_owned(),
            title: None,
            instance_id: format!("xmp:iid:{}", Uuid::new_v4()),
            alg: Some(DEFAULT_HASH_ALG.to_owned()),
        }
    }

    /// Decodes claim CBOR read from the manifest labeled `label`.
    pub(crate) fn from_data(label: &str, claim_data: &[u8]) -> Result<Claim> {
        let mut claim: Claim = serde_cbor::from_slice(claim_data)
            .map_err(|e| Error::ClaimDecoding(format!("{label}: {e}")))?;

        claim.label = label.to_owned();
        claim.original_bytes = Some(claim_data.to_vec());
        Ok(claim)
    }

    /// The claim CBOR, exactly as signed when the claim was read.
    pub fn data(&self) -> Result<Vec<u8>> {
        if let Some(original) = &self.original_bytes {
            return Ok(original.clone());
        }
        serde_cbor::to_vec(self).map_err(|_err| Error::ClaimEncoding)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub(crate) fn set_instance_id<S: Into<String>>(&mut self, instance_id: S) {
        self.instance_id = instance_id.into();
    }

    /// Hash algorithm used for the claim's hashed URIs.
    pub fn alg(&self) -> &str {
        self.alg.as_deref().unwrap_or(DEFAULT_HASH_ALG)
    }

    pub fn signature_val(&self) -> &[u8] {
        &self.signature_val
    }

    pub(crate) fn set_signature_val(&mut self, signature: Vec<u8>) {
        self.signature_val = signature;
    }

    /// Hashed URIs of the claim's assertions, in claim order.
    pub fn assertions(&self) -> &[HashedUri] {
        &self.assertions
    }

    pub fn claim_assertion_store(&self) -> &[ClaimAssertion] {
        &self.assertion_store
    }

    pub(crate) fn original_box(&self) -> Option<&[u8]> {
        self.original_box.as_deref()
    }

    pub(crate) fn set_original_box(&mut self, manifest_box: Vec<u8>) {
        self.original_box = Some(manifest_box);
    }

    /// Returns `true` once the claim has been read from or written to a
    /// store.
    pub fn is_signed(&self) -> bool {
        !self.signature_val.is_empty()
    }

    /// Adds a typed assertion. Returns the hashed URI recorded in the claim.
    pub fn add_assertion<T: AssertionBase>(&mut self, assertion_builder: &T) -> Result<HashedUri> {
        let assertion = assertion_builder.to_assertion()?;
        self.add_raw_assertion(assertion)
    }

    /// Adds an assertion, appending an instance number to its label when
    /// the claim already holds one with the same label.
    pub(crate) fn add_raw_assertion(&mut self, mut assertion: Assertion) -> Result<HashedUri> {
        let root = assertion.label_root().to_owned();
        let instance = self
            .assertion_store
            .iter()
            .filter(|ca| ca.assertion.label_root() == root)
            .count()
            + 1;
        assertion.set_label(label_with_instance(&root, instance));

        let hash = Claim::calc_assertion_box_hash(&assertion, self.alg())?;
        let uri = HashedUri::new(
            to_relative_assertion_uri(assertion.label()),
            Some(self.alg().to_owned()),
            &hash,
        );

        self.assertion_store
            .push(ClaimAssertion::new(assertion, hash));
        self.assertions.push(uri.clone());
        Ok(uri)
    }

    /// Replaces the assertion with the same label and updates its hash.
    pub(crate) fn replace_assertion(&mut self, assertion: Assertion) -> Result<()> {
        let hash = Claim::calc_assertion_box_hash(&assertion, self.alg())?;

        let ca = self
            .assertion_store
            .iter_mut()
            .find(|ca| ca.label() == assertion.label())
            .ok_or_else(|| Error::AssertionMissing {
                label: assertion.label().to_owned(),
            })?;

        let uri = self
            .assertions
            .iter_mut()
            .find(|u| assertion_label_from_uri(u.url()).as_deref() == Some(assertion.label()))
            .ok_or_else(|| Error::AssertionMissing {
                label: assertion.label().to_owned(),
            })?;

        uri.set_hash(hash.clone());
        *ca = ClaimAssertion::new(assertion, hash);
        Ok(())
    }

    /// Adds an assertion read from a store, keeping the hash of its box as
    /// found.
    pub(crate) fn put_assertion_from_store(&mut self, assertion: Assertion, hash: Vec<u8>) {
        self.assertion_store
            .push(ClaimAssertion::new(assertion, hash));
    }

    /// Finds an assertion by label, instance suffix included.
    pub fn get_assertion(&self, label: &str) -> Option<&Assertion> {
        self.get_claim_assertion(label).map(ClaimAssertion::assertion)
    }

    pub fn get_claim_assertion(&self, label: &str) -> Option<&ClaimAssertion> {
        self.assertion_store.iter().find(|ca| ca.label() == label)
    }

    /// All assertions with base label `label_root`, in instance order.
    pub fn assertions_by_root<'a>(
        &'a self,
        label_root: &'a str,
    ) -> impl Iterator<Item = &'a Assertion> + 'a {
        self.assertion_store
            .iter()
            .map(ClaimAssertion::assertion)
            .filter(move |a| split_instance(a.label()).0 == label_root)
    }

    /// The claim's data hash assertion, if present.
    pub fn data_hash(&self) -> Result<Option<DataHash>> {
        self.assertions_by_root(labels::DATA_HASH)
            .next()
            .map(DataHash::from_assertion)
            .transpose()
    }

    /// Decoded ingredient assertions with their labels.
    pub fn ingredients(&self) -> Result<Vec<(String, Ingredient)>> {
        self.assertions_by_root(labels::INGREDIENT)
            .map(|a| Ok((a.label().to_owned(), Ingredient::from_assertion(a)?)))
            .collect()
    }

    /// Labels of the manifests this claim references as ingredients.
    pub fn ingredient_manifest_labels(&self) -> Vec<String> {
        self.ingredients()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(_, i)| i.manifest_label())
            .collect()
    }

    /// Builds the JUMBF superbox holding `assertion`.
    pub(crate) fn assertion_box(assertion: &Assertion) -> JUMBFSuperBox {
        match assertion.decode_data() {
            AssertionData::Json(json) => {
                let mut sb = JUMBFSuperBox::new(assertion.label(), Some(CAI_JSON_ASSERTION_UUID));
                sb.add_data_box(Box::new(JUMBFJSONContentBox::new(json.as_bytes().to_vec())));
                sb
            }
            AssertionData::Cbor(cbor) => {
                let mut sb = JUMBFSuperBox::new(assertion.label(), Some(CAI_CBOR_ASSERTION_UUID));
                sb.add_data_box(Box::new(JUMBFCBORContentBox::new(cbor.clone())));
                sb
            }
            AssertionData::Binary(data) => {
                let mut sb =
                    JUMBFSuperBox::new(assertion.label(), Some(JUMBF_EMBEDDED_FILE_UUID));
                sb.add_data_box(Box::new(JUMBFEmbeddedFileDescriptionBox::new(
                    assertion.content_type().to_owned(),
                    None,
                )));
                sb.add_data_box(Box::new(JUMBFEmbeddedFileContentBox::new(data.clone())));
                sb
            }
        }
    }

    /// Hash of the payload of the superbox holding `assertion`.
    pub(crate) fn calc_assertion_box_hash(assertion: &Assertion, alg: &str) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        Claim::assertion_box(assertion).write_box_payload(&mut payload)?;
        hash_by_alg(alg, &payload, None)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::assertions::{c2pa_action, Action, Actions, Relationship};

    #[test]
    fn assertion_instances() {
        let mut claim = Claim::new("test app", "image/jpeg");
        assert!(claim.label().starts_with("urn:uuid:"));

        let a = Ingredient::new("a.jpg", "image/jpeg", Relationship::ComponentOf);
        let b = Ingredient::new("b.jpg", "image/jpeg", Relationship::ComponentOf);
        claim.add_assertion(&a).unwrap();
        let uri = claim.add_assertion(&b).unwrap();

        assert_eq!(uri.url(), "self#jumbf=c2pa.assertions/c2pa.ingredient__2");
        assert_eq!(claim.assertions().len(), 2);
        assert_eq!(claim.ingredients().unwrap()[1].1.title, "b.jpg");
        assert!(claim.get_assertion("c2pa.ingredient__2").is_some());
    }

    #[test]
    fn replace_updates_hash() {
        let mut claim = Claim::new("test app", "image/jpeg");

        let mut dh = DataHash::new("jumbf manifest", "sha256");
        dh.set_hash(vec![0; 32]);
        let before = claim.add_assertion(&dh).unwrap();

        dh.set_hash(vec![1; 32]);
        claim.replace_assertion(dh.to_assertion().unwrap()).unwrap();

        assert_ne!(claim.assertions()[0].hash(), before.hash());
        assert_eq!(claim.data_hash().unwrap().unwrap().hash, vec![1; 32]);

        let actions = Actions::new().add_action(Action::new(c2pa_action::CREATED));
        assert!(matches!(
            claim.replace_assertion(actions.to_assertion().unwrap()),
            Err(Error::AssertionMissing { .. })
        ));
    }

    #[test]
    fn cbor_round_trip_keeps_signed_bytes() {
        let mut claim = Claim::new("test app", "image/jpeg");
        claim.set_title(Some("C.jpg".to_owned()));
        claim
            .add_assertion(&Actions::new().add_action(Action::new(c2pa_action::CREATED)))
            .unwrap();

        let bytes = claim.data().unwrap();
        let decoded = Claim::from_data(claim.label(), &bytes).unwrap();

        assert_eq!(decoded.data().unwrap(), bytes);
        assert_eq!(decoded.title(), Some("C.jpg"));
        assert_eq!(decoded.assertions(), claim.assertions());

        assert!(matches!(
            Claim::from_data("urn:uuid:bad", b"\xff\x00"),
            Err(Error::ClaimDecoding(_))
        ));
    }
}
