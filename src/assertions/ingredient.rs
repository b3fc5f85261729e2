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
    error::Result,
    hashed_uri::HashedUri,
    validation_status::ValidationStatus,
};

/// How an ingredient contributed to the asset.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Relationship {
    /// The asset was derived from this ingredient. At most one per claim.
    #[serde(rename = "parentOf")]
    ParentOf,
    /// The ingredient was composed into the asset.
    #[serde(rename = "componentOf")]
    #[default]
    ComponentOf,
    /// The ingredient was used as input to a process.
    #[serde(rename = "inputTo")]
    InputTo,
}

/// The `c2pa.ingredient` assertion.
///
/// `c2pa_manifest` points at the ingredient's active manifest when the
/// ingredient carried one; its hash covers that manifest's superbox so the
/// ingredient can be re-verified later. `hash` records the ingredient asset
/// bytes at the time it was added.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ingredient {
    #[serde(rename = "dc:title")]
    pub title: String,

    #[serde(rename = "dc:format")]
    pub format: String,

    #[serde(rename = "instanceID", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    pub relationship: Relationship,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub c2pa_manifest: Option<HashedUri>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<HashedUri>,

    #[serde(rename = "validationStatus", skip_serializing_if = "Option::is_none")]
    pub validation_status: Option<ValidationStatus>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_bytes"
    )]
    pub hash: Option<Vec<u8>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl Ingredient {
    pub fn new(title: &str, format: &str, relationship: Relationship) -> Self {
        Self {
            title: title.to_owned(),
            format: format.to_owned(),
            relationship,
            ..Default::default()
        }
    }

    pub fn is_parent(&self) -> bool {
        self.relationship == Relationship::ParentOf
    }

    /// Label of the ingredient's manifest, if it has one.
    pub fn manifest_label(&self) -> Option<String> {
        self.c2pa_manifest
            .as_ref()
            .and_then(|m| crate::jumbf::labels::manifest_label_from_uri(m.url()))
    }
}

impl AssertionCbor for Ingredient {}

impl AssertionBase for Ingredient {
    const LABEL: &'static str = labels::INGREDIENT;

    fn to_assertion(&self) -> Result<Assertion> {
        Self::to_cbor_assertion(self)
    }

    fn from_assertion(assertion: &Assertion) -> Result<Self> {
        Self::from_cbor_assertion(assertion)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{jumbf::labels::to_manifest_uri, validation_status};

    #[test]
    fn ingredient_round_trip() {
        let mut status = ValidationStatus::new();
        status.pass(
            validation_status::CHECK_CLAIM_SIGNATURE,
            validation_status::CLAIM_SIGNATURE_VALIDATED,
            None,
        );

        let mut original = Ingredient::new("A.jpg", "image/jpeg", Relationship::ParentOf);
        original.c2pa_manifest = Some(HashedUri::new(
            to_manifest_uri("urn:uuid:1234"),
            Some("sha256".into()),
            &[9; 32],
        ));
        original.validation_status = Some(status);
        original.hash = Some(vec![1; 32]);

        let assertion = original.to_assertion().unwrap();
        let back = Ingredient::from_assertion(&assertion).unwrap();
        assert_eq!(back, original);
        assert!(back.is_parent());
        assert_eq!(back.manifest_label().unwrap(), "urn:uuid:1234");

        let json = assertion.as_json_object().unwrap();
        assert_eq!(json["relationship"], "parentOf");
        assert_eq!(json["dc:title"], "A.jpg");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let ingredient = Ingredient::new("B.jpg", "image/jpeg", Relationship::ComponentOf);
        let json = ingredient.to_assertion().unwrap().as_json_object().unwrap();

        assert!(json.get("c2pa_manifest").is_none());
        assert!(json.get("hash").is_none());

        let back = Ingredient::from_assertion(&ingredient.to_assertion().unwrap()).unwrap();
        assert!(back.hash.is_none());
        assert!(!back.is_parent());
    }
}
