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

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    assertion::Assertion,
    assertions::labels,
    claim::Claim,
    claim_generator_info::ClaimGeneratorInfo,
    cose_validator::SignatureInfo,
    error::{Error, Result},
    ingredient::Ingredient,
    manifest_assertion::ManifestAssertion,
    resource_store::ResourceRef,
    validation_status::ValidationStatus,
    validator::ManifestValidation,
};

/// A read-only view of one signed manifest, as it appears in a report.
///
/// Hash bindings and ingredient assertions are not listed with the other
/// assertions; ingredients have their own list and binary assertions are
/// reachable as resources.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    label: String,

    claim_generator: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    claim_generator_info: Option<Vec<ClaimGeneratorInfo>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,

    format: String,

    instance_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<ResourceRef>,

    assertions: Vec<ManifestAssertion>,

    ingredients: Vec<Ingredient>,

    #[serde(skip_serializing_if = "Option::is_none")]
    signature_info: Option<SignatureInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    validation_status: Option<ValidationStatus>,
}

impl Manifest {
    /// Builds the view of `claim`. `validation` is `None` for manifests the
    /// last validation pass did not reach.
    pub(crate) fn from_claim(claim: &Claim, validation: Option<&ManifestValidation>) -> Self {
        let label = claim.label();

        let mut assertions = Vec::new();
        let mut thumbnail = None;
        for ca in claim.claim_assertion_store() {
            let assertion = ca.assertion();
            let root = assertion.label_root();

            if root.starts_with(labels::CLAIM_THUMBNAIL) && thumbnail.is_none() {
                thumbnail = Some(ResourceRef::from_assertion(
                    label,
                    assertion,
                    claim.alg(),
                    ca.hash(),
                ));
                continue;
            }
            if assertion.is_binary() || labels::is_hash_binding(root) || root == labels::INGREDIENT
            {
                continue;
            }

            match ManifestAssertion::from_claim_assertion(assertion) {
                Ok(ma) => assertions.push(ma),
                Err(e) => debug!("skipping assertion {} in report: {e}", assertion.label()),
            }
        }

        let ingredients = claim
            .assertions_by_root(labels::INGREDIENT)
            .filter_map(|a| match Ingredient::from_claim_assertion(claim, a) {
                Ok(i) => Some(i),
                Err(e) => {
                    debug!("skipping ingredient {} in report: {e}", a.label());
                    None
                }
            })
            .collect();

        Self {
            label: label.to_owned(),
            claim_generator: claim.claim_generator.clone(),
            claim_generator_info: claim.claim_generator_info.clone(),
            title: claim.title().map(str::to_owned),
            format: claim.format().to_owned(),
            instance_id: claim.instance_id().to_owned(),
            thumbnail,
            assertions,
            ingredients,
            signature_info: validation.and_then(|v| v.signature_info.clone()),
            validation_status: validation.map(|v| v.status.clone()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn claim_generator(&self) -> &str {
        &self.claim_generator
    }

    pub fn claim_generator_info(&self) -> Option<&[ClaimGeneratorInfo]> {
        self.claim_generator_info.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// MIME type of the asset the manifest was made for.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Reference to the claim thumbnail, if there is one.
    pub fn thumbnail_ref(&self) -> Option<&ResourceRef> {
        self.thumbnail.as_ref()
    }

    pub fn assertions(&self) -> &[ManifestAssertion] {
        &self.assertions
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    /// The parent ingredient, if the manifest has one.
    pub fn parent(&self) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.is_parent())
    }

    pub fn signature_info(&self) -> Option<&SignatureInfo> {
        self.signature_info.as_ref()
    }

    /// Status recorded by the validation pass that produced this view.
    pub fn validation_status(&self) -> Option<&ValidationStatus> {
        self.validation_status.as_ref()
    }

    /// Finds the first assertion with `label` and deserializes it.
    pub fn find_assertion<T: DeserializeOwned>(&self, label: &str) -> Result<T> {
        self.assertions
            .iter()
            .find(|a| a.label() == label)
            .ok_or_else(|| Error::AssertionMissing {
                label: label.to_owned(),
            })?
            .to_assertion()
    }
}

/// The binary payload of `assertion`, for resource extraction.
pub(crate) fn resource_data(assertion: &Assertion) -> Result<&[u8]> {
    if assertion.is_binary() {
        Ok(assertion.data())
    } else {
        Err(Error::ResourceNotFound(assertion.label().to_owned()))
    }
}

impl std::fmt::Display for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).unwrap_or_default();
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{
        assertions::{c2pa_action, Action, Actions, DataHash, Ingredient as IngredientAssertion,
            Relationship},
        validation_status::{self as vs, Outcome},
    };

    fn claim() -> Claim {
        let mut claim = Claim::new_with_label("urn:uuid:m", "manifest test", "image/jpeg");
        claim.set_title(Some("m.jpg".into()));
        claim
            .add_assertion(&Actions::new().add_action(Action::new(c2pa_action::OPENED)))
            .unwrap();
        claim
            .add_assertion(&DataHash::new("jumbf manifest", "sha256"))
            .unwrap();
        claim
            .add_raw_assertion(Assertion::from_data_binary(
                "c2pa.thumbnail.claim.jpeg",
                "image/jpeg",
                &[1, 2, 3],
            ))
            .unwrap();
        claim
            .add_assertion(&IngredientAssertion::new(
                "parent.jpg",
                "image/jpeg",
                Relationship::ParentOf,
            ))
            .unwrap();
        claim
    }

    #[test]
    fn view_splits_assertions() {
        let manifest = Manifest::from_claim(&claim(), None);

        assert_eq!(manifest.label(), "urn:uuid:m");
        assert_eq!(manifest.title(), Some("m.jpg"));
        assert_eq!(manifest.assertions().len(), 1);
        assert_eq!(manifest.assertions()[0].label(), "c2pa.actions");

        let thumb = manifest.thumbnail_ref().unwrap();
        assert_eq!(thumb.format, "image/jpeg");
        assert!(thumb.identifier.ends_with("c2pa.assertions/c2pa.thumbnail.claim.jpeg"));

        assert_eq!(manifest.ingredients().len(), 1);
        assert_eq!(manifest.parent().unwrap().title(), "parent.jpg");
        assert!(manifest.validation_status().is_none());

        let actions: Actions = manifest.find_assertion("c2pa.actions").unwrap();
        assert!(actions.contains(c2pa_action::OPENED));
        assert!(matches!(
            manifest.find_assertion::<Actions>("org.example.none"),
            Err(Error::AssertionMissing { .. })
        ));
    }

    #[test]
    fn view_carries_validation() {
        let mut status = ValidationStatus::new();
        status.pass(
            vs::CHECK_CLAIM_SIGNATURE,
            vs::CLAIM_SIGNATURE_VALIDATED,
            None,
        );
        let validation = ManifestValidation {
            status,
            signature_info: None,
        };

        let manifest = Manifest::from_claim(&claim(), Some(&validation));
        assert_eq!(
            manifest.validation_status().unwrap().signature(),
            Some(Outcome::Pass)
        );

        let json: serde_json::Value = serde_json::from_str(&manifest.to_string()).unwrap();
        assert_eq!(json["format"], "image/jpeg");
        assert_eq!(json["ingredients"][0]["relationship"], "parentOf");
    }
}
