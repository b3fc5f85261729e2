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

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    assertion::{Assertion, AssertionBase},
    assertions::{self, labels, Relationship},
    asset_io::CAIRead,
    claim::Claim,
    error::{Error, Result},
    hashed_uri::HashedUri,
    jumbf::labels::{assertion_label_from_uri, to_manifest_uri},
    reader::Reader,
    resource_store::{ResourceRef, ResourceStore},
    settings::{get_settings, Settings},
    store::Store,
    utils::{
        hash_utils::{hash_stream_by_alg, DEFAULT_HASH_ALG},
        mime::{format_to_extension, format_to_mime},
    },
    validation_status::{self as vs, ValidationStatus},
    validator::ValidationState,
};

/// An asset or manifest that contributed to a new manifest.
///
/// The same type describes an ingredient in a manifest definition, where
/// most fields are optional, and in a report.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Ingredient {
    #[serde(default)]
    title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    instance_id: Option<String>,

    #[serde(default)]
    relationship: Relationship,

    /// Label of the ingredient's active manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    active_manifest: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<ResourceRef>,

    /// Status from when the ingredient was validated, kept as recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_status: Option<ValidationStatus>,

    /// Base64 hash of the ingredient asset bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<String>,

    #[serde(skip)]
    manifest_store: Option<Store>,

    // set only when `hash` was computed from the asset bytes
    #[serde(skip)]
    hashed: bool,

    #[serde(skip)]
    resources: ResourceStore,
}

impl Ingredient {
    pub fn new<S: Into<String>>(title: S, format: &str, relationship: Relationship) -> Self {
        Self {
            title: title.into(),
            format: Some(format_to_mime(format)),
            relationship,
            ..Default::default()
        }
    }

    /// Parses an ingredient definition. Unknown fields are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Creates an ingredient from an asset, using the process-wide
    /// settings to validate any manifest store it carries.
    pub fn from_stream(format: &str, stream: &mut dyn CAIRead) -> Result<Self> {
        Self::from_stream_with_settings(format, stream, &get_settings())
    }

    /// Hashes the asset in `stream` and, if it carries a manifest store,
    /// validates it and records the active manifest's status.
    ///
    /// A store that cannot be parsed does not fail the call; the ingredient
    /// records a `claim.malformed` status instead.
    pub fn from_stream_with_settings(
        format: &str,
        stream: &mut dyn CAIRead,
        settings: &Settings,
    ) -> Result<Self> {
        let format = format_to_mime(format);
        let hash = hash_stream_by_alg(DEFAULT_HASH_ALG, stream, None)?;
        stream.rewind()?;

        let mut ingredient = Ingredient {
            format: Some(format.clone()),
            hash: Some(STANDARD.encode(hash)),
            alg: Some(DEFAULT_HASH_ALG.to_owned()),
            hashed: true,
            ..Default::default()
        };

        let reader = Reader::from_stream_with_settings(&format, stream, settings)?;
        match reader.validation_state() {
            ValidationState::NoManifest => {}
            ValidationState::Malformed => {
                let mut status = ValidationStatus::new();
                status.fail(
                    vs::CHECK_MANIFEST_STORE,
                    vs::CLAIM_MALFORMED,
                    None,
                    reader.error().unwrap_or_default().to_owned(),
                );
                ingredient.validation_status = Some(status);
            }
            ValidationState::Validated => {
                if let Some(manifest) = reader.active_manifest() {
                    debug!("ingredient carries manifest {}", manifest.label());
                    ingredient.title = manifest.title().unwrap_or_default().to_owned();
                    ingredient.instance_id = Some(manifest.instance_id().to_owned());
                    ingredient.active_manifest = Some(manifest.label().to_owned());
                    ingredient.validation_status = manifest.validation_status().cloned();

                    if let Some(thumb) = manifest.thumbnail_ref() {
                        let data = reader.resource_bytes(manifest.label(), &thumb.identifier)?;
                        ingredient.resources.add(thumb.identifier.clone(), data.to_vec());
                        ingredient.thumbnail = Some(ResourceRef::new(
                            thumb.format.clone(),
                            thumb.identifier.clone(),
                        ));
                    }
                }
                ingredient.manifest_store = reader.into_store();
            }
        }

        Ok(ingredient)
    }

    /// Report form of an ingredient assertion of `claim`.
    pub(crate) fn from_claim_assertion(claim: &Claim, assertion: &Assertion) -> Result<Self> {
        let ia = assertions::Ingredient::from_assertion(assertion)?;

        let thumbnail = ia.thumbnail.as_ref().and_then(|uri| {
            let label = assertion_label_from_uri(uri.url())?;
            let ca = claim.get_claim_assertion(&label)?;
            Some(ResourceRef::from_assertion(
                claim.label(),
                ca.assertion(),
                uri.alg().unwrap_or(claim.alg()),
                ca.hash(),
            ))
        });

        Ok(Self {
            active_manifest: ia.manifest_label(),
            title: ia.title,
            format: Some(ia.format),
            instance_id: ia.instance_id,
            relationship: ia.relationship,
            thumbnail,
            validation_status: ia.validation_status,
            hash: ia.hash.map(|h| STANDARD.encode(h)),
            alg: ia.alg,
            manifest_store: None,
            hashed: false,
            resources: ResourceStore::new(),
        })
    }

    /// Converts to the ingredient assertion of `claim`, adding the
    /// thumbnail as a binary assertion first.
    ///
    /// Thumbnail bytes come from `resources` or from the thumbnail captured
    /// when the ingredient was read. The ingredient's manifest, if any, must
    /// be in its own store so its hash can be recorded.
    pub(crate) fn to_assertion(
        &self,
        claim: &mut Claim,
        resources: &ResourceStore,
    ) -> Result<assertions::Ingredient> {
        let format = self
            .format
            .as_deref()
            .ok_or_else(|| Error::MissingField("ingredient format".into()))?;

        let mut ia = assertions::Ingredient::new(&self.title, format, self.relationship.clone());
        ia.instance_id = self.instance_id.clone();
        ia.validation_status = self.validation_status.clone();
        ia.alg = self.alg.clone();
        ia.hash = self
            .hash
            .as_deref()
            .map(|h| STANDARD.decode(h))
            .transpose()
            .map_err(|e| Error::BadParam(format!("ingredient hash: {e}")))?;

        if let Some(label) = &self.active_manifest {
            let store = self
                .manifest_store
                .as_ref()
                .ok_or_else(|| Error::ClaimMissing {
                    label: label.clone(),
                })?;
            let alg = claim.alg().to_owned();
            let hash = store.get_manifest_box_hash(label, &alg)?;
            ia.c2pa_manifest = Some(HashedUri::new(to_manifest_uri(label), Some(alg), &hash));
        }

        if let Some(thumb) = &self.thumbnail {
            let data = resources
                .get(&thumb.identifier)
                .or_else(|_| self.resources.get(&thumb.identifier))?;
            let ext = format_to_extension(&thumb.format).ok_or(Error::UnsupportedType)?;
            let label = format!("{}.{ext}", labels::INGREDIENT_THUMBNAIL);
            let uri = claim.add_raw_assertion(Assertion::from_data_binary(
                &label,
                &format_to_mime(&thumb.format),
                data,
            ))?;
            ia.thumbnail = Some(uri);
        }

        Ok(ia)
    }

    /// Applies the fields a definition sets over an ingredient read from a
    /// stream.
    pub(crate) fn merge_definition(&mut self, definition: Ingredient) {
        if !definition.title.is_empty() {
            self.title = definition.title;
        }
        if definition.instance_id.is_some() {
            self.instance_id = definition.instance_id;
        }
        if definition.thumbnail.is_some() {
            self.thumbnail = definition.thumbnail;
        }
        self.relationship = definition.relationship;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    pub fn set_relationship(&mut self, relationship: Relationship) -> &mut Self {
        self.relationship = relationship;
        self
    }

    pub fn is_parent(&self) -> bool {
        self.relationship == Relationship::ParentOf
    }

    pub fn active_manifest(&self) -> Option<&str> {
        self.active_manifest.as_deref()
    }

    pub fn thumbnail_ref(&self) -> Option<&ResourceRef> {
        self.thumbnail.as_ref()
    }

    /// Sets a thumbnail held in the builder's resources under `identifier`.
    pub fn set_thumbnail_ref(&mut self, thumbnail: ResourceRef) -> &mut Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn validation_status(&self) -> Option<&ValidationStatus> {
        self.validation_status.as_ref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    /// Returns `true` if the ingredient was read from its asset, so its
    /// hash or manifest can be recorded. A hash typed into a definition
    /// does not count.
    pub(crate) fn is_resolved(&self) -> bool {
        self.hashed || self.manifest_store.is_some()
    }

    pub(crate) fn manifest_store(&self) -> Option<&Store> {
        self.manifest_store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Cursor;

    use super::*;
    use crate::{
        assertions::{c2pa_action, Action, Actions},
        utils::test::{temp_signer, test_jpeg, test_settings},
        validation_status::Outcome,
    };

    fn signed(label: &str) -> Vec<u8> {
        let mut claim = Claim::new_with_label(label, "ingredient test", "image/jpeg");
        claim.set_title(Some("signed.jpg".into()));
        claim
            .add_assertion(&Actions::new().add_action(Action::new(c2pa_action::CREATED)))
            .unwrap();
        claim
            .add_raw_assertion(Assertion::from_data_binary(
                "c2pa.thumbnail.claim.jpeg",
                "image/jpeg",
                b"tiny",
            ))
            .unwrap();

        let mut store = Store::new();
        store.commit_claim(claim).unwrap();
        store
            .embed_in_bytes(
                "image/jpeg",
                &test_jpeg(),
                temp_signer().as_ref(),
                &Settings::default(),
            )
            .unwrap()
            .asset
    }

    #[test]
    fn plain_asset() {
        let jpeg = test_jpeg();
        let ingredient =
            Ingredient::from_stream_with_settings("jpg", &mut Cursor::new(&jpeg), &test_settings())
                .unwrap();

        assert_eq!(ingredient.format(), Some("image/jpeg"));
        assert!(ingredient.active_manifest().is_none());
        assert!(ingredient.validation_status().is_none());
        assert_eq!(ingredient.alg(), Some("sha256"));

        let expected = hash_stream_by_alg("sha256", &mut Cursor::new(&jpeg), None).unwrap();
        assert_eq!(ingredient.hash(), Some(STANDARD.encode(expected).as_str()));
    }

    #[test]
    fn signed_asset() {
        let asset = signed("urn:uuid:ing");
        let ingredient = Ingredient::from_stream_with_settings(
            "image/jpeg",
            &mut Cursor::new(&asset),
            &test_settings(),
        )
        .unwrap();

        assert_eq!(ingredient.title(), "signed.jpg");
        assert_eq!(ingredient.active_manifest(), Some("urn:uuid:ing"));
        assert_eq!(
            ingredient.validation_status().unwrap().signature(),
            Some(Outcome::Pass)
        );
        assert!(ingredient.manifest_store().is_some());

        let mut claim = Claim::new("ingredient test", "image/jpeg");
        let ia = ingredient
            .to_assertion(&mut claim, &ResourceStore::new())
            .unwrap();

        assert_eq!(ia.manifest_label().as_deref(), Some("urn:uuid:ing"));
        assert!(ia.thumbnail.is_some());
        assert!(claim
            .get_assertion("c2pa.thumbnail.ingredient.jpeg")
            .is_some());
    }

    #[test]
    fn definition_overrides() {
        let asset = signed("urn:uuid:def");
        let mut ingredient = Ingredient::from_stream_with_settings(
            "jpeg",
            &mut Cursor::new(&asset),
            &test_settings(),
        )
        .unwrap();

        let definition =
            Ingredient::from_json(r#"{"title": "renamed.jpg", "relationship": "parentOf", "x": 1}"#)
                .unwrap();
        ingredient.merge_definition(definition);

        assert_eq!(ingredient.title(), "renamed.jpg");
        assert!(ingredient.is_parent());
        assert_eq!(ingredient.active_manifest(), Some("urn:uuid:def"));
    }

    #[test]
    fn unresolvable_manifest() {
        let ingredient: Ingredient = serde_json::from_str(
            r#"{"title": "x.jpg", "format": "image/jpeg", "active_manifest": "urn:uuid:nowhere"}"#,
        )
        .unwrap();

        let mut claim = Claim::new("ingredient test", "image/jpeg");
        assert!(matches!(
            ingredient.to_assertion(&mut claim, &ResourceStore::new()),
            Err(Error::ClaimMissing { .. })
        ));

        let no_format = Ingredient::from_json(r#"{"title": "y.jpg"}"#).unwrap();
        assert!(matches!(
            no_format.to_assertion(&mut claim, &ResourceStore::new()),
            Err(Error::MissingField(_))
        ));
    }
}
