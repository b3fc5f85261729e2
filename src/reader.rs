// Copyright 2024 Adobe. All rights reserved.
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

//! Reading and validating manifest stores.

use std::{collections::BTreeMap, io::Write};

use log::{debug, error};
use serde::Serialize;

use crate::{
    asset_io::CAIRead,
    error::{Error, ErrorKind, Result},
    jumbf::labels::{assertion_label_from_uri, manifest_label_from_uri},
    jumbf_io::load_jumbf_from_stream,
    manifest::{resource_data, Manifest},
    settings::{get_settings, Settings},
    store::Store,
    trust_handler::trust_handler_from_settings,
    utils::mime::format_to_mime,
    validation_status::ValidationStatus,
    validator::{StoreValidator, ValidationState},
};

/// The result of reading and validating the manifest store of one asset.
///
/// Failed checks are recorded in each manifest's [`ValidationStatus`];
/// only a missing or unparsable store changes the [`ValidationState`].
#[derive(Debug)]
pub struct Reader {
    state: ValidationState,
    active_manifest: Option<String>,
    manifests: BTreeMap<String, Manifest>,
    error: Option<String>,
    store: Option<Store>,
}

#[derive(Serialize)]
struct ManifestStoreReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    active_manifest: Option<&'a str>,
    manifests: &'a BTreeMap<String, Manifest>,
}

#[derive(Serialize)]
struct Report<'a> {
    validation_state: ValidationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_store: Option<ManifestStoreReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Reader {
    /// Reads the manifest store embedded in `stream` and validates it with
    /// the process-wide settings.
    ///
    /// `format` is a MIME type or extension. An asset without a manifest
    /// store yields [`ValidationState::NoManifest`], not an error.
    pub fn from_stream(format: &str, stream: &mut dyn CAIRead) -> Result<Reader> {
        Self::from_stream_with_settings(format, stream, &get_settings())
    }

    pub fn from_stream_with_settings(
        format: &str,
        stream: &mut dyn CAIRead,
        settings: &Settings,
    ) -> Result<Reader> {
        let format = format_to_mime(format);

        let jumbf = match load_jumbf_from_stream(&format, stream) {
            Ok(jumbf) => jumbf,
            Err(Error::JumbfNotFound) => return Ok(Self::no_manifest()),
            Err(e) if e.kind() == ErrorKind::Malformed => return Ok(Self::malformed(e)),
            Err(e) => return Err(e),
        };

        Self::from_jumbf_and_stream(&jumbf, stream, settings)
    }

    /// Validates `stream` against a manifest store kept outside it, such as
    /// a `.c2pa` sidecar.
    pub fn from_manifest_data_and_stream(
        manifest_data: &[u8],
        format: &str,
        stream: &mut dyn CAIRead,
    ) -> Result<Reader> {
        Self::from_manifest_data_and_stream_with_settings(
            manifest_data,
            format,
            stream,
            &get_settings(),
        )
    }

    pub fn from_manifest_data_and_stream_with_settings(
        manifest_data: &[u8],
        format: &str,
        stream: &mut dyn CAIRead,
        settings: &Settings,
    ) -> Result<Reader> {
        debug!("validating {} against a detached store", format_to_mime(format));
        Self::from_jumbf_and_stream(manifest_data, stream, settings)
    }

    fn from_jumbf_and_stream(
        jumbf: &[u8],
        stream: &mut dyn CAIRead,
        settings: &Settings,
    ) -> Result<Reader> {
        let store = match Store::from_jumbf(jumbf) {
            Ok(store) => store,
            Err(Error::JumbfNotFound) => return Ok(Self::no_manifest()),
            Err(e) => {
                error!("manifest store could not be parsed: {e}");
                return Ok(Self::malformed(e));
            }
        };

        let th = trust_handler_from_settings(&settings.trust)?;
        let results = StoreValidator::new(&store, &th, &settings.verify).validate(stream)?;

        let manifests = store
            .claims()
            .iter()
            .map(|claim| {
                (
                    claim.label().to_owned(),
                    Manifest::from_claim(claim, results.get(claim.label())),
                )
            })
            .collect();

        Ok(Reader {
            state: ValidationState::Validated,
            active_manifest: store.provenance_label().map(str::to_owned),
            manifests,
            error: None,
            store: Some(store),
        })
    }

    fn no_manifest() -> Self {
        Reader {
            state: ValidationState::NoManifest,
            active_manifest: None,
            manifests: BTreeMap::new(),
            error: None,
            store: None,
        }
    }

    fn malformed(e: Error) -> Self {
        Reader {
            error: Some(e.to_string()),
            state: ValidationState::Malformed,
            ..Self::no_manifest()
        }
    }

    pub fn validation_state(&self) -> ValidationState {
        self.state
    }

    /// Why the store could not be parsed, for [`ValidationState::Malformed`].
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn active_label(&self) -> Option<&str> {
        self.active_manifest.as_deref()
    }

    pub fn active_manifest(&self) -> Option<&Manifest> {
        self.active_manifest
            .as_ref()
            .and_then(|label| self.manifests.get(label))
    }

    pub fn get_manifest(&self, label: &str) -> Option<&Manifest> {
        self.manifests.get(label)
    }

    /// Every manifest in the store, keyed by label.
    pub fn manifests(&self) -> &BTreeMap<String, Manifest> {
        &self.manifests
    }

    /// Validation status of the active manifest.
    pub fn validation_status(&self) -> Option<&ValidationStatus> {
        self.active_manifest().and_then(Manifest::validation_status)
    }

    /// The report as a JSON value.
    pub fn report(&self) -> serde_json::Value {
        serde_json::to_value(self.to_report()).unwrap_or_default()
    }

    /// The report as pretty printed JSON.
    pub fn json(&self) -> String {
        self.to_string()
    }

    fn to_report(&self) -> Report<'_> {
        Report {
            validation_state: self.state,
            manifest_store: (self.state == ValidationState::Validated).then(|| {
                ManifestStoreReport {
                    active_manifest: self.active_label(),
                    manifests: &self.manifests,
                }
            }),
            error: self.error(),
        }
    }

    /// Writes the bytes of an embedded resource to `stream`.
    ///
    /// `identifier` is the JUMBF URI found in a [`ResourceRef`] of the
    /// report, or the label of a binary assertion of `manifest_label`.
    /// Returns the number of bytes written.
    ///
    /// [`ResourceRef`]: crate::ResourceRef
    pub fn resource_to_stream(
        &self,
        manifest_label: &str,
        identifier: &str,
        stream: &mut dyn Write,
    ) -> Result<usize> {
        let data = self.resource_bytes(manifest_label, identifier)?;
        stream.write_all(data)?;
        Ok(data.len())
    }

    pub(crate) fn resource_bytes(&self, manifest_label: &str, identifier: &str) -> Result<&[u8]> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::ResourceNotFound(identifier.to_owned()))?;

        // absolute URIs name their own manifest
        let owner =
            manifest_label_from_uri(identifier).unwrap_or_else(|| manifest_label.to_owned());
        let claim = store
            .get_claim(&owner)
            .ok_or(Error::ClaimMissing { label: owner })?;

        let label = assertion_label_from_uri(identifier).unwrap_or_else(|| identifier.to_owned());
        let assertion = claim
            .get_assertion(&label)
            .ok_or_else(|| Error::ResourceNotFound(identifier.to_owned()))?;

        resource_data(assertion)
    }

    /// Consumes the reader, returning the parsed store if there is one.
    pub(crate) fn into_store(self) -> Option<Store> {
        self.store
    }
}

impl std::fmt::Display for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(&self.to_report()).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Cursor;

    use super::*;
    use crate::{
        assertion::Assertion,
        assertions::{c2pa_action, Action, Actions},
        claim::Claim,
        jumbf::{
            boxes::{JUMBFSuperBox, CAI_BLOCK_UUID},
            labels::MANIFEST_STORE,
        },
        utils::test::{temp_signer, test_jpeg, test_settings},
        validation_status::Outcome,
    };

    fn signed_jpeg() -> Vec<u8> {
        let mut claim = Claim::new_with_label("urn:uuid:r", "reader test", "image/jpeg");
        claim
            .add_assertion(&Actions::new().add_action(Action::new(c2pa_action::CREATED)))
            .unwrap();
        claim
            .add_raw_assertion(Assertion::from_data_binary(
                "c2pa.thumbnail.claim.jpeg",
                "image/jpeg",
                b"thumbnail bytes",
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
    fn no_manifest_is_not_an_error() {
        let reader = Reader::from_stream_with_settings(
            "jpg",
            &mut Cursor::new(test_jpeg()),
            &test_settings(),
        )
        .unwrap();

        assert_eq!(reader.validation_state(), ValidationState::NoManifest);
        assert!(reader.active_manifest().is_none());

        let report = reader.report();
        assert_eq!(report["validation_state"], "NoManifest");
        assert!(report.get("manifest_store").is_none());
        assert!(report.get("error").is_none());
    }

    #[test]
    fn malformed_store() {
        let empty = JUMBFSuperBox::new(MANIFEST_STORE, Some(CAI_BLOCK_UUID))
            .to_bytes()
            .unwrap();
        let reader = Reader::from_manifest_data_and_stream(
            &empty,
            "image/jpeg",
            &mut Cursor::new(test_jpeg()),
        )
        .unwrap();

        assert_eq!(reader.validation_state(), ValidationState::Malformed);
        let report = reader.report();
        assert!(report["error"].is_string());
        assert!(report.get("manifest_store").is_none());
    }

    #[test]
    fn validated_report() {
        let asset = signed_jpeg();
        let reader = Reader::from_stream_with_settings(
            "image/jpeg",
            &mut Cursor::new(&asset),
            &test_settings(),
        )
        .unwrap();

        assert_eq!(reader.validation_state(), ValidationState::Validated);
        assert_eq!(reader.active_label(), Some("urn:uuid:r"));
        let status = reader.validation_status().unwrap();
        assert!(status.is_valid(), "{status:?}");
        assert_eq!(status.signature(), Some(Outcome::Pass));

        let report = reader.report();
        assert_eq!(report["manifest_store"]["active_manifest"], "urn:uuid:r");
        assert_eq!(
            report["manifest_store"]["manifests"]["urn:uuid:r"]["assertions"][0]["label"],
            "c2pa.actions"
        );

        let again = Reader::from_stream_with_settings(
            "image/jpeg",
            &mut Cursor::new(&asset),
            &test_settings(),
        )
        .unwrap();
        assert_eq!(reader.validation_status(), again.validation_status());
    }

    #[test]
    fn resources() {
        let asset = signed_jpeg();
        let reader = Reader::from_stream_with_settings(
            "image/jpeg",
            &mut Cursor::new(&asset),
            &test_settings(),
        )
        .unwrap();

        let manifest = reader.active_manifest().unwrap();
        let thumb = manifest.thumbnail_ref().unwrap();

        let mut out = Vec::new();
        let n = reader
            .resource_to_stream(manifest.label(), &thumb.identifier, &mut out)
            .unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out, b"thumbnail bytes");

        assert!(matches!(
            reader.resource_to_stream(manifest.label(), "c2pa.actions", &mut Vec::new()),
            Err(Error::ResourceNotFound(_))
        ));
        assert!(matches!(
            reader.resource_to_stream(manifest.label(), "nothing.here", &mut Vec::new()),
            Err(Error::ResourceNotFound(_))
        ));
    }
}
