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

//! Validation of a loaded manifest store.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    assertion::AssertionBase,
    assertions::{labels, Ingredient},
    asset_io::CAIRead,
    claim::Claim,
    cose_validator::{verify_cose, SignatureInfo},
    error::{Error, Result},
    jumbf::labels::{
        assertion_label_from_uri, manifest_label_from_uri, to_assertion_uri, to_manifest_uri,
        to_signature_uri,
    },
    settings::Verify,
    store::Store,
    trust_handler::TrustHandlerConfig,
    utils::hash_utils::vec_compare,
    validation_status::{self as vs, ValidationStatus},
};

/// Where validation of an asset ended up.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ValidationState {
    /// The asset carries no manifest store. Not an error.
    NoManifest,
    /// The manifest store could not be parsed.
    Malformed,
    /// Every manifest was checked. Individual checks may still have failed.
    Validated,
}

/// The result of validating one manifest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManifestValidation {
    pub status: ValidationStatus,
    pub signature_info: Option<SignatureInfo>,
}

/// Validates every manifest reachable from the active one.
///
/// Each manifest is validated once per pass, however many ingredients
/// share it.
pub(crate) struct StoreValidator<'a> {
    store: &'a Store,
    th: &'a dyn TrustHandlerConfig,
    verify: &'a Verify,
    results: HashMap<String, ManifestValidation>,
    visiting: HashSet<String>,
}

impl<'a> StoreValidator<'a> {
    pub fn new(store: &'a Store, th: &'a dyn TrustHandlerConfig, verify: &'a Verify) -> Self {
        Self {
            store,
            th,
            verify,
            results: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Validates the store against `asset`, the bytes the active manifest
    /// is bound to.
    ///
    /// Only I/O failures of `asset` are returned as errors; every other
    /// problem is recorded in the per-manifest status.
    pub fn validate(
        mut self,
        asset: &mut dyn CAIRead,
    ) -> Result<HashMap<String, ManifestValidation>> {
        let active = self
            .store
            .provenance_label()
            .ok_or_else(|| Error::ClaimMissing {
                label: "active manifest".into(),
            })?
            .to_owned();

        let check_trust = self.verify.verify_trust;
        self.validate_manifest(&active, Some(asset), check_trust)?;
        Ok(self.results)
    }

    fn validate_manifest(
        &mut self,
        label: &str,
        asset: Option<&mut dyn CAIRead>,
        check_trust: bool,
    ) -> Result<()> {
        if self.results.contains_key(label) || !self.visiting.insert(label.to_owned()) {
            return Ok(());
        }

        let store = self.store;
        let Some(claim) = store.get_claim(label) else {
            return Ok(());
        };
        debug!("validating manifest {label}");

        let mut status = ValidationStatus::new();

        let signature_info = match claim.data() {
            Ok(claim_bytes) => verify_cose(
                claim.signature_val(),
                &claim_bytes,
                self.th,
                self.verify,
                check_trust,
                &to_signature_uri(label),
                &mut status,
            ),
            Err(e) => {
                status.fail(
                    vs::CHECK_CLAIM_SIGNATURE,
                    vs::CLAIM_SIGNATURE_MISMATCH,
                    Some(&to_manifest_uri(label)),
                    e.to_string(),
                );
                None
            }
        };

        check_assertion_hashes(claim, &mut status);

        if let Some(asset) = asset {
            check_data_hash(claim, asset, &mut status)?;
        }

        let ingredient_trust = check_trust && self.verify.check_ingredient_trust;
        for ingredient_label in self.check_ingredients(claim, &mut status) {
            self.validate_manifest(&ingredient_label, None, ingredient_trust)?;
        }

        self.visiting.remove(label);
        self.results.insert(
            label.to_owned(),
            ManifestValidation {
                status,
                signature_info,
            },
        );
        Ok(())
    }

    // Checks each ingredient manifest reference and returns the labels of
    // the manifests found.
    fn check_ingredients(&self, claim: &Claim, status: &mut ValidationStatus) -> Vec<String> {
        let mut found = Vec::new();

        for assertion in claim.assertions_by_root(labels::INGREDIENT) {
            let check = format!("{}{}", vs::CHECK_INGREDIENT_PREFIX, assertion.label());
            let url = to_assertion_uri(claim.label(), assertion.label());

            let ingredient = match Ingredient::from_assertion(assertion) {
                Ok(i) => i,
                Err(e) => {
                    status.fail(&check, vs::ASSERTION_CBOR_INVALID, Some(&url), e.to_string());
                    continue;
                }
            };

            let Some(manifest_uri) = ingredient.c2pa_manifest.as_ref() else {
                continue;
            };

            let Some(ingredient_label) = manifest_label_from_uri(manifest_uri.url())
                .filter(|l| self.store.get_claim(l).is_some())
            else {
                status.fail(
                    &check,
                    vs::CLAIM_MISSING,
                    Some(manifest_uri.url()),
                    "ingredient manifest is not in the store".into(),
                );
                continue;
            };

            let alg = manifest_uri.alg().unwrap_or(claim.alg());
            match self.store.get_manifest_box_hash(&ingredient_label, alg) {
                Ok(hash) if vec_compare(&hash, manifest_uri.hash()) => {
                    status.pass(&check, vs::INGREDIENT_HASHEDURI_MATCH, Some(manifest_uri.url()))
                }
                Ok(_) => status.fail(
                    &check,
                    vs::INGREDIENT_HASHEDURI_MISMATCH,
                    Some(manifest_uri.url()),
                    "ingredient manifest hash does not match".into(),
                ),
                Err(e) => status.fail(
                    &check,
                    vs::INGREDIENT_HASHEDURI_MISMATCH,
                    Some(manifest_uri.url()),
                    e.to_string(),
                ),
            }

            found.push(ingredient_label);
        }

        found
    }
}

fn check_assertion_hashes(claim: &Claim, status: &mut ValidationStatus) {
    for uri in claim.assertions() {
        let label = assertion_label_from_uri(uri.url()).unwrap_or_else(|| uri.url().to_owned());
        let check = format!("{}{}", vs::CHECK_ASSERTION_PREFIX, label);

        match claim.get_claim_assertion(&label) {
            None => status.fail(
                &check,
                vs::ASSERTION_MISSING,
                Some(uri.url()),
                "assertion named by the claim is not in the manifest".into(),
            ),
            Some(ca) if vec_compare(ca.hash(), uri.hash()) => {
                status.pass(&check, vs::ASSERTION_HASHEDURI_MATCH, Some(uri.url()))
            }
            Some(_) => status.fail(
                &check,
                vs::ASSERTION_HASHEDURI_MISMATCH,
                Some(uri.url()),
                "assertion hash does not match".into(),
            ),
        }
    }
}

fn check_data_hash(
    claim: &Claim,
    asset: &mut dyn CAIRead,
    status: &mut ValidationStatus,
) -> Result<()> {
    let url = to_assertion_uri(claim.label(), labels::DATA_HASH);

    let data_hash = match claim.data_hash() {
        Ok(Some(dh)) => dh,
        Ok(None) => {
            status.fail(
                vs::CHECK_DATA_HASH,
                vs::ASSERTION_MISSING,
                Some(&url),
                "manifest has no hash binding".into(),
            );
            return Ok(());
        }
        Err(e) => {
            status.fail(
                vs::CHECK_DATA_HASH,
                vs::ASSERTION_DATAHASH_MALFORMED,
                Some(&url),
                e.to_string(),
            );
            return Ok(());
        }
    };

    match data_hash.verify_stream_hash(asset, claim.alg()) {
        Ok(()) => status.pass(vs::CHECK_DATA_HASH, vs::ASSERTION_DATAHASH_MATCH, Some(&url)),
        Err(Error::IoError(e)) => return Err(Error::IoError(e)),
        Err(e @ Error::HashMismatch(_)) => status.fail(
            vs::CHECK_DATA_HASH,
            vs::ASSERTION_DATAHASH_MISMATCH,
            Some(&url),
            e.to_string(),
        ),
        Err(e) => status.fail(
            vs::CHECK_DATA_HASH,
            vs::ASSERTION_DATAHASH_MALFORMED,
            Some(&url),
            e.to_string(),
        ),
    }
    Ok(())
}
