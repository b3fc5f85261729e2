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

//! Implements validation status for specific parts of a manifest.
//!
//! See <https://c2pa.org/specifications/specifications/1.0/specs/C2PA_Specification.html#_existing_manifests>.

use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};

// Check names. Each check appears at most once in a [`ValidationStatus`];
// per-assertion and per-ingredient checks append the label.

/// Signature over the claim bytes.
pub const CHECK_CLAIM_SIGNATURE: &str = "claimSignature";
/// Certificate profile of the signing certificate.
pub const CHECK_SIGNING_CREDENTIAL: &str = "signingCredential";
/// Chain of trust of the signing certificate.
pub const CHECK_SIGNING_CREDENTIAL_TRUST: &str = "signingCredential.trust";
/// Revocation status of the signing certificate.
pub const CHECK_SIGNING_CREDENTIAL_OCSP: &str = "signingCredential.ocsp";
/// RFC 3161 time stamp.
pub const CHECK_TIME_STAMP: &str = "timeStamp";
/// Hard binding of the claim to the asset bytes.
pub const CHECK_DATA_HASH: &str = "assertion.dataHash";
/// Prefix for hashed URI checks of assertions.
pub const CHECK_ASSERTION_PREFIX: &str = "assertion.hashedURI.";
/// Prefix for ingredient manifest checks.
pub const CHECK_INGREDIENT_PREFIX: &str = "ingredient.";
/// Structure of a whole manifest store.
pub const CHECK_MANIFEST_STORE: &str = "manifestStore";

// Success codes
pub const CLAIM_SIGNATURE_VALIDATED: &str = "claimSignature.validated";
pub const SIGNING_CREDENTIAL_TRUSTED: &str = "signingCredential.trusted";
pub const SIGNING_CREDENTIAL_VALID: &str = "signingCredential.valid";
pub const SIGNING_CREDENTIAL_NOT_REVOKED: &str = "signingCredential.ocsp.notRevoked";
pub const TIMESTAMP_TRUSTED: &str = "timeStamp.trusted";
pub const ASSERTION_HASHEDURI_MATCH: &str = "assertion.hashedURI.match";
pub const ASSERTION_DATAHASH_MATCH: &str = "assertion.dataHash.match";
pub const INGREDIENT_HASHEDURI_MATCH: &str = "ingredient.hashedURI.match";

// Failure codes
pub const CLAIM_MISSING: &str = "claim.missing";
pub const CLAIM_MALFORMED: &str = "claim.malformed";
pub const CLAIM_SIGNATURE_MISMATCH: &str = "claimSignature.mismatch";
pub const SIGNING_CREDENTIAL_UNTRUSTED: &str = "signingCredential.untrusted";
pub const SIGNING_CREDENTIAL_INVALID: &str = "signingCredential.invalid";
pub const SIGNING_CREDENTIAL_REVOKED: &str = "signingCredential.ocsp.revoked";
pub const SIGNING_CREDENTIAL_OCSP_SKIPPED: &str = "signingCredential.ocsp.skipped";
pub const TIMESTAMP_MISMATCH: &str = "timeStamp.mismatch";
pub const TIMESTAMP_MALFORMED: &str = "timeStamp.malformed";
pub const ASSERTION_HASHEDURI_MISMATCH: &str = "assertion.hashedURI.mismatch";
pub const ASSERTION_MISSING: &str = "assertion.missing";
pub const ASSERTION_CBOR_INVALID: &str = "assertion.cbor.invalid";
pub const ASSERTION_DATAHASH_MISMATCH: &str = "assertion.dataHash.mismatch";
pub const ASSERTION_DATAHASH_MALFORMED: &str = "assertion.dataHash.malformed";
pub const INGREDIENT_HASHEDURI_MISMATCH: &str = "ingredient.hashedURI.mismatch";
pub const MANIFEST_INACCESSIBLE: &str = "manifest.inaccessible";

/// Result of a single check.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Warning,
}

/// The recorded result of one check.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StatusEntry {
    code: String,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

impl StatusEntry {
    pub fn new(code: &str, outcome: Outcome) -> Self {
        Self {
            code: code.to_owned(),
            outcome,
            url: None,
            explanation: None,
        }
    }

    pub fn set_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn set_explanation<S: Into<String>>(mut self, explanation: S) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// A C2PA status code such as `claimSignature.validated`.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// JUMBF URI of the part of the manifest the entry refers to.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

/// The outcome of one validation pass over one manifest, keyed by check.
///
/// Ordered by check name so equal passes serialize identically.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationStatus(BTreeMap<String, StatusEntry>);

impl ValidationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `entry` for `check`, replacing an earlier result.
    pub fn insert<S: Into<String>>(&mut self, check: S, entry: StatusEntry) {
        self.0.insert(check.into(), entry);
    }

    pub(crate) fn pass(&mut self, check: &str, code: &str, url: Option<&str>) {
        self.record(check, code, Outcome::Pass, url, None);
    }

    pub(crate) fn fail(&mut self, check: &str, code: &str, url: Option<&str>, why: String) {
        self.record(check, code, Outcome::Fail, url, Some(why));
    }

    pub(crate) fn warn(&mut self, check: &str, code: &str, url: Option<&str>, why: String) {
        self.record(check, code, Outcome::Warning, url, Some(why));
    }

    fn record(
        &mut self,
        check: &str,
        code: &str,
        outcome: Outcome,
        url: Option<&str>,
        explanation: Option<String>,
    ) {
        let mut entry = StatusEntry::new(code, outcome);
        entry.url = url.map(str::to_owned);
        entry.explanation = explanation;
        self.insert(check, entry);
    }

    pub fn get(&self, check: &str) -> Option<&StatusEntry> {
        self.0.get(check)
    }

    pub fn outcome(&self, check: &str) -> Option<Outcome> {
        self.get(check).map(StatusEntry::outcome)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, StatusEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries with [`Outcome::Fail`].
    pub fn failures(&self) -> impl Iterator<Item = (&String, &StatusEntry)> {
        self.0.iter().filter(|(_, e)| e.outcome == Outcome::Fail)
    }

    /// Returns `true` if no check failed. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Outcome of the claim signature check.
    pub fn signature(&self) -> Option<Outcome> {
        self.outcome(CHECK_CLAIM_SIGNATURE)
    }

    /// Returns `true` if the signature or the signing certificate failed.
    pub fn signature_invalid(&self) -> bool {
        [CHECK_CLAIM_SIGNATURE, CHECK_SIGNING_CREDENTIAL]
            .iter()
            .any(|c| self.outcome(c) == Some(Outcome::Fail))
    }

    /// Returns `true` if the asset bytes no longer match the hard binding.
    pub fn content_tampered(&self) -> bool {
        self.outcome(CHECK_DATA_HASH) == Some(Outcome::Fail)
    }

    /// Returns `true` if any entry carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.0.values().any(|e| e.code == code)
    }
}

impl<'a> IntoIterator for &'a ValidationStatus {
    type Item = (&'a String, &'a StatusEntry);
    type IntoIter = btree_map::Iter<'a, String, StatusEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn summary_flags() {
        let mut status = ValidationStatus::new();
        assert!(status.is_valid());
        assert_eq!(status.signature(), None);

        status.pass(CHECK_CLAIM_SIGNATURE, CLAIM_SIGNATURE_VALIDATED, None);
        status.warn(
            CHECK_SIGNING_CREDENTIAL_TRUST,
            SIGNING_CREDENTIAL_UNTRUSTED,
            None,
            "no trust anchors".into(),
        );
        assert!(status.is_valid());
        assert!(!status.signature_invalid());
        assert_eq!(status.signature(), Some(Outcome::Pass));

        status.fail(
            CHECK_DATA_HASH,
            ASSERTION_DATAHASH_MISMATCH,
            Some("self#jumbf=c2pa.assertions/c2pa.hash.data"),
            "hash mismatch".into(),
        );
        assert!(!status.is_valid());
        assert!(status.content_tampered());
        assert!(status.has_code(ASSERTION_DATAHASH_MISMATCH));
        assert_eq!(status.failures().count(), 1);
    }

    #[test]
    fn serialization_is_ordered() {
        let mut a = ValidationStatus::new();
        a.pass(CHECK_TIME_STAMP, TIMESTAMP_TRUSTED, None);
        a.pass(CHECK_CLAIM_SIGNATURE, CLAIM_SIGNATURE_VALIDATED, None);

        let mut b = ValidationStatus::new();
        b.pass(CHECK_CLAIM_SIGNATURE, CLAIM_SIGNATURE_VALIDATED, None);
        b.pass(CHECK_TIME_STAMP, TIMESTAMP_TRUSTED, None);

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["claimSignature"]["outcome"], "pass");
        assert!(json["claimSignature"].get("url").is_none());

        let cbor = serde_cbor::to_vec(&a).unwrap();
        let back: ValidationStatus = serde_cbor::from_slice(&cbor).unwrap();
        assert_eq!(back, a);
    }
}
