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

//! Verification of claim signatures and their signing certificates.

use chrono::{DateTime, Utc};
use coset::{
    cbor::value::Value, CborSerializable, CoseSign1, Label, RegisteredLabelWithPrivate,
    TaggedCborSerializable,
};
use log::debug;
use serde::{Deserialize, Serialize};
use x509_parser::prelude::*;

use crate::{
    cose_sign::{R_VALS, SIGNING_TIME, SIG_TST, X5CHAIN},
    error::{Error, Result},
    ocsp_utils::{check_ocsp_response, fetch_ocsp_response},
    openssl::{verify_signature, verify_trust},
    settings::Verify,
    time_stamp::verify_timestamp,
    trust_handler::{has_allowed_oid, TrustHandlerConfig},
    validation_status::{self as vs, ValidationStatus},
    SigningAlg,
};

/// Summary of the signature on a claim, for reports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignatureInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<SigningAlg>,
    /// Organization of the signing certificate's subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_serial_number: Option<String>,
    /// Time from a verified time stamp token, or else the signing time
    /// declared in the protected header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// `Some(true)` when an OCSP response reported the certificate revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_status: Option<bool>,
}

/// The parts of a `COSE_Sign1` the validator needs.
struct ParsedCose {
    sign1: CoseSign1,
    alg: SigningAlg,
    certs: Vec<Vec<u8>>,
}

fn parse_cose(cose_bytes: &[u8]) -> Result<ParsedCose> {
    let sign1 = CoseSign1::from_tagged_slice(cose_bytes)
        .or_else(|_| CoseSign1::from_slice(cose_bytes))
        .map_err(|e| Error::CoseError(e.to_string()))?;

    let alg = match &sign1.protected.header.alg {
        Some(RegisteredLabelWithPrivate::Assigned(a)) => SigningAlg::from_cose_alg(*a),
        _ => None,
    }
    .ok_or_else(|| Error::UnsupportedSigningAlgorithm("missing or unknown COSE alg".into()))?;

    let certs = get_header(&sign1.protected.header.rest, &Label::Int(X5CHAIN))
        .or_else(|| get_header(&sign1.unprotected.rest, &Label::Int(X5CHAIN)))
        .map(cert_chain_from_value)
        .unwrap_or_default();
    if certs.is_empty() {
        return Err(Error::CoseInvalidCert);
    }

    Ok(ParsedCose { sign1, alg, certs })
}

fn get_header<'a>(rest: &'a [(Label, Value)], label: &Label) -> Option<&'a Value> {
    rest.iter().find(|(l, _)| l == label).map(|(_, v)| v)
}

fn cert_chain_from_value(value: &Value) -> Vec<Vec<u8>> {
    match value {
        Value::Bytes(der) => vec![der.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::Bytes(der) => Some(der.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// Finds `outer` -> array -> (map entry `inner` | bytes) in an unprotected
// header container.
fn container_values(value: &Value, outer: &str, inner: Option<&str>) -> Vec<Vec<u8>> {
    let Value::Map(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|(k, _)| matches!(k, Value::Text(t) if t == outer))
        .filter_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .flatten()
        .filter_map(|item| match (item, inner) {
            (Value::Bytes(b), None) => Some(b.clone()),
            (Value::Map(fields), Some(name)) => fields.iter().find_map(|(k, v)| match (k, v) {
                (Value::Text(t), Value::Bytes(b)) if t == name => Some(b.clone()),
                _ => None,
            }),
            _ => None,
        })
        .collect()
}

fn time_stamp_tokens(sign1: &CoseSign1) -> Vec<Vec<u8>> {
    get_header(&sign1.unprotected.rest, &Label::Text(SIG_TST.into()))
        .map(|v| container_values(v, "tstTokens", Some("val")))
        .unwrap_or_default()
}

fn declared_signing_time(sign1: &CoseSign1) -> Option<DateTime<Utc>> {
    match get_header(&sign1.protected.header.rest, &Label::Text(SIGNING_TIME.into()))? {
        Value::Text(t) => DateTime::parse_from_rfc3339(t)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

fn ocsp_responses(sign1: &CoseSign1) -> Vec<Vec<u8>> {
    get_header(&sign1.unprotected.rest, &Label::Text(R_VALS.into()))
        .map(|v| container_values(v, "ocspVals", None))
        .unwrap_or_default()
}

fn check_cert_profile(
    cert_der: &[u8],
    th: &dyn TrustHandlerConfig,
    info: &mut SignatureInfo,
) -> std::result::Result<(), String> {
    let (_, cert) = X509Certificate::from_der(cert_der).map_err(|e| e.to_string())?;

    info.issuer = cert
        .subject()
        .iter_organization()
        .next()
        .and_then(|o| o.as_str().ok())
        .map(str::to_owned);
    info.common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|o| o.as_str().ok())
        .map(str::to_owned);
    info.cert_serial_number = Some(cert.serial.to_string());

    if !cert.validity().is_valid() {
        return Err("signing certificate is outside its validity period".into());
    }

    let allowed = th.get_auxillary_ekus();
    match cert.extended_key_usage() {
        Ok(Some(eku)) if has_allowed_oid(eku.value, &allowed).is_some() => Ok(()),
        Ok(Some(_)) => Err("signing certificate has no allowed extended key usage".into()),
        Ok(None) => Err("signing certificate has no extended key usage".into()),
        Err(e) => Err(e.to_string()),
    }
}

/// Verifies `cose_bytes` as the signature over `claim_bytes`, recording
/// each check in `status`.
///
/// Failures are recorded, never returned; a signature that can not be
/// parsed at all records a mismatch and yields no info.
pub(crate) fn verify_cose(
    cose_bytes: &[u8],
    claim_bytes: &[u8],
    th: &dyn TrustHandlerConfig,
    verify: &Verify,
    check_trust: bool,
    sig_uri: &str,
    status: &mut ValidationStatus,
) -> Option<SignatureInfo> {
    let url = Some(sig_uri);

    let parsed = match parse_cose(cose_bytes) {
        Ok(p) => p,
        Err(Error::CoseInvalidCert) => {
            status.fail(
                vs::CHECK_SIGNING_CREDENTIAL,
                vs::SIGNING_CREDENTIAL_INVALID,
                url,
                "signature carries no certificate chain".into(),
            );
            status.fail(
                vs::CHECK_CLAIM_SIGNATURE,
                vs::CLAIM_SIGNATURE_MISMATCH,
                url,
                "signature can not be checked without a certificate".into(),
            );
            return None;
        }
        Err(e) => {
            status.fail(
                vs::CHECK_CLAIM_SIGNATURE,
                vs::CLAIM_SIGNATURE_MISMATCH,
                url,
                e.to_string(),
            );
            return None;
        }
    };

    let leaf = &parsed.certs[0];
    let mut info = SignatureInfo {
        alg: Some(parsed.alg),
        ..Default::default()
    };

    match check_cert_profile(leaf, th, &mut info) {
        Ok(()) => status.pass(
            vs::CHECK_SIGNING_CREDENTIAL,
            vs::SIGNING_CREDENTIAL_VALID,
            url,
        ),
        Err(why) => status.fail(
            vs::CHECK_SIGNING_CREDENTIAL,
            vs::SIGNING_CREDENTIAL_INVALID,
            url,
            why,
        ),
    }

    let sig_result = parsed
        .sign1
        .verify_detached_signature(claim_bytes, b"", |sig, tbs| {
            match verify_signature(parsed.alg, sig, tbs, leaf) {
                Ok(true) => Ok(()),
                Ok(false) => Err(Error::CoseSignature),
                Err(e) => Err(e),
            }
        });
    match sig_result {
        Ok(()) => status.pass(
            vs::CHECK_CLAIM_SIGNATURE,
            vs::CLAIM_SIGNATURE_VALIDATED,
            url,
        ),
        Err(e) => status.fail(
            vs::CHECK_CLAIM_SIGNATURE,
            vs::CLAIM_SIGNATURE_MISMATCH,
            url,
            e.to_string(),
        ),
    }

    // the first token that verifies wins
    let tokens = time_stamp_tokens(&parsed.sign1);
    if !tokens.is_empty() {
        let mut last_err = None;
        for token in &tokens {
            match verify_timestamp(token, &parsed.sign1.signature) {
                Ok(tst) => {
                    info.time = Some(tst.gen_time);
                    last_err = None;
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            None => status.pass(vs::CHECK_TIME_STAMP, vs::TIMESTAMP_TRUSTED, url),
            Some(e) => status.fail(
                vs::CHECK_TIME_STAMP,
                vs::TIMESTAMP_MISMATCH,
                url,
                e.to_string(),
            ),
        }
    }

    if info.time.is_none() {
        info.time = declared_signing_time(&parsed.sign1);
    }

    let stapled = ocsp_responses(&parsed.sign1);
    let ocsp = match stapled.first() {
        Some(resp) => Some(check_ocsp_response(resp, &parsed.certs)),
        None if verify.ocsp_fetch => Some(
            fetch_ocsp_response(&parsed.certs)
                .and_then(|resp| check_ocsp_response(&resp, &parsed.certs)),
        ),
        None => None,
    };
    match ocsp {
        Some(Ok(data)) if data.is_revoked() => {
            info.revocation_status = Some(true);
            status.fail(
                vs::CHECK_SIGNING_CREDENTIAL_OCSP,
                vs::SIGNING_CREDENTIAL_REVOKED,
                url,
                format!(
                    "certificate revoked at {}",
                    data.revoked_at.unwrap_or_default()
                ),
            );
        }
        Some(Ok(_)) => {
            info.revocation_status = Some(false);
            status.pass(
                vs::CHECK_SIGNING_CREDENTIAL_OCSP,
                vs::SIGNING_CREDENTIAL_NOT_REVOKED,
                url,
            );
        }
        Some(Err(e)) => {
            debug!("OCSP check skipped: {e}");
            status.warn(
                vs::CHECK_SIGNING_CREDENTIAL_OCSP,
                vs::SIGNING_CREDENTIAL_OCSP_SKIPPED,
                url,
                e.to_string(),
            );
        }
        None => (),
    }

    if check_trust {
        if th.has_trust_data() {
            match verify_trust(th, &parsed.certs[1..], leaf) {
                Ok(true) => status.pass(
                    vs::CHECK_SIGNING_CREDENTIAL_TRUST,
                    vs::SIGNING_CREDENTIAL_TRUSTED,
                    url,
                ),
                Ok(false) => status.fail(
                    vs::CHECK_SIGNING_CREDENTIAL_TRUST,
                    vs::SIGNING_CREDENTIAL_UNTRUSTED,
                    url,
                    "signing certificate does not chain to a trust anchor".into(),
                ),
                Err(e) => status.fail(
                    vs::CHECK_SIGNING_CREDENTIAL_TRUST,
                    vs::SIGNING_CREDENTIAL_UNTRUSTED,
                    url,
                    e.to_string(),
                ),
            }
        } else {
            status.warn(
                vs::CHECK_SIGNING_CREDENTIAL_TRUST,
                vs::SIGNING_CREDENTIAL_UNTRUSTED,
                url,
                "no trust anchors configured".into(),
            );
        }
    }

    Some(info)
}
