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

//! Provides access to COSE signature generation.

use chrono::{SecondsFormat, Utc};
use coset::{
    cbor::value::Value, CoseSign1, CoseSign1Builder, Header, HeaderBuilder,
    TaggedCborSerializable,
};
use log::{error, warn};

use crate::{
    error::{Error, Result},
    ocsp_utils::{check_ocsp_response, fetch_ocsp_response},
    openssl::verify_signature,
    settings::SignerSettings,
    time_stamp::request_timestamp,
    Signer,
};

/// COSE header label of the X.509 certificate chain.
pub(crate) const X5CHAIN: i64 = 33;
/// Protected header with the RFC 3339 time the signature was made.
pub(crate) const SIGNING_TIME: &str = "signingTime";
/// Unprotected header holding RFC 3161 time stamp tokens.
pub(crate) const SIG_TST: &str = "sigTst";
/// Unprotected header holding revocation information.
pub(crate) const R_VALS: &str = "rVals";

/// A signature together with the augmentation steps that did not succeed.
#[derive(Debug)]
pub struct SignOutcome {
    /// Tagged `COSE_Sign1` bytes.
    pub cose: Vec<u8>,
    /// Non-fatal problems, one message each.
    pub warnings: Vec<String>,
}

fn cert_chain_value(certs: &[Vec<u8>]) -> Value {
    match certs {
        [single] => Value::Bytes(single.clone()),
        _ => Value::Array(certs.iter().map(|c| Value::Bytes(c.clone())).collect()),
    }
}

fn build_protected_header(signer: &dyn Signer, certs: &[Vec<u8>]) -> Header {
    HeaderBuilder::new()
        .algorithm(signer.alg().cose_alg())
        .value(X5CHAIN, cert_chain_value(certs))
        .text_value(
            SIGNING_TIME.to_string(),
            Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        )
        .build()
}

fn tst_container(token: Vec<u8>) -> Value {
    Value::Map(vec![(
        Value::Text("tstTokens".to_string()),
        Value::Array(vec![Value::Map(vec![(
            Value::Text("val".to_string()),
            Value::Bytes(token),
        )])]),
    )])
}

fn ocsp_container(response: Vec<u8>) -> Value {
    Value::Map(vec![(
        Value::Text("ocspVals".to_string()),
        Value::Array(vec![Value::Bytes(response)]),
    )])
}

// Records a failed augmentation, or turns it into the result in strict mode.
fn augmentation_failure(
    settings: &SignerSettings,
    what: &str,
    err: Error,
    warnings: &mut Vec<String>,
) -> Result<()> {
    if settings.strict_augmentation {
        error!("{what} failed: {err}");
        return Err(err);
    }
    warn!("{what} failed, signing without it: {err}");
    warnings.push(format!("{what} failed: {err}"));
    Ok(())
}

/// Signs `claim_bytes` with `signer`, producing a tagged `COSE_Sign1` with
/// a detached payload.
///
/// Time stamp and OCSP augmentation are attempted when the signer asks for
/// them. Their failures are returned as warnings unless
/// `settings.strict_augmentation` is set.
pub fn cose_sign(
    signer: &dyn Signer,
    claim_bytes: &[u8],
    settings: &SignerSettings,
) -> Result<SignOutcome> {
    let certs = signer.certs()?;
    if certs.is_empty() {
        return Err(Error::CoseInvalidCert);
    }

    let aad: &[u8] = b"";
    let mut sign1: CoseSign1 = CoseSign1Builder::new()
        .protected(build_protected_header(signer, &certs))
        .try_create_detached_signature(claim_bytes, aad, |tbs| signer.sign(tbs))?
        .build();

    // a signer that does not match its certificate is a signing failure
    sign1.verify_detached_signature(claim_bytes, aad, |sig, tbs| {
        match verify_signature(signer.alg(), sig, tbs, &certs[0]) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::SigningError(
                "signature does not verify with the signing certificate".into(),
            )),
            Err(e) => Err(e),
        }
    })?;

    let mut warnings = Vec::new();
    let mut unprotected = HeaderBuilder::new();

    if let Some(url) = signer.time_authority_url() {
        match request_timestamp(&url, &sign1.signature) {
            Ok(token) => unprotected = unprotected.text_value(SIG_TST.into(), tst_container(token)),
            Err(e) => augmentation_failure(settings, "time stamp", e, &mut warnings)?,
        }
    }

    if signer.use_ocsp() {
        let response = match signer.ocsp_val() {
            Some(val) => check_ocsp_response(&val, &certs).map(|_| val),
            None => fetch_ocsp_response(&certs),
        };
        match response {
            Ok(val) => unprotected = unprotected.text_value(R_VALS.into(), ocsp_container(val)),
            Err(e) => augmentation_failure(settings, "OCSP stapling", e, &mut warnings)?,
        }
    }

    sign1.unprotected = unprotected.build();

    let cose = sign1
        .to_tagged_vec()
        .map_err(|e| Error::CoseError(e.to_string()))?;

    Ok(SignOutcome { cose, warnings })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use coset::{CborSerializable, Label};

    use super::*;
    use crate::{
        utils::test::{temp_signer, temp_signer_for},
        CallbackSigner, SignerConfig, SigningAlg,
    };

    fn es256_config(tsa_url: Option<String>) -> SignerConfig {
        let pem = include_bytes!("../tests/fixtures/certs/es256.pub");
        SignerConfig::from_pem_chain(SigningAlg::Es256, pem, tsa_url).unwrap()
    }

    fn tsa_signer(url: &str) -> CallbackSigner {
        signer_with(es256_config(Some(url.into())))
    }

    // the fixture leaf names no OCSP responder, so fetching always fails
    fn ocsp_signer(ocsp_val: Option<Vec<u8>>) -> CallbackSigner {
        signer_with(SignerConfig {
            use_ocsp: true,
            ocsp_val,
            ..es256_config(None)
        })
    }

    fn strict() -> SignerSettings {
        SignerSettings {
            strict_augmentation: true,
            ..Default::default()
        }
    }

    fn signer_with(config: SignerConfig) -> CallbackSigner {
        let local = temp_signer();
        CallbackSigner::new(
            move |data: &[u8], sig: &mut [u8]| match local.sign(data) {
                Ok(s) => {
                    sig[..s.len()].copy_from_slice(&s);
                    s.len() as isize
                }
                Err(_) => -1,
            },
            config,
        )
    }

    #[test]
    fn sign_all_algs() {
        let claim = b"claim bytes";
        for alg in [
            SigningAlg::Es256,
            SigningAlg::Es384,
            SigningAlg::Es512,
            SigningAlg::Ps256,
            SigningAlg::Ed25519,
        ] {
            let signer = temp_signer_for(alg);
            let outcome = cose_sign(signer.as_ref(), claim, &SignerSettings::default()).unwrap();
            assert!(outcome.warnings.is_empty());
            assert!(outcome.cose.len() <= signer.reserve_size());

            let sign1 = CoseSign1::from_tagged_slice(&outcome.cose).unwrap();
            assert!(sign1.payload.is_none());
            assert!(sign1
                .protected
                .header
                .rest
                .iter()
                .any(|(l, _)| *l == Label::Int(X5CHAIN)));
        }
    }

    #[test]
    fn unreachable_tsa_is_a_warning() {
        let signer = tsa_signer("http://127.0.0.1:9/tsa");
        let outcome = cose_sign(&signer, b"claim", &SignerSettings::default()).unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        let sign1 = CoseSign1::from_tagged_slice(&outcome.cose).unwrap();
        assert!(sign1.unprotected.rest.is_empty());
    }

    #[test]
    fn unreachable_tsa_is_fatal_when_strict() {
        let signer = tsa_signer("http://127.0.0.1:9/tsa");

        assert!(matches!(
            cose_sign(&signer, b"claim", &strict()),
            Err(Error::TimeStamp(_))
        ));
    }

    #[test]
    fn missing_ocsp_is_a_warning() {
        let outcome = cose_sign(&ocsp_signer(None), b"claim", &SignerSettings::default()).unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("OCSP stapling failed"));
        let sign1 = CoseSign1::from_tagged_slice(&outcome.cose).unwrap();
        assert!(sign1.unprotected.rest.is_empty());
    }

    #[test]
    fn missing_ocsp_is_fatal_when_strict() {
        assert!(matches!(
            cose_sign(&ocsp_signer(None), b"claim", &strict()),
            Err(Error::Ocsp(ref m)) if m.contains("no OCSP responder")
        ));
    }

    #[test]
    fn stapled_response_is_checked() {
        let try_later = ::openssl::ocsp::OcspResponse::create(
            ::openssl::ocsp::OcspResponseStatus::TRY_LATER,
            None,
        )
        .unwrap()
        .to_der()
        .unwrap();
        let signer = ocsp_signer(Some(try_later));

        let outcome = cose_sign(&signer, b"claim", &SignerSettings::default()).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("responder status"));

        assert!(matches!(
            cose_sign(&signer, b"claim", &strict()),
            Err(Error::Ocsp(ref m)) if m.contains("responder status")
        ));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        // the callback corrupts an otherwise good signature
        let config = es256_config(None);
        let other = temp_signer_for(SigningAlg::Es256);
        let signer = CallbackSigner::new(
            move |data: &[u8], sig: &mut [u8]| {
                let mut s = other.sign(data).unwrap();
                s[10] ^= 0xff;
                sig[..s.len()].copy_from_slice(&s);
                s.len() as isize
            },
            config,
        );

        assert!(matches!(
            cose_sign(&signer, b"claim", &SignerSettings::default()),
            Err(Error::SigningError(_))
        ));
    }

    #[test]
    fn tagged_round_trip() {
        let signer = temp_signer();
        let outcome = cose_sign(signer.as_ref(), b"claim", &SignerSettings::default()).unwrap();

        // untagged bytes are not what we produce
        let sign1 = CoseSign1::from_tagged_slice(&outcome.cose).unwrap();
        assert_ne!(sign1.clone().to_vec().unwrap(), outcome.cose);
        assert_eq!(sign1.to_tagged_vec().unwrap(), outcome.cose);
    }
}
