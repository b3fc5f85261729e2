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

use std::io::Read;

use log::debug;
use openssl::{
    hash::MessageDigest,
    ocsp::{OcspCertId, OcspCertStatus, OcspRequest, OcspResponse, OcspResponseStatus},
    x509::X509,
};

use crate::error::{Error, Result};

const OCSP_CONTENT_TYPE: &str = "application/ocsp-request";
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

/// Revocation status of a signing certificate from an OCSP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct OcspData {
    pub revoked_at: Option<String>,
    pub next_update: String,
}

impl OcspData {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

fn leaf_and_issuer(certs: &[Vec<u8>]) -> Result<(X509, X509)> {
    match certs {
        [leaf, issuer, ..] => Ok((X509::from_der(leaf)?, X509::from_der(issuer)?)),
        _ => Err(Error::Ocsp("certificate chain has no issuer".into())),
    }
}

fn cert_id(leaf: &X509, issuer: &X509) -> Result<OcspCertId> {
    Ok(OcspCertId::from_cert(MessageDigest::sha1(), leaf, issuer)?)
}

/// Fetches an OCSP response for the first certificate of `certs` from the
/// responder named in its authority information access extension.
pub(crate) fn fetch_ocsp_response(certs: &[Vec<u8>]) -> Result<Vec<u8>> {
    let (leaf, issuer) = leaf_and_issuer(certs)?;

    let responders = leaf
        .ocsp_responders()
        .map_err(|_| Error::Ocsp("certificate names no OCSP responder".into()))?;
    let url = responders
        .iter()
        .next()
        .map(|r| r.to_string())
        .ok_or_else(|| Error::Ocsp("certificate names no OCSP responder".into()))?;

    let mut request = OcspRequest::new()?;
    request.add_id(cert_id(&leaf, &issuer)?)?;
    let body = request.to_der()?;

    debug!("requesting OCSP status from {url}");
    let response = ureq::post(&url)
        .set("Content-Type", OCSP_CONTENT_TYPE)
        .send_bytes(&body)
        .map_err(|e| Error::Ocsp(e.to_string()))?;

    let mut resp_bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_SIZE)
        .read_to_end(&mut resp_bytes)
        .map_err(|e| Error::Ocsp(e.to_string()))?;

    // only keep responses we can use
    check_ocsp_response(&resp_bytes, certs)?;
    Ok(resp_bytes)
}

/// Reads the status of the signing certificate from a DER OCSP response.
pub(crate) fn check_ocsp_response(ocsp_der: &[u8], certs: &[Vec<u8>]) -> Result<OcspData> {
    let (leaf, issuer) = leaf_and_issuer(certs)?;

    let response =
        OcspResponse::from_der(ocsp_der).map_err(|e| Error::Ocsp(format!("bad response: {e}")))?;
    if response.status() != OcspResponseStatus::SUCCESSFUL {
        return Err(Error::Ocsp(format!(
            "responder status {:?}",
            response.status().as_raw()
        )));
    }

    let basic = response.basic()?;
    let id = cert_id(&leaf, &issuer)?;
    let status = basic
        .find_status(&id)
        .ok_or_else(|| Error::Ocsp("response does not cover the certificate".into()))?;

    let revoked_at = if status.status == OcspCertStatus::REVOKED {
        Some(
            status
                .revocation_time
                .map(|t| t.to_string())
                .unwrap_or_default(),
        )
    } else {
        None
    };

    Ok(OcspData {
        revoked_at,
        next_update: status.next_update.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::openssl::load_cert_chain;

    fn chain() -> Vec<Vec<u8>> {
        load_cert_chain(include_bytes!("../tests/fixtures/certs/es256.pub")).unwrap()
    }

    #[test]
    fn no_responder() {
        assert!(matches!(
            fetch_ocsp_response(&chain()),
            Err(Error::Ocsp(_))
        ));
    }

    #[test]
    fn needs_issuer() {
        let leaf_only = vec![chain().remove(0)];
        assert!(matches!(
            check_ocsp_response(&[0x30, 0x00], &leaf_only),
            Err(Error::Ocsp(_))
        ));
    }

    #[test]
    fn garbage_response() {
        assert!(matches!(
            check_ocsp_response(b"not ocsp", &chain()),
            Err(Error::Ocsp(_))
        ));
    }
}
