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

use crate::{Error, Result, SigningAlg};

/// The `Signer` trait generates a cryptographic signature over a byte array.
///
/// This trait exists to allow the signature mechanism to be extended.
/// Implementations sign the exact bytes they are given; the engine never
/// hands a signer a pre-computed digest.
pub trait Signer: Send + Sync {
    /// Returns a new byte array which is a signature over the original.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Returns the algorithm of the Signer.
    fn alg(&self) -> SigningAlg;

    /// Returns the certificates as a Vec containing a Vec of DER bytes for
    /// each certificate, leaf first.
    fn certs(&self) -> Result<Vec<Vec<u8>>>;

    /// Returns the size in bytes of the largest possible expected signature
    /// plus everything the COSE structure carries around it. Signing will
    /// fail if the result of the `sign` function is larger than this value.
    fn reserve_size(&self) -> usize;

    /// URL for time authority to time stamp the signature.
    fn time_authority_url(&self) -> Option<String> {
        None
    }

    /// Request an OCSP response for the signing certificate and staple it
    /// to the signature.
    fn use_ocsp(&self) -> bool {
        false
    }

    /// A pre-fetched OCSP response to staple instead of fetching one.
    fn ocsp_val(&self) -> Option<Vec<u8>> {
        None
    }
}

impl std::fmt::Debug for dyn Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signer({})", self.alg())
    }
}

/// Static description of a signer whose signing operation lives elsewhere.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignerConfig {
    /// Signing algorithm.
    pub alg: SigningAlg,
    /// DER certificate chain, leaf first.
    pub certs: Vec<Vec<u8>>,
    /// Space to reserve for the signature itself.
    pub reserve_size: usize,
    /// Optional RFC 3161 time authority.
    pub time_authority_url: Option<String>,
    /// Staple an OCSP response for the signing certificate.
    #[serde(default)]
    pub use_ocsp: bool,
    /// DER OCSP response to staple instead of fetching one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocsp_val: Option<Vec<u8>>,
}

impl SignerConfig {
    /// Builds a config from a PEM certificate chain.
    pub fn from_pem_chain(
        alg: SigningAlg,
        certs_pem: &[u8],
        time_authority_url: Option<String>,
    ) -> Result<Self> {
        let certs: Vec<Vec<u8>> = pem::parse_many(certs_pem)
            .map_err(|_| Error::CoseInvalidCert)?
            .into_iter()
            .filter(|p| p.tag() == "CERTIFICATE")
            .map(|p| p.into_contents())
            .collect();

        if certs.is_empty() {
            return Err(Error::CoseInvalidCert);
        }

        Ok(Self {
            alg,
            certs,
            reserve_size: alg.max_signature_len(),
            time_authority_url,
            use_ocsp: false,
            ocsp_val: None,
        })
    }

    pub(crate) fn certs_size(&self) -> usize {
        self.certs.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn config_from_pem() {
        let pem = include_bytes!("../tests/fixtures/certs/es256.pub");
        let config = SignerConfig::from_pem_chain(SigningAlg::Es256, pem, None).unwrap();

        assert_eq!(config.certs.len(), 2);
        assert_eq!(config.reserve_size, 64);
        assert!(config.certs_size() > 0);
        assert!(!config.use_ocsp);
        assert!(config.ocsp_val.is_none());

        assert!(matches!(
            SignerConfig::from_pem_chain(SigningAlg::Es256, b"nothing here", None),
            Err(Error::CoseInvalidCert)
        ));
    }
}
