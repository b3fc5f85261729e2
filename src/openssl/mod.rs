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

//! OpenSSL backed signers, signature validation and trust evaluation.

mod ec_signer;
pub use ec_signer::EcSigner;

mod ed_signer;
pub use ed_signer::EdSigner;

mod rsa_signer;
pub use rsa_signer::RsaSigner;

mod validators;
pub(crate) use validators::verify_signature;

mod openssl_trust_handler;
pub(crate) use openssl_trust_handler::verify_trust;
pub use openssl_trust_handler::OpenSSLTrustHandlerConfig;

#[cfg(test)]
pub(crate) mod temp_signer;

use openssl::x509::X509;

use crate::{Error, Result, SigningAlg};

/// Constructs a signer from a PEM certificate chain and a PEM private key.
pub(crate) trait ConfigurableSigner: Sized {
    fn from_signcert_and_pkey(
        signcert: &[u8],
        pkey: &[u8],
        alg: SigningAlg,
        tsa_url: Option<String>,
    ) -> Result<Self>;
}

/// Space reserved in the signature box for a time stamp token.
pub(crate) const TIMESTAMP_RESERVE: usize = 10000;

/// Fixed COSE overhead on top of the raw signature and certificates.
pub(crate) const COSE_OVERHEAD: usize = 1024;

/// Parses a PEM chain into DER certificates, leaf first.
pub(crate) fn load_cert_chain(signcert: &[u8]) -> Result<Vec<Vec<u8>>> {
    let chain = X509::stack_from_pem(signcert).map_err(|_| Error::CoseInvalidCert)?;
    if chain.is_empty() {
        return Err(Error::CoseInvalidCert);
    }

    chain
        .iter()
        .map(|c| c.to_der().map_err(Error::from))
        .collect()
}

/// Reserve size for a local signer with the given chain.
pub(crate) fn local_reserve_size(
    alg: SigningAlg,
    certs: &[Vec<u8>],
    tsa_url: &Option<String>,
) -> usize {
    let certs_size: usize = certs.iter().map(Vec::len).sum();
    let timestamp_size = if tsa_url.is_some() {
        TIMESTAMP_RESERVE
    } else {
        0
    };
    COSE_OVERHEAD + alg.max_signature_len() + certs_size + timestamp_size
}
