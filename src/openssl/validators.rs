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

use openssl::{
    bn::BigNum,
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    pkey::{PKey, Public},
    rsa::Padding,
    sign::{RsaPssSaltlen, Verifier},
    x509::X509,
};

use super::rsa_signer::pss_digest;
use crate::{Result, SigningAlg};

/// Verifies `sig` over `data` with the public key of the DER certificate
/// `cert_der`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
pub(crate) fn verify_signature(
    alg: SigningAlg,
    sig: &[u8],
    data: &[u8],
    cert_der: &[u8],
) -> Result<bool> {
    let cert = X509::from_der(cert_der)?;
    let pkey = cert.public_key()?;

    match alg {
        SigningAlg::Es256 | SigningAlg::Es384 | SigningAlg::Es512 => {
            verify_ec(alg, sig, data, &pkey)
        }
        SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512 => {
            let digest = pss_digest(alg);

            let mut verifier = Verifier::new(digest, &pkey)?;
            verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
            verifier.set_rsa_mgf1_md(digest)?;
            verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
            verifier.update(data)?;
            Ok(verifier.verify(sig).unwrap_or(false))
        }
        SigningAlg::Ed25519 => {
            let mut verifier = Verifier::new_without_digest(&pkey)?;
            Ok(verifier.verify_oneshot(sig, data).unwrap_or(false))
        }
    }
}

fn verify_ec(alg: SigningAlg, sig: &[u8], data: &[u8], pkey: &PKey<Public>) -> Result<bool> {
    if sig.len() != alg.max_signature_len() {
        return Ok(false);
    }

    let digest = match alg {
        SigningAlg::Es384 => MessageDigest::sha384(),
        SigningAlg::Es512 => MessageDigest::sha512(),
        _ => MessageDigest::sha256(),
    };

    let (r, s) = sig.split_at(sig.len() / 2);
    let der_sig =
        EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?
            .to_der()?;

    let mut verifier = Verifier::new(digest, pkey)?;
    verifier.update(data)?;
    Ok(verifier.verify(&der_sig).unwrap_or(false))
}
