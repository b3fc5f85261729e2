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

//! The `create_signer` module provides a way to obtain a [`Signer`]
//! instance for each signing format supported by this crate.

use crate::{
    openssl::{ConfigurableSigner, EcSigner, EdSigner, RsaSigner},
    Result, Signer, SigningAlg,
};

/// Creates a [`Signer`] instance using signing certificate and private key
/// as byte slices.
///
/// The signing certificate must be a PEM chain with the signing certificate
/// first. The private key must be PEM (PKCS#8 or traditional) and must
/// match `alg`.
pub fn from_keys(
    signcert: &[u8],
    pkey: &[u8],
    alg: SigningAlg,
    tsa_url: Option<String>,
) -> Result<Box<dyn Signer>> {
    Ok(match alg {
        SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512 => Box::new(
            RsaSigner::from_signcert_and_pkey(signcert, pkey, alg, tsa_url)?,
        ),
        SigningAlg::Es256 | SigningAlg::Es384 | SigningAlg::Es512 => Box::new(
            EcSigner::from_signcert_and_pkey(signcert, pkey, alg, tsa_url)?,
        ),
        SigningAlg::Ed25519 => Box::new(EdSigner::from_signcert_and_pkey(
            signcert, pkey, alg, tsa_url,
        )?),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::Error;

    #[test]
    fn signer_from_keys() {
        let signcert = include_bytes!("../tests/fixtures/certs/ed25519.pub");
        let pkey = include_bytes!("../tests/fixtures/certs/ed25519.pem");

        let signer = from_keys(signcert, pkey, SigningAlg::Ed25519, None).unwrap();
        assert_eq!(signer.alg(), SigningAlg::Ed25519);
        assert_eq!(signer.certs().unwrap().len(), 2);
        assert!(signer.time_authority_url().is_none());
    }

    #[test]
    fn mismatched_alg() {
        let signcert = include_bytes!("../tests/fixtures/certs/es256.pub");
        let pkey = include_bytes!("../tests/fixtures/certs/es256.pem");

        assert!(matches!(
            from_keys(signcert, pkey, SigningAlg::Ed25519, None),
            Err(Error::InvalidSigningKey)
        ));
        assert!(matches!(
            from_keys(b"garbage", pkey, SigningAlg::Es256, None),
            Err(Error::CoseInvalidCert)
        ));
    }
}
