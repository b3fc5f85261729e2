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

use openssl::pkey::{Id, PKey, Private};

use super::{load_cert_chain, local_reserve_size, ConfigurableSigner};
use crate::{Error, Result, Signer, SigningAlg};

/// Implements `Signer` trait using OpenSSL's implementation of
/// Edwards Curve encryption.
pub struct EdSigner {
    certs: Vec<Vec<u8>>,
    pkey: PKey<Private>,
    alg: SigningAlg,
    tsa_url: Option<String>,
}

impl ConfigurableSigner for EdSigner {
    fn from_signcert_and_pkey(
        signcert: &[u8],
        pkey: &[u8],
        alg: SigningAlg,
        tsa_url: Option<String>,
    ) -> Result<Self> {
        if alg != SigningAlg::Ed25519 {
            return Err(Error::UnsupportedSigningAlgorithm(alg.to_string()));
        }

        let certs = load_cert_chain(signcert)?;

        let pkey = PKey::private_key_from_pem(pkey).map_err(|_| Error::InvalidSigningKey)?;
        if pkey.id() != Id::ED25519 {
            return Err(Error::InvalidSigningKey);
        }

        Ok(EdSigner {
            certs,
            pkey,
            alg,
            tsa_url,
        })
    }
}

impl Signer for EdSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut signer = openssl::sign::Signer::new_without_digest(&self.pkey)?;
        Ok(signer.sign_oneshot_to_vec(data)?)
    }

    fn alg(&self) -> SigningAlg {
        self.alg
    }

    fn certs(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.certs.clone())
    }

    fn time_authority_url(&self) -> Option<String> {
        self.tsa_url.clone()
    }

    fn reserve_size(&self) -> usize {
        local_reserve_size(self.alg, &self.certs, &self.tsa_url)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{openssl::temp_signer, utils::test::fixture_path};

    #[test]
    fn ed25519_signer() {
        let (signer, _) =
            temp_signer::get_ed_signer(fixture_path("certs"), SigningAlg::Ed25519, None);

        let signature = signer.sign(b"some sample content to sign").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.len() <= signer.reserve_size());
    }

    #[test]
    fn rejects_other_algs() {
        let signcert = include_bytes!("../../tests/fixtures/certs/ed25519.pub");
        let pkey = include_bytes!("../../tests/fixtures/certs/ed25519.pem");

        assert!(matches!(
            EdSigner::from_signcert_and_pkey(signcert, pkey, SigningAlg::Es256, None),
            Err(Error::UnsupportedSigningAlgorithm(_))
        ));
    }
}
