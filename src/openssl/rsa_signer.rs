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
    hash::MessageDigest,
    pkey::{Id, PKey, Private},
    rsa::Padding,
    sign::RsaPssSaltlen,
};

use super::{load_cert_chain, local_reserve_size, ConfigurableSigner};
use crate::{Error, Result, Signer, SigningAlg};

/// Implements `Signer` trait using OpenSSL's implementation of
/// RSASSA-PSS.
pub struct RsaSigner {
    certs: Vec<Vec<u8>>,
    pkey: PKey<Private>,
    alg: SigningAlg,
    tsa_url: Option<String>,
}

impl ConfigurableSigner for RsaSigner {
    fn from_signcert_and_pkey(
        signcert: &[u8],
        pkey: &[u8],
        alg: SigningAlg,
        tsa_url: Option<String>,
    ) -> Result<Self> {
        if !matches!(
            alg,
            SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512
        ) {
            return Err(Error::UnsupportedSigningAlgorithm(alg.to_string()));
        }

        let certs = load_cert_chain(signcert)?;

        let pkey = PKey::private_key_from_pem(pkey).map_err(|_| Error::InvalidSigningKey)?;
        if pkey.id() != Id::RSA && pkey.id() != Id::RSA_PSS {
            return Err(Error::InvalidSigningKey);
        }

        Ok(RsaSigner {
            certs,
            pkey,
            alg,
            tsa_url,
        })
    }
}

pub(crate) fn pss_digest(alg: SigningAlg) -> MessageDigest {
    match alg {
        SigningAlg::Ps384 => MessageDigest::sha384(),
        SigningAlg::Ps512 => MessageDigest::sha512(),
        _ => MessageDigest::sha256(),
    }
}

impl Signer for RsaSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = pss_digest(self.alg);

        let mut signer = openssl::sign::Signer::new(digest, &self.pkey)?;
        signer.set_rsa_padding(Padding::PKCS1_PSS)?;
        signer.set_rsa_mgf1_md(digest)?;
        signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
        signer.update(data)?;

        Ok(signer.sign_to_vec()?)
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
