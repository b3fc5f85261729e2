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
    ec::EcKey,
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
};

use super::{load_cert_chain, local_reserve_size, ConfigurableSigner};
use crate::{Error, Result, Signer, SigningAlg};

/// Implements `Signer` trait using OpenSSL's implementation of
/// ECDSA encryption.
pub struct EcSigner {
    certs: Vec<Vec<u8>>,
    pkey: EcKey<Private>,
    alg: SigningAlg,
    tsa_url: Option<String>,
}

impl ConfigurableSigner for EcSigner {
    fn from_signcert_and_pkey(
        signcert: &[u8],
        pkey: &[u8],
        alg: SigningAlg,
        tsa_url: Option<String>,
    ) -> Result<Self> {
        let curve = match alg {
            SigningAlg::Es256 => Nid::X9_62_PRIME256V1,
            SigningAlg::Es384 => Nid::SECP384R1,
            SigningAlg::Es512 => Nid::SECP521R1,
            _ => return Err(Error::UnsupportedSigningAlgorithm(alg.to_string())),
        };

        let certs = load_cert_chain(signcert)?;

        let pkey = PKey::private_key_from_pem(pkey)
            .and_then(|k| k.ec_key())
            .map_err(|_| Error::InvalidSigningKey)?;
        if pkey.group().curve_name() != Some(curve) {
            return Err(Error::InvalidSigningKey);
        }

        Ok(EcSigner {
            certs,
            pkey,
            alg,
            tsa_url,
        })
    }
}

impl EcSigner {
    fn digest(&self) -> MessageDigest {
        match self.alg {
            SigningAlg::Es384 => MessageDigest::sha384(),
            SigningAlg::Es512 => MessageDigest::sha512(),
            _ => MessageDigest::sha256(),
        }
    }
}

impl Signer for EcSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = PKey::from_ec_key(self.pkey.clone())?;

        let mut signer = openssl::sign::Signer::new(self.digest(), &key)?;
        signer.update(data)?;
        let der_sig = signer.sign_to_vec()?;

        // COSE wants the raw r|s form, each half padded to the field size
        der_to_p1363(&der_sig, self.alg.max_signature_len())
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

pub(crate) fn der_to_p1363(der_sig: &[u8], sig_len: usize) -> Result<Vec<u8>> {
    let sig = EcdsaSig::from_der(der_sig)?;
    let half = (sig_len / 2) as i32;

    let mut raw = sig.r().to_vec_padded(half)?;
    raw.extend(sig.s().to_vec_padded(half)?);
    Ok(raw)
}
