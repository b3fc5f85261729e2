// Copyright 2023 Adobe. All rights reserved.
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

use std::{
    collections::HashSet,
    io::{Cursor, Read},
    str::FromStr,
};

use asn1_rs::Oid;
use openssl::{
    stack::Stack,
    x509::{store::X509StoreBuilder, X509StoreContext, X509},
};

use crate::{
    trust_handler::{
        default_ekus, is_allowed_cert, load_allowed_hashes, load_eku_configuration,
        load_trust_from_data, TrustHandlerConfig,
    },
    Result,
};

/// Trust handler backed by an OpenSSL certificate store.
#[derive(Debug, Default)]
pub struct OpenSSLTrustHandlerConfig {
    trust_anchors: Vec<Vec<u8>>,
    private_anchors: Vec<Vec<u8>>,
    allowed_cert_set: HashSet<String>,
    config_store: Vec<u8>,
}

impl OpenSSLTrustHandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrustHandlerConfig for OpenSSLTrustHandlerConfig {
    fn load_trust_anchors_from_data(&mut self, trust_data: &mut dyn Read) -> Result<()> {
        let mut buffer = Vec::new();
        trust_data.read_to_end(&mut buffer)?;

        self.trust_anchors = load_trust_from_data(&buffer)?;
        Ok(())
    }

    fn load_allowed_list(&mut self, allowed_list: &mut dyn Read) -> Result<()> {
        let mut buffer = Vec::new();
        allowed_list.read_to_end(&mut buffer)?;

        self.allowed_cert_set.extend(load_allowed_hashes(&buffer)?);
        Ok(())
    }

    fn append_private_trust_data(&mut self, private_anchors_data: &mut dyn Read) -> Result<()> {
        let mut buffer = Vec::new();
        private_anchors_data.read_to_end(&mut buffer)?;

        self.private_anchors.extend(load_trust_from_data(&buffer)?);
        Ok(())
    }

    fn clear(&mut self) {
        self.trust_anchors.clear();
        self.private_anchors.clear();
        self.allowed_cert_set.clear();
    }

    fn load_configuration(&mut self, config_data: &mut dyn Read) -> Result<()> {
        self.config_store.clear();
        config_data.read_to_end(&mut self.config_store)?;
        Ok(())
    }

    fn get_auxillary_ekus(&self) -> Vec<Oid> {
        let oids: Vec<Oid> = load_eku_configuration(&mut Cursor::new(&self.config_store))
            .unwrap_or_default()
            .iter()
            .filter_map(|s| Oid::from_str(s).ok())
            .collect();

        if oids.is_empty() {
            default_ekus()
        } else {
            oids
        }
    }

    fn get_anchors(&self) -> Vec<Vec<u8>> {
        self.trust_anchors
            .iter()
            .chain(self.private_anchors.iter())
            .cloned()
            .collect()
    }

    fn get_allowed_list(&self) -> &HashSet<String> {
        &self.allowed_cert_set
    }
}

/// Returns `true` if `cert_der` chains to one of the handler's anchors
/// through `chain_der`, or is explicitly allowed.
pub(crate) fn verify_trust(
    th: &dyn TrustHandlerConfig,
    chain_der: &[Vec<u8>],
    cert_der: &[u8],
) -> Result<bool> {
    if is_allowed_cert(th, cert_der) {
        return Ok(true);
    }

    let anchors = th.get_anchors();
    if anchors.is_empty() {
        return Ok(false);
    }

    let mut builder = X509StoreBuilder::new()?;
    for anchor in &anchors {
        builder.add_cert(X509::from_der(anchor)?)?;
    }
    let store = builder.build();

    let mut chain = Stack::new()?;
    for c in chain_der {
        chain.push(X509::from_der(c)?)?;
    }

    let cert = X509::from_der(cert_der)?;

    let mut ctx = X509StoreContext::new()?;
    Ok(ctx.init(&store, &cert, &chain, |c| c.verify_cert())?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{
        openssl::temp_signer,
        trust_handler::cert_hash,
        utils::test::fixture_path,
        Signer, SigningAlg,
    };

    fn all_chains() -> Vec<Vec<Vec<u8>>> {
        let cert_dir = fixture_path("certs");
        let signers: Vec<Box<dyn Signer>> = vec![
            Box::new(temp_signer::get_rsa_signer(&cert_dir, SigningAlg::Ps256, None).0),
            Box::new(temp_signer::get_rsa_signer(&cert_dir, SigningAlg::Ps384, None).0),
            Box::new(temp_signer::get_rsa_signer(&cert_dir, SigningAlg::Ps512, None).0),
            Box::new(temp_signer::get_ec_signer(&cert_dir, SigningAlg::Es256, None).0),
            Box::new(temp_signer::get_ec_signer(&cert_dir, SigningAlg::Es384, None).0),
            Box::new(temp_signer::get_ec_signer(&cert_dir, SigningAlg::Es512, None).0),
            Box::new(temp_signer::get_ed_signer(&cert_dir, SigningAlg::Ed25519, None).0),
        ];
        signers.iter().map(|s| s.certs().unwrap()).collect()
    }

    fn handler(anchors: &[u8]) -> OpenSSLTrustHandlerConfig {
        let mut th = OpenSSLTrustHandlerConfig::new();
        th.load_trust_anchors_from_data(&mut Cursor::new(anchors))
            .unwrap();
        th
    }

    #[test]
    fn chains_to_root() {
        let th = handler(include_bytes!("../../tests/fixtures/certs/root.pem"));

        for certs in all_chains() {
            assert!(verify_trust(&th, &certs[1..], &certs[0]).unwrap());
        }
    }

    #[test]
    fn broken_chain() {
        let th = handler(include_bytes!("../../tests/fixtures/certs/root.pem"));

        // without the intermediate the leaf cannot reach the root
        for certs in all_chains() {
            assert!(!verify_trust(&th, &certs[2..], &certs[0]).unwrap());
        }
    }

    #[test]
    fn wrong_root() {
        let th = handler(include_bytes!("../../tests/fixtures/certs/other_root.pem"));

        for certs in all_chains() {
            assert!(!verify_trust(&th, &certs[1..], &certs[0]).unwrap());
        }
    }

    #[test]
    fn allowed_without_anchors() {
        let certs = &all_chains()[3];

        let mut th = OpenSSLTrustHandlerConfig::new();
        assert!(!verify_trust(&th, &certs[1..], &certs[0]).unwrap());

        th.load_allowed_list(&mut Cursor::new(cert_hash(&certs[0]).into_bytes()))
            .unwrap();
        assert!(verify_trust(&th, &[], &certs[0]).unwrap());

        th.clear();
        assert!(!th.has_trust_data());
    }
}
