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
    io::{read_to_string, Cursor, Read},
    panic::{RefUnwindSafe, UnwindSafe},
    str::FromStr,
};

use asn1_rs::{oid, Oid};
use base64::{engine::general_purpose, Engine as _};

use crate::{
    openssl::OpenSSLTrustHandlerConfig, settings::Trust, utils::hash_utils::hash_sha256, Error,
    Result,
};

pub(crate) static EMAIL_PROTECTION_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .3 .4);
pub(crate) static TIMESTAMPING_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .3 .8);
pub(crate) static OCSP_SIGNING_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .3 .9);
pub(crate) static DOCUMENT_SIGNING_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .3 .36);

/// An implementation of `TrustHandlerConfig` provides a trust list (known
/// certificate authorities), a list of explicitly allowed end-entity
/// certificates and the allowed EKUs for signing certificates.
pub trait TrustHandlerConfig: RefUnwindSafe + UnwindSafe + Sync + Send {
    /// Load trust anchors from a UTF-8 PEM source.
    ///
    /// Text outside of `BEGIN CERTIFICATE` / `END CERTIFICATE` pairs is
    /// ignored. Returns [`Error::CoseInvalidCert`] if any certificate can
    /// not be parsed.
    fn load_trust_anchors_from_data(&mut self, trust_data: &mut dyn Read) -> Result<()>;

    /// Load explicitly trusted end-entity certificates.
    ///
    /// The source may hold PEM certificates, base64 SHA-256 hashes of DER
    /// certificates (one per line), or both.
    fn load_allowed_list(&mut self, allowed_list: &mut dyn Read) -> Result<()>;

    /// Add anchors on top of the ones already loaded.
    fn append_private_trust_data(&mut self, private_anchors_data: &mut dyn Read) -> Result<()>;

    /// Clear all anchors and allowed certificates.
    fn clear(&mut self);

    /// Load the EKU configuration, one OID per line.
    fn load_configuration(&mut self, config_data: &mut dyn Read) -> Result<()>;

    /// Extra EKU OIDs accepted for signing certificates.
    fn get_auxillary_ekus(&self) -> Vec<Oid>;

    /// DER encoded trust anchors.
    fn get_anchors(&self) -> Vec<Vec<u8>>;

    /// Base64 SHA-256 hashes of allowed certificates.
    fn get_allowed_list(&self) -> &HashSet<String>;

    /// Returns `true` when there is anything to evaluate trust against.
    fn has_trust_data(&self) -> bool {
        !self.get_anchors().is_empty() || !self.get_allowed_list().is_empty()
    }
}

impl std::fmt::Debug for dyn TrustHandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrustHandler({} anchors, {} allowed)",
            self.get_anchors().len(),
            self.get_allowed_list().len()
        )
    }
}

pub(crate) fn has_allowed_oid<'a>(
    eku: &x509_parser::extensions::ExtendedKeyUsage,
    allowed_ekus: &'a [Oid],
) -> Option<&'a Oid<'a>> {
    if eku.email_protection {
        return Some(&EMAIL_PROTECTION_OID);
    }

    if eku.time_stamping {
        return Some(&TIMESTAMPING_OID);
    }

    if eku.ocsp_signing {
        return Some(&OCSP_SIGNING_OID);
    }

    eku.other
        .iter()
        .find_map(|v| allowed_ekus.iter().find(|oid| *oid == v))
}

/// The EKUs accepted when no configuration is loaded.
pub(crate) fn default_ekus() -> Vec<Oid<'static>> {
    vec![
        EMAIL_PROTECTION_OID.to_owned(),
        TIMESTAMPING_OID.to_owned(),
        OCSP_SIGNING_OID.to_owned(),
        DOCUMENT_SIGNING_OID.to_owned(),
    ]
}

/// Load validation EKUs from an input source.
///
/// The input source should contain lines of text with one OID per line.
/// Lines that do not contain valid OIDs are ignored.
pub(crate) fn load_eku_configuration(
    config_data: &mut dyn Read,
) -> std::result::Result<Vec<String>, std::io::Error> {
    Ok(read_to_string(config_data)?
        .lines()
        .map(str::trim)
        .filter(|line| Oid::from_str(line).is_ok())
        .map(|line| line.to_owned())
        .collect())
}

/// Load trust anchors from a byte slice of PEM text.
///
/// Returns [`Error::CoseInvalidCert`] if any certificate can not be parsed.
pub(crate) fn load_trust_from_data(trust_data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut certs = Vec::new();

    for pem_result in x509_parser::pem::Pem::iter_from_buffer(trust_data) {
        let pem = pem_result.map_err(|_e| Error::CoseInvalidCert)?;
        certs.push(pem.contents);
    }
    Ok(certs)
}

/// Parse an allowed list into the set of certificate hashes it names.
pub(crate) fn load_allowed_hashes(data: &[u8]) -> Result<HashSet<String>> {
    let mut hashes: HashSet<String> = load_trust_from_data(data)?
        .iter()
        .map(|der| cert_hash(der))
        .collect();

    // bare hash lines live outside of PEM blocks
    let text = String::from_utf8_lossy(data);
    let mut in_pem = false;
    for line in text.lines().map(str::trim) {
        if line.starts_with("-----BEGIN") {
            in_pem = true;
        } else if line.starts_with("-----END") {
            in_pem = false;
        } else if !in_pem && !line.is_empty() && !line.starts_with('#') {
            if let Ok(raw) = general_purpose::STANDARD.decode(line) {
                if raw.len() == 32 {
                    hashes.insert(line.to_owned());
                }
            }
        }
    }
    Ok(hashes)
}

/// Base64 SHA-256 of a DER certificate, as stored in allowed lists.
pub(crate) fn cert_hash(cert_der: &[u8]) -> String {
    general_purpose::STANDARD.encode(hash_sha256(cert_der))
}

/// Returns `true` if the certificate is explicitly allowed.
pub(crate) fn is_allowed_cert(th: &dyn TrustHandlerConfig, cert_der: &[u8]) -> bool {
    th.get_allowed_list().contains(&cert_hash(cert_der))
}

/// Build a trust handler from [`Trust`] settings.
pub(crate) fn trust_handler_from_settings(trust: &Trust) -> Result<OpenSSLTrustHandlerConfig> {
    let mut th = OpenSSLTrustHandlerConfig::default();

    if let Some(anchors) = &trust.trust_anchors {
        th.load_trust_anchors_from_data(&mut Cursor::new(anchors.as_bytes()))?;
    }
    if let Some(private) = &trust.private_anchors {
        th.append_private_trust_data(&mut Cursor::new(private.as_bytes()))?;
    }
    if let Some(allowed) = &trust.allowed_list {
        th.load_allowed_list(&mut Cursor::new(allowed.as_bytes()))?;
    }
    if let Some(config) = &trust.trust_config {
        th.load_configuration(&mut Cursor::new(config.as_bytes()))?;
    }

    Ok(th)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::utils::test::temp_signer;

    #[test]
    fn eku_configuration() {
        let oids = include_bytes!("../tests/fixtures/store.cfg");
        let ekus = load_eku_configuration(&mut Cursor::new(oids)).unwrap();

        assert_eq!(
            ekus,
            vec![
                "1.3.6.1.5.5.7.3.4",
                "1.3.6.1.5.5.7.3.36",
                "1.3.6.1.5.5.7.3.8",
                "1.3.6.1.5.5.7.3.9",
                "1.3.6.1.4.1.311.76.59.1.9",
            ]
        );

        let ekus = load_eku_configuration(&mut Cursor::new(b"not an oid\n\n1.2.3")).unwrap();
        assert_eq!(ekus, vec!["1.2.3"]);
    }

    #[test]
    fn allowed_list_mixes_pem_and_hashes() {
        let leaf = temp_signer().certs().unwrap().remove(0);
        let extra = general_purpose::STANDARD.encode([7u8; 32]);

        let pem = pem::encode(&pem::Pem::new("CERTIFICATE", leaf.clone()));
        let list = format!("# allowed\n{extra}\n{pem}\nnot base64!\n");

        let hashes = load_allowed_hashes(list.as_bytes()).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains(&extra));
        assert!(hashes.contains(&cert_hash(&leaf)));
    }

    #[test]
    fn handler_from_settings() {
        let trust = Trust {
            trust_anchors: Some(include_str!("../tests/fixtures/certs/root.pem").to_string()),
            private_anchors: Some(
                include_str!("../tests/fixtures/certs/other_root.pem").to_string(),
            ),
            trust_config: Some("1.3.6.1.4.1.311.76.59.1.9\n".to_string()),
            ..Default::default()
        };

        let th = trust_handler_from_settings(&trust).unwrap();
        assert_eq!(th.get_anchors().len(), 2);
        assert!(th.has_trust_data());
        assert_eq!(th.get_auxillary_ekus().len(), 1);

        let empty = trust_handler_from_settings(&Trust::default()).unwrap();
        assert!(!empty.has_trust_data());
        assert_eq!(empty.get_auxillary_ekus(), default_ekus());
    }

    #[test]
    fn bad_anchor_data() {
        let data = b"-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            load_trust_from_data(data),
            Err(Error::CoseInvalidCert)
        ));
    }
}
