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

//! Temporary signing instances for testing purposes.
//!
//! Each function loads the fixture key pair for an algorithm from
//! `path` and returns the signer together with the path of its public
//! certificate chain.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use super::{ConfigurableSigner, EcSigner, EdSigner, RsaSigner};
use crate::SigningAlg;

fn key_paths(path: &Path, alg: SigningAlg) -> (PathBuf, PathBuf) {
    let name = alg.to_string();
    (
        path.join(format!("{name}.pub")),
        path.join(format!("{name}.pem")),
    )
}

fn load<S: ConfigurableSigner>(
    path: &Path,
    alg: SigningAlg,
    tsa_url: Option<String>,
) -> (S, PathBuf) {
    let (sign_cert_path, pem_key_path) = key_paths(path, alg);

    let signcert = std::fs::read(&sign_cert_path).expect("read signcert");
    let pkey = std::fs::read(pem_key_path).expect("read private key");

    let signer = S::from_signcert_and_pkey(&signcert, &pkey, alg, tsa_url)
        .expect("create signer from fixtures");

    (signer, sign_cert_path)
}

/// Create an [`EcSigner`] for `Es256`, `Es384` or `Es512`.
pub fn get_ec_signer<P: AsRef<Path>>(
    path: P,
    alg: SigningAlg,
    tsa_url: Option<String>,
) -> (EcSigner, PathBuf) {
    match alg {
        SigningAlg::Es256 | SigningAlg::Es384 | SigningAlg::Es512 => (),
        _ => panic!("Unknown EC signer alg {alg:#?}"),
    }
    load(path.as_ref(), alg, tsa_url)
}

/// Create an [`EdSigner`] for `Ed25519`.
pub fn get_ed_signer<P: AsRef<Path>>(
    path: P,
    alg: SigningAlg,
    tsa_url: Option<String>,
) -> (EdSigner, PathBuf) {
    if alg != SigningAlg::Ed25519 {
        panic!("Unknown ED signer alg {alg:#?}");
    }
    load(path.as_ref(), alg, tsa_url)
}

/// Create an [`RsaSigner`] for `Ps256`, `Ps384` or `Ps512`.
pub fn get_rsa_signer<P: AsRef<Path>>(
    path: P,
    alg: SigningAlg,
    tsa_url: Option<String>,
) -> (RsaSigner, PathBuf) {
    match alg {
        SigningAlg::Ps256 | SigningAlg::Ps384 | SigningAlg::Ps512 => (),
        _ => panic!("Unknown RSA signer alg {alg:#?}"),
    }
    load(path.as_ref(), alg, tsa_url)
}
