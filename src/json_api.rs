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

//! String in, string out entry points for language bindings.
//!
//! Every function here returns JSON: either its payload or an
//! `{"error": {...}}` object (see [`Response`]). The message of the last
//! failure is also available from [`last_error`](crate::last_error::last_error).

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    asset_io::{CAIRead, CAIReadWrite},
    builder::Builder,
    create_signer,
    error::{Error, Result},
    ingredient::Ingredient,
    jumbf_io,
    last_error::track,
    reader::Reader,
    response::{ErrorResponse, Response},
    Signer, SigningAlg, NAME, VERSION,
};

/// Local key material for signing, as passed across the JSON boundary.
#[derive(Clone, Debug, Deserialize)]
pub struct SignerInfo {
    /// Signing algorithm name such as "es256" or "ps256".
    pub alg: String,
    /// PEM certificate chain, signing certificate first.
    pub signcert: String,
    /// PEM private key.
    pub pkey: String,
    pub tsa_url: Option<String>,
}

impl SignerInfo {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonError)
    }

    fn alg(&self) -> Result<SigningAlg> {
        self.alg
            .parse()
            .map_err(|_| Error::UnsupportedSigningAlgorithm(self.alg.clone()))
    }

    /// Builds a local key signer from this key material.
    pub fn signer(&self) -> Result<Box<dyn Signer>> {
        create_signer::from_keys(
            self.signcert.as_bytes(),
            self.pkey.as_bytes(),
            self.alg()?,
            self.tsa_url.clone(),
        )
    }
}

#[derive(Debug, Serialize)]
struct SignResult {
    manifest_size: usize,
    warnings: Vec<String>,
}

/// `name/version` of this engine.
pub fn version() -> String {
    format!("{NAME}/{VERSION}")
}

/// Mime types the engine can read and write.
pub fn supported_mime_types() -> Vec<String> {
    jumbf_io::supported_types()
        .into_iter()
        .filter(|t| t.contains('/'))
        .collect()
}

/// Every supported format name, extensions and mime types, as a JSON array.
pub fn supported_formats_json() -> String {
    serde_json::to_string(&jumbf_io::supported_types()).unwrap_or_else(|_| "[]".to_string())
}

fn error_json(e: &Error) -> String {
    Response::from_error(ErrorResponse::from_error(e)).to_string()
}

/// Returns true if the stream carries a manifest store.
///
/// Unsupported formats and read failures return false and set the last
/// error.
pub fn has_manifest_stream(format: &str, stream: &mut dyn CAIRead) -> bool {
    track(jumbf_io::has_manifest(format, stream)).unwrap_or(false)
}

/// Reads and validates the manifest store of an asset.
///
/// Returns the validation report. An asset without a manifest yields a
/// report with state `NoManifest`; only unsupported formats and I/O
/// failures yield an error object.
pub fn verify_from_stream_json(format: &str, stream: &mut dyn CAIRead) -> String {
    match track(Reader::from_stream(format, stream)) {
        Ok(reader) => reader.json(),
        Err(e) => {
            debug!("verify failed: {e}");
            error_json(&e)
        }
    }
}

/// Describes an asset as an ingredient, including the validation of any
/// manifest it carries.
pub fn ingredient_from_stream_json(format: &str, stream: &mut dyn CAIRead) -> String {
    let result = Ingredient::from_stream(format, stream).and_then(|ingredient| {
        serde_json::to_string_pretty(&ingredient).map_err(Error::JsonError)
    });

    match track(result) {
        Ok(json) => json,
        Err(e) => error_json(&e),
    }
}

/// Signs a manifest definition into a copy of `source` written to `dest`.
///
/// `signer_info_json` is a [`SignerInfo`] object. On success returns
/// `{"ok": {"manifest_size": .., "warnings": [..]}}`. `dest` is untouched
/// on failure.
pub fn sign_stream_json(
    manifest_json: &str,
    signer_info_json: &str,
    format: &str,
    source: &mut dyn CAIRead,
    dest: &mut dyn CAIReadWrite,
) -> String {
    let signer = match track(SignerInfo::from_json(signer_info_json).and_then(|i| i.signer())) {
        Ok(signer) => signer,
        Err(e) => return error_json(&e),
    };
    sign_stream_with_signer_json(manifest_json, signer.as_ref(), format, source, dest)
}

/// As [`sign_stream_json`], with a caller supplied signer such as a
/// [`CallbackSigner`](crate::CallbackSigner).
pub fn sign_stream_with_signer_json(
    manifest_json: &str,
    signer: &dyn Signer,
    format: &str,
    source: &mut dyn CAIRead,
    dest: &mut dyn CAIReadWrite,
) -> String {
    let result = Builder::from_json(manifest_json).and_then(|mut builder| {
        let manifest = builder.sign(signer, format, source, dest)?;
        Ok(SignResult {
            manifest_size: manifest.len(),
            warnings: builder.warnings().to_vec(),
        })
    });

    Response::from_result(track(result)).to_string()
}
