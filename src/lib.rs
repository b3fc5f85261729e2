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

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]

//! Reads, validates, creates and embeds C2PA manifest stores.
//!
//! A manifest store is a JUMBF box holding a chain of signed manifests.
//! Each manifest carries a claim, the assertions it references and a COSE
//! signature over the claim. Ingredients link a manifest to the manifests
//! of the assets it was made from.
//!
//! [`Reader`] loads and validates the store of an asset. [`Builder`] turns
//! a JSON manifest definition into a signed manifest and embeds it. Both
//! work on any `Read + Seek` stream; [`StreamAdapter`] bridges hosts that
//! only offer callbacks.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Cursor;
//!
//! use c2pa_engine::{create_signer, Builder, Reader, Result, SigningAlg};
//!
//! fn sign_and_read(jpeg: &[u8], cert: &[u8], key: &[u8]) -> Result<()> {
//!     let signer = create_signer::from_keys(cert, key, SigningAlg::Es256, None)?;
//!
//!     let mut builder = Builder::from_json(
//!         r#"{"claim_generator": "example/1.0", "title": "image.jpg"}"#,
//!     )?;
//!     let mut signed = Cursor::new(Vec::new());
//!     builder.sign(signer.as_ref(), "image/jpeg", &mut Cursor::new(jpeg), &mut signed)?;
//!
//!     signed.set_position(0);
//!     let reader = Reader::from_stream("image/jpeg", &mut signed)?;
//!     println!("{reader}");
//!     Ok(())
//! }
//! ```

/// The internal name of this engine
pub const NAME: &str = "c2pa-engine";

/// The version of this engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public modules
pub mod assertions;
pub mod asset_io;
pub mod create_signer;
pub mod json_api;
pub mod jumbf_io;
pub mod last_error;
pub mod openssl;
pub mod response;
pub mod settings;
pub mod stream;
pub mod trust_handler;
pub mod validation_status;

// Public exports
pub use builder::{Builder, ManifestDefinition};
pub use callback_signer::{CallbackSigner, SignerCallback};
pub use claim_generator_info::ClaimGeneratorInfo;
pub use cose_validator::SignatureInfo;
pub use error::{Error, ErrorKind, Result};
pub use hash_utils::{hash_stream_by_alg, HashRange};
pub use ingredient::Ingredient;
pub use json_api::{supported_mime_types, version};
pub use manifest::Manifest;
pub use manifest_assertion::{ManifestAssertion, ManifestAssertionKind};
pub use reader::Reader;
pub use resource_store::ResourceRef;
pub use settings::Settings;
pub use signer::{Signer, SignerConfig};
pub use signing_alg::{SigningAlg, UnknownAlgorithmError};
pub use stream::{CallbackStream, SeekMode, Stream, StreamAdapter, StreamError};
pub use validation_status::ValidationStatus;
pub use validator::ValidationState;

// Internal modules
pub(crate) mod assertion;
pub(crate) mod asset_handlers;
pub(crate) mod builder;
pub(crate) mod callback_signer;
pub(crate) mod claim;
pub(crate) mod claim_generator_info;
pub(crate) mod cose_sign;
pub(crate) mod cose_validator;
pub(crate) mod error;
pub(crate) mod hashed_uri;
pub(crate) mod ingredient;
pub(crate) mod jumbf;
pub(crate) mod manifest;
pub(crate) mod manifest_assertion;
pub(crate) mod ocsp_utils;
pub(crate) mod reader;
pub(crate) mod resource_store;
pub(crate) mod signer;
pub(crate) mod signing_alg;
pub(crate) mod store;
pub(crate) mod time_stamp;
pub(crate) mod utils;
pub(crate) use utils::hash_utils;
pub(crate) mod validator;
