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

use thiserror::Error;

use crate::{assertion::AssertionDecodeError, jumbf::boxes::JumbfParseError};

/// `Error` enumerates errors returned by most C2PA engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // --- c2pa errors ---
    /// The asset format is not one this engine can read or write.
    #[error("type is unsupported")]
    UnsupportedType,

    /// No manifest store was found in the asset.
    #[error("no JUMBF data found")]
    JumbfNotFound,

    /// The asset container is truncated or internally inconsistent.
    #[error("invalid asset structure: {0}")]
    InvalidAsset(String),

    #[error(transparent)]
    JumbfParseError(#[from] JumbfParseError),

    #[error("required JUMBF box not found: {0}")]
    JumbfBoxNotFound(String),

    #[error("could not create JUMBF")]
    JumbfCreationError,

    #[error("claim could not be decoded: {0}")]
    ClaimDecoding(String),

    #[error("claim could not be converted to CBOR")]
    ClaimEncoding,

    #[error("claim is invalid: {0}")]
    InvalidClaim(String),

    #[error("claim missing: label = {label}")]
    ClaimMissing { label: String },

    #[error("assertion could not be converted to CBOR")]
    AssertionEncoding,

    #[error(transparent)]
    AssertionDecoding(#[from] AssertionDecodeError),

    #[error("assertion missing: label = {label}")]
    AssertionMissing { label: String },

    /// A manifest definition was missing a required field.
    #[error("required field missing: {0}")]
    MissingField(String),

    /// The manifest definition carries no assertions while settings require one.
    #[error("manifest must contain at least one assertion")]
    NoAssertions,

    /// A manifest label appears twice in one store with different content.
    #[error("duplicate manifest label: {0}")]
    DuplicateLabel(String),

    /// Adding an ingredient would make a manifest its own ancestor.
    #[error("ingredient relationship forms a cycle at {0}")]
    IngredientCycle(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("hash verification failed: {0}")]
    HashMismatch(String),

    // --- signing and validation ---
    #[error("COSE signature invalid")]
    CoseSignature,

    #[error("COSE signing certificate is invalid")]
    CoseInvalidCert,

    #[error("COSE certificate has been revoked")]
    CoseCertRevoked,

    #[error("COSE certificate is not trusted")]
    CoseCertUntrusted,

    #[error("COSE signature box too small to hold the signature")]
    CoseSigboxTooSmall,

    #[error("COSE error: {0}")]
    CoseError(String),

    #[error("signing algorithm is not supported: {0}")]
    UnsupportedSigningAlgorithm(String),

    #[error("the private key does not match the signing algorithm")]
    InvalidSigningKey,

    /// The external signing callback reported failure.
    #[error("signer callback failed with status {0}")]
    SignerCallback(isize),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("time stamp request failed: {0}")]
    TimeStamp(String),

    #[error("OCSP request failed: {0}")]
    Ocsp(String),

    // --- plumbing ---
    #[error("invalid settings: {0}")]
    BadSettings(String),

    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    CborError(#[from] serde_cbor::Error),

    #[error(transparent)]
    OpenSslError(#[from] openssl::error::ErrorStack),
}

/// Coarse classification of an [`Error`], used at API boundaries that
/// report errors as data rather than as Rust values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The asset format is not supported.
    UnsupportedFormat,
    /// The asset carries no manifest store.
    NotFound,
    /// The input is truncated or not structurally valid.
    Malformed,
    /// A signature or certificate did not verify.
    SignatureInvalid,
    /// A content hash did not match.
    ContentTampered,
    /// Signing failed.
    SignError,
    /// The underlying stream failed.
    Io,
    /// Settings or a manifest definition are incomplete or inconsistent.
    Config,
}

impl Error {
    /// Maps this error onto the engine's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedType => ErrorKind::UnsupportedFormat,
            Error::JumbfNotFound => ErrorKind::NotFound,
            Error::InvalidAsset(_)
            | Error::JumbfParseError(_)
            | Error::JumbfBoxNotFound(_)
            | Error::ClaimDecoding(_)
            | Error::InvalidClaim(_)
            | Error::ClaimMissing { .. }
            | Error::AssertionDecoding(_)
            | Error::AssertionMissing { .. }
            | Error::CborError(_)
            | Error::CoseError(_) => ErrorKind::Malformed,
            Error::MissingField(_)
            | Error::NoAssertions
            | Error::DuplicateLabel(_)
            | Error::IngredientCycle(_)
            | Error::ResourceNotFound(_)
            | Error::BadParam(_)
            | Error::BadSettings(_)
            | Error::JsonError(_)
            | Error::JumbfCreationError
            | Error::ClaimEncoding
            | Error::AssertionEncoding => ErrorKind::Config,
            Error::SignerCallback(_)
            | Error::SigningError(_)
            | Error::InvalidSigningKey
            | Error::UnsupportedSigningAlgorithm(_)
            | Error::CoseSigboxTooSmall
            | Error::TimeStamp(_)
            | Error::Ocsp(_)
            | Error::OpenSslError(_) => ErrorKind::SignError,
            Error::HashMismatch(_) => ErrorKind::ContentTampered,
            Error::CoseSignature
            | Error::CoseInvalidCert
            | Error::CoseCertRevoked
            | Error::CoseCertUntrusted => ErrorKind::SignatureInvalid,
            Error::IoError(_) | Error::StreamError(_) => ErrorKind::Io,
        }
    }
}

/// A specialized `Result` type for C2PA engine operations.
pub type Result<T> = std::result::Result<T, Error>;
