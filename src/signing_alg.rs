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

use std::{fmt, str::FromStr};

use coset::iana;
use serde::{Deserialize, Serialize};

/// Describes the digital signature algorithms allowed by the C2PA spec.
///
/// Per <https://c2pa.org/specifications/specifications/1.0/specs/C2PA_Specification.html#_digital_signatures>:
///
/// > All digital signatures that are stored in a C2PA Manifest shall
/// > be generated using one of the digital signature algorithms and
/// > key types listed as described in this section.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlg {
    /// ECDSA with SHA-256
    Es256,
    /// ECDSA with SHA-384
    Es384,
    /// ECDSA with SHA-512
    Es512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    Ps256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    Ps384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    Ps512,
    /// Edwards-Curve DSA (Ed25519 instance only)
    Ed25519,
}

impl FromStr for SigningAlg {
    type Err = UnknownAlgorithmError;

    fn from_str(alg: &str) -> Result<Self, Self::Err> {
        match alg.to_lowercase().as_str() {
            "es256" => Ok(Self::Es256),
            "es384" => Ok(Self::Es384),
            "es512" => Ok(Self::Es512),
            "ps256" => Ok(Self::Ps256),
            "ps384" => Ok(Self::Ps384),
            "ps512" => Ok(Self::Ps512),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(UnknownAlgorithmError(alg.to_string())),
        }
    }
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Es256 => "es256",
                Self::Es384 => "es384",
                Self::Es512 => "es512",
                Self::Ps256 => "ps256",
                Self::Ps384 => "ps384",
                Self::Ps512 => "ps512",
                Self::Ed25519 => "ed25519",
            }
        )
    }
}

impl SigningAlg {
    /// The COSE algorithm identifier.
    pub(crate) fn cose_alg(&self) -> iana::Algorithm {
        match self {
            Self::Es256 => iana::Algorithm::ES256,
            Self::Es384 => iana::Algorithm::ES384,
            Self::Es512 => iana::Algorithm::ES512,
            Self::Ps256 => iana::Algorithm::PS256,
            Self::Ps384 => iana::Algorithm::PS384,
            Self::Ps512 => iana::Algorithm::PS512,
            Self::Ed25519 => iana::Algorithm::EdDSA,
        }
    }

    pub(crate) fn from_cose_alg(alg: iana::Algorithm) -> Option<Self> {
        match alg {
            iana::Algorithm::ES256 => Some(Self::Es256),
            iana::Algorithm::ES384 => Some(Self::Es384),
            iana::Algorithm::ES512 => Some(Self::Es512),
            iana::Algorithm::PS256 => Some(Self::Ps256),
            iana::Algorithm::PS384 => Some(Self::Ps384),
            iana::Algorithm::PS512 => Some(Self::Ps512),
            iana::Algorithm::EdDSA => Some(Self::Ed25519),
            _ => None,
        }
    }

    /// Largest raw signature this algorithm can produce.
    ///
    /// RSA sizes assume keys of at most 8192 bits.
    pub fn max_signature_len(&self) -> usize {
        match self {
            Self::Es256 | Self::Ed25519 => 64,
            Self::Es384 => 96,
            Self::Es512 => 132,
            Self::Ps256 | Self::Ps384 | Self::Ps512 => 1024,
        }
    }
}

/// This error is thrown when converting from a string to [`SigningAlg`]
/// if the algorithm string is unrecognized.
#[derive(Debug, Eq, PartialEq)]
pub struct UnknownAlgorithmError(pub String);

impl fmt::Display for UnknownAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnknownAlgorithmError({})", self.0)
    }
}

impl std::error::Error for UnknownAlgorithmError {}

impl From<UnknownAlgorithmError> for crate::Error {
    fn from(e: UnknownAlgorithmError) -> Self {
        crate::Error::UnsupportedSigningAlgorithm(e.0)
    }
}
