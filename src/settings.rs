// Copyright 2024 Adobe. All rights reserved.
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

//! Engine configuration.
//!
//! Settings are plain data. Every operation accepts an explicit
//! [`Settings`] value; the process-wide copy held here is only a default
//! for callers that do not pass one.

use std::sync::RwLock;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::{trust_handler::load_trust_from_data, Error, Result};

lazy_static! {
    static ref SETTINGS: RwLock<Settings> = RwLock::new(Settings::default());
}

/// Trust list configuration. All values are PEM text, not paths.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Trust {
    pub trust_anchors: Option<String>,
    pub private_anchors: Option<String>,
    /// End-entity certificates (PEM) or base64 SHA-256 certificate hashes
    /// that are trusted without a chain.
    pub allowed_list: Option<String>,
    /// Allowed EKU OIDs, one per line.
    pub trust_config: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Verify {
    /// Evaluate signing certificates against the trust lists.
    pub verify_trust: bool,
    /// Also evaluate trust for ingredient manifests.
    pub check_ingredient_trust: bool,
    /// Fetch OCSP responses during validation when none is stapled.
    pub ocsp_fetch: bool,
}

impl Default for Verify {
    fn default() -> Self {
        Self {
            verify_trust: true,
            check_ingredient_trust: true,
            ocsp_fetch: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuilderSettings {
    /// Reject manifest definitions that carry no assertions.
    pub require_assertion: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignerSettings {
    /// Fail signing when a time stamp or OCSP fetch fails instead of
    /// recording a warning.
    pub strict_augmentation: bool,
    /// Bytes reserved in the signature box for an OCSP response.
    pub ocsp_reserve_size: usize,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            strict_augmentation: false,
            ocsp_reserve_size: 10000,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub trust: Trust,
    pub verify: Verify,
    pub builder: BuilderSettings,
    pub signer: SignerSettings,
}

impl Settings {
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(toml).map_err(|e| Error::BadSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| Error::BadSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from `data`, where `format` is `"toml"` or `"json"`.
    pub fn from_string(data: &str, format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "toml" => Self::from_toml(data),
            "json" => Self::from_json(data),
            _ => Err(Error::BadSettings(format!("unknown settings format {format}"))),
        }
    }

    /// Returns `true` if any trust anchors are configured.
    pub fn has_trust_anchors(&self) -> bool {
        self.trust.trust_anchors.is_some()
            || self.trust.private_anchors.is_some()
            || self.trust.allowed_list.is_some()
    }

    fn validate(&self) -> Result<()> {
        for pem in [&self.trust.trust_anchors, &self.trust.private_anchors]
            .into_iter()
            .flatten()
        {
            let certs = load_trust_from_data(pem.as_bytes())
                .map_err(|_| Error::BadSettings("trust anchors could not be parsed".into()))?;
            if certs.is_empty() {
                return Err(Error::BadSettings(
                    "trust anchor list contains no certificates".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Replaces the process-wide default settings.
pub fn load_settings_from_str(data: &str, format: &str) -> Result<()> {
    let settings = Settings::from_string(data, format)?;

    let mut current = SETTINGS
        .write()
        .map_err(|_| Error::BadSettings("settings lock poisoned".into()))?;
    *current = settings;
    Ok(())
}

/// Returns a copy of the process-wide default settings.
pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}
