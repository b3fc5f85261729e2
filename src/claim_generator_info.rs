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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of the claim generator, or the software used in generating the
/// claim.
///
/// Extra fields are kept in key order so the claim CBOR does not depend on
/// insertion order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimGeneratorInfo {
    /// A human readable string naming the claim_generator
    pub name: String,
    /// A human readable string of the product's version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    // Any other values that are not part of the standard
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

impl Default for ClaimGeneratorInfo {
    fn default() -> Self {
        Self {
            name: crate::NAME.to_string(),
            version: Some(crate::VERSION.to_string()),
            other: BTreeMap::new(),
        }
    }
}

impl ClaimGeneratorInfo {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            version: None,
            other: BTreeMap::new(),
        }
    }

    /// Sets the version of the generator.
    pub fn set_version<S: Into<String>>(&mut self, version: S) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a new key/value pair to the generator info.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> &Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.other.insert(key.into(), value.into());
        self
    }

    /// Gets additional values by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.other.get(key)
    }

    /// `name/version` in user agent form, or just the name.
    pub fn user_agent(&self) -> String {
        match &self.version {
            Some(version) => format!("{}/{}", self.name.replace(' ', "_"), version),
            None => self.name.replace(' ', "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn user_agent_forms() {
        let mut info = ClaimGeneratorInfo::new("Test App");
        assert_eq!(info.user_agent(), "Test_App");

        info.set_version("2.1");
        assert_eq!(info.user_agent(), "Test_App/2.1");

        let engine = ClaimGeneratorInfo::default();
        assert_eq!(engine.user_agent(), format!("c2pa-engine/{}", crate::VERSION));
    }

    #[test]
    fn extra_fields_are_ordered() {
        let mut a = ClaimGeneratorInfo::new("app");
        a.insert("zeta", 1);
        a.insert("alpha", "x");

        let mut b = ClaimGeneratorInfo::new("app");
        b.insert("alpha", "x");
        b.insert("zeta", 1);

        assert_eq!(serde_cbor::to_vec(&a).unwrap(), serde_cbor::to_vec(&b).unwrap());
        assert_eq!(a.get("zeta"), Some(&Value::from(1)));
    }
}
