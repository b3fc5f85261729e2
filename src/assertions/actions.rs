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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_cbor::Value;

use crate::{
    assertion::{json_to_cbor, Assertion, AssertionBase, AssertionCbor},
    assertions::labels,
    error::Result,
    ClaimGeneratorInfo,
};

/// Specification defined C2PA actions
pub mod c2pa_action {
    /// The asset was first created.
    pub const CREATED: &str = "c2pa.created";

    /// An existing asset was opened and is the parent of the new one.
    pub const OPENED: &str = "c2pa.opened";

    /// A component ingredient was placed into the asset.
    pub const PLACED: &str = "c2pa.placed";

    pub const CROPPED: &str = "c2pa.cropped";

    pub const EDITED: &str = "c2pa.edited";
}

/// Who performed an action: either a plain string or a structured
/// [`ClaimGeneratorInfo`].
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum SoftwareAgent {
    String(String),
    ClaimGeneratorInfo(ClaimGeneratorInfo),
}

impl From<&str> for SoftwareAgent {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<ClaimGeneratorInfo> for SoftwareAgent {
    fn from(info: ClaimGeneratorInfo) -> Self {
        Self::ClaimGeneratorInfo(info)
    }
}

/// One entry of an actions assertion.
///
/// Fields without accessors are carried through unchanged when a
/// definition is converted into an assertion.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Action {
    /// One of the [`c2pa_action`] labels, or a custom one.
    action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    when: Option<String>,

    #[serde(rename = "softwareAgent", skip_serializing_if = "Option::is_none")]
    software_agent: Option<SoftwareAgent>,

    /// Semicolon separated list of changed regions.
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<String>,

    #[serde(rename = "instanceId", skip_serializing_if = "Option::is_none")]
    instance_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<HashMap<String, Value>>,

    #[serde(rename = "digitalSourceType", skip_serializing_if = "Option::is_none")]
    source_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl Action {
    pub fn new(label: &str) -> Self {
        Self {
            action: label.to_owned(),
            ..Default::default()
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn software_agent(&self) -> Option<&SoftwareAgent> {
        self.software_agent.as_ref()
    }

    pub fn get_parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.as_ref()?.get(key)
    }

    pub fn set_software_agent<S: Into<SoftwareAgent>>(mut self, agent: S) -> Self {
        self.software_agent = Some(agent.into());
        self
    }

    /// Stores `value` under `key`, converted to CBOR.
    pub fn set_parameter<S: Into<String>, T: Serialize>(
        mut self,
        key: S,
        value: T,
    ) -> Result<Self> {
        let value = serde_cbor::value::to_value(value)?;
        self.parameters
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        Ok(self)
    }
}

/// The `c2pa.actions` assertion: what was done to produce the asset.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Actions {
    pub actions: Vec<Action>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn add_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Returns `true` if any action has the label `action`.
    pub fn contains(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a.action == action)
    }

    /// Converts the JSON form used in manifest definitions.
    pub fn from_json_value(json: &serde_json::Value) -> Result<Self> {
        let cbor = json_to_cbor(json)?;
        Ok(serde_cbor::from_slice(&cbor)?)
    }
}

impl AssertionCbor for Actions {}

impl AssertionBase for Actions {
    const LABEL: &'static str = labels::ACTIONS;

    fn to_assertion(&self) -> Result<Assertion> {
        Self::to_cbor_assertion(self)
    }

    fn from_assertion(assertion: &Assertion) -> Result<Self> {
        Self::from_cbor_assertion(assertion)
    }
}
