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

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    assertion::{
        json_to_cbor, label_with_instance, Assertion, AssertionBase, AssertionData,
        AssertionDecodeError,
    },
    error::{Error, Result},
};

/// How an assertion is stored inside a manifest.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ManifestAssertionKind {
    #[default]
    Cbor,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
/// A labeled container for an Assertion value in a Manifest
pub struct ManifestAssertion {
    /// An assertion label in reverse domain format
    label: String,
    /// The data of the assertion as Value
    data: Value,
    /// There can be more than one assertion for any label
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<usize>,
    /// The [ManifestAssertionKind] for this assertion (as stored in c2pa
    /// content)
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ManifestAssertionKind>,
}

impl ManifestAssertion {
    /// Create with label and value
    pub fn new(label: String, data: Value) -> Self {
        Self {
            label,
            data,
            instance: None,
            kind: None,
        }
    }

    /// An assertion label in reverse domain format
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The label with a `__N` suffix for instances after the first.
    pub fn label_with_instance(&self) -> String {
        label_with_instance(&self.label, self.instance())
    }

    pub fn value(&self) -> &Value {
        &self.data
    }

    /// The instance number of this assertion
    /// If the same label is used for multiple assertions, incremental instances
    /// are added The first instance is always 1 and increased by 1 per
    /// duplicated label
    pub fn instance(&self) -> usize {
        self.instance.unwrap_or(1)
    }

    /// The storage kind, [`ManifestAssertionKind::Cbor`] unless overridden.
    pub fn kind(&self) -> ManifestAssertionKind {
        self.kind.unwrap_or_default()
    }

    /// Allows overriding the default [ManifestAssertionKind] to Json
    pub fn set_kind(mut self, kind: ManifestAssertionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Creates a ManifestAssertion with the given label and any serde
    /// serializable object
    ///
    /// # Example: Creating a custom assertion from a serde_json object.
    ///
    ///```
    /// # use c2pa_engine::Result;
    /// use c2pa_engine::ManifestAssertion;
    /// use serde_json::json;
    /// # fn main() -> Result<()> {
    /// let value = json!({"my_tag": "Anything I want"});
    /// let _ma = ManifestAssertion::from_labeled_assertion("org.contentauth.foo", &value)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_labeled_assertion<S: Into<String>, T: Serialize>(
        label: S,
        data: &T,
    ) -> Result<Self> {
        Ok(Self::new(
            label.into(),
            serde_json::to_value(data).map_err(|_err| Error::AssertionEncoding)?,
        ))
    }

    pub fn from_assertion<T: Serialize + AssertionBase>(data: &T) -> Result<Self> {
        Self::from_labeled_assertion(data.label(), data)
    }

    /// Deserializes the value into a typed assertion.
    pub fn to_assertion<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            Error::AssertionDecoding(AssertionDecodeError::from_assertion_and_cause(
                &self.label,
                "application/json",
                e.into(),
            ))
        })
    }

    /// Encodes the value as a claim assertion of the requested kind.
    pub(crate) fn to_claim_assertion(&self) -> Result<Assertion> {
        let label = self.label_with_instance();
        let data = match self.kind() {
            ManifestAssertionKind::Json => AssertionData::Json(self.data.to_string()),
            ManifestAssertionKind::Cbor => AssertionData::Cbor(json_to_cbor(&self.data)?),
        };
        Ok(Assertion::new(&label, data))
    }

    /// Report form of a JSON or CBOR claim assertion.
    pub(crate) fn from_claim_assertion(assertion: &Assertion) -> Result<Self> {
        let kind = match assertion.decode_data() {
            AssertionData::Json(_) => ManifestAssertionKind::Json,
            AssertionData::Cbor(_) => ManifestAssertionKind::Cbor,
            AssertionData::Binary(_) => return Err(Error::UnsupportedType),
        };
        let instance = assertion.instance();

        Ok(Self {
            label: assertion.label_root().to_owned(),
            data: assertion.as_json_object()?,
            instance: (instance > 1).then_some(instance),
            kind: Some(kind),
        })
    }
}
