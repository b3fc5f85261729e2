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

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{Error, Result};

/// Assertion data as binary CBOR or JSON depending upon
/// the Assertion type.
/// For JSON assertions the data is a JSON string and a Vec of u8 values for
/// binary data and JSON data to be CBOR encoded.
#[derive(Deserialize, Serialize, PartialEq, Eq, Clone)]
pub enum AssertionData {
    Json(String),    // json encoded data
    Binary(Vec<u8>), // binary data
    Cbor(Vec<u8>),   // binary cbor encoded data
}

impl fmt::Debug for AssertionData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Json(s) => write!(f, "{s:?}"), // json encoded data
            Self::Binary(_) => write!(f, "<omitted>"),
            Self::Cbor(s) => {
                let decoded = cbor_to_json(s).map_err(|_err| fmt::Error)?;
                write!(f, "{:?}", decoded.to_string())
            }
        }
    }
}

/// Converts CBOR bytes to a JSON value.
pub(crate) fn cbor_to_json(cbor: &[u8]) -> std::result::Result<Value, AssertionDecodeErrorCause> {
    let buf: Vec<u8> = Vec::new();
    let mut from = serde_cbor::Deserializer::from_slice(cbor);
    let mut to = serde_json::Serializer::new(buf);

    serde_transcode::transcode(&mut from, &mut to)?;
    let buf2 = to.into_inner();

    Ok(serde_json::from_slice(&buf2)?)
}

/// Converts a JSON value to CBOR bytes.
pub(crate) fn json_to_cbor(json: &Value) -> Result<Vec<u8>> {
    let json_str = json.to_string();
    let mut from = serde_json::Deserializer::from_str(&json_str);
    let mut to = serde_cbor::Serializer::new(Vec::new());

    serde_transcode::transcode(&mut from, &mut to).map_err(|_err| Error::AssertionEncoding)?;
    Ok(to.into_inner())
}

/// Internal Assertion structure
///
/// Each assertion type will contain its AssertionData. The label may carry
/// an instance suffix (`__2`) when more than one assertion with the same
/// base label is present in a claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assertion {
    label: String,
    data: AssertionData,
    content_type: String,
}

impl Assertion {
    pub(crate) fn new(label: &str, data: AssertionData) -> Self {
        let content_type = match &data {
            AssertionData::Json(_) => "application/json",
            AssertionData::Cbor(_) => "application/cbor",
            AssertionData::Binary(_) => "application/octet-stream",
        };

        Self {
            label: label.to_owned(),
            data,
            content_type: content_type.to_owned(),
        }
    }

    pub(crate) fn from_data_json(label: &str, binary_data: &[u8]) -> Result<Assertion> {
        let json = String::from_utf8(binary_data.to_vec()).map_err(|_| {
            AssertionDecodeError::from_assertion_and_cause(
                label,
                "application/json",
                AssertionDecodeErrorCause::BinaryDataNotUtf8,
            )
        })?;

        Ok(Self::new(label, AssertionData::Json(json)))
    }

    pub(crate) fn from_data_cbor(label: &str, binary_data: &[u8]) -> Assertion {
        Self::new(label, AssertionData::Cbor(binary_data.to_vec()))
    }

    pub(crate) fn from_data_binary(label: &str, mime_type: &str, binary_data: &[u8]) -> Assertion {
        Self {
            label: label.to_owned(),
            data: AssertionData::Binary(binary_data.to_vec()),
            content_type: mime_type.to_owned(),
        }
    }

    /// The label including any instance suffix.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The label without an instance suffix.
    pub fn label_root(&self) -> &str {
        split_instance(&self.label).0
    }

    /// Instance number, starting at 1.
    pub fn instance(&self) -> usize {
        split_instance(&self.label).1
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        match &self.data {
            AssertionData::Json(x) => x.as_bytes(),
            AssertionData::Binary(x) | AssertionData::Cbor(x) => x,
        }
    }

    pub fn decode_data(&self) -> &AssertionData {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.data, AssertionData::Binary(_))
    }

    /// The assertion payload as JSON.
    ///
    /// Binary assertions have no JSON form and return
    /// [`Error::UnsupportedType`].
    pub fn as_json_object(&self) -> Result<Value> {
        match &self.data {
            AssertionData::Json(s) => serde_json::from_str(s).map_err(|e| {
                AssertionDecodeError::from_assertion_and_cause(
                    &self.label,
                    &self.content_type,
                    e.into(),
                )
                .into()
            }),
            AssertionData::Cbor(c) => cbor_to_json(c).map_err(|cause| {
                AssertionDecodeError::from_assertion_and_cause(
                    &self.label,
                    &self.content_type,
                    cause,
                )
                .into()
            }),
            AssertionData::Binary(_) => Err(Error::UnsupportedType),
        }
    }
}

/// Splits `label__N` into its base label and instance number.
pub(crate) fn split_instance(label: &str) -> (&str, usize) {
    if let Some((root, suffix)) = label.rsplit_once("__") {
        if let Ok(instance) = suffix.parse::<usize>() {
            return (root, instance);
        }
    }
    (label, 1)
}

/// Appends an instance suffix to `label` for instances after the first.
pub(crate) fn label_with_instance(label: &str, instance: usize) -> String {
    if instance > 1 {
        format!("{label}__{instance}")
    } else {
        label.to_owned()
    }
}

/// Trait to handle default Cbor encoding/decoding of Assertions
pub trait AssertionCbor: Serialize + DeserializeOwned + AssertionBase {
    fn to_cbor_assertion(&self) -> Result<Assertion> {
        let data = AssertionData::Cbor(
            serde_cbor::to_vec(self).map_err(|_err| Error::AssertionEncoding)?,
        );
        Ok(Assertion::new(self.label(), data))
    }

    fn from_cbor_assertion(assertion: &Assertion) -> Result<Self> {
        assertion.check_label_and_type::<Self>("application/cbor")?;

        serde_cbor::from_slice(assertion.data()).map_err(|e| {
            AssertionDecodeError::from_assertion_and_cause(
                assertion.label(),
                assertion.content_type(),
                e.into(),
            )
            .into()
        })
    }
}

/// Trait to handle conversion of typed assertions to and from [`Assertion`].
pub trait AssertionBase
where
    Self: Sized,
{
    const LABEL: &'static str = "unknown";

    fn label(&self) -> &str {
        Self::LABEL
    }

    fn to_assertion(&self) -> Result<Assertion>;

    fn from_assertion(assertion: &Assertion) -> Result<Self>;
}

impl Assertion {
    fn check_label_and_type<T: AssertionBase>(&self, content_type: &str) -> Result<()> {
        if self.label_root() != T::LABEL {
            return Err(AssertionDecodeError::from_assertion_and_cause(
                &self.label,
                &self.content_type,
                AssertionDecodeErrorCause::UnexpectedLabel {
                    expected: T::LABEL.to_owned(),
                    found: self.label_root().to_owned(),
                },
            )
            .into());
        }

        if self.content_type != content_type {
            return Err(AssertionDecodeError::from_assertion_and_cause(
                &self.label,
                &self.content_type,
                AssertionDecodeErrorCause::UnexpectedDataType {
                    expected: content_type.to_owned(),
                    found: self.content_type.clone(),
                },
            )
            .into());
        }
        Ok(())
    }
}

/// This error type is returned when an assertion can not be decoded.
#[non_exhaustive]
pub struct AssertionDecodeError {
    pub label: String,
    pub content_type: String,
    pub source: AssertionDecodeErrorCause,
}

impl AssertionDecodeError {
    pub(crate) fn from_assertion_and_cause(
        label: &str,
        content_type: &str,
        source: AssertionDecodeErrorCause,
    ) -> Self {
        Self {
            label: label.to_owned(),
            content_type: content_type.to_owned(),
            source,
        }
    }

    fn fmt_internal(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "could not decode assertion {} (content type {}): {}",
            self.label, self.content_type, self.source
        )
    }
}

impl std::fmt::Debug for AssertionDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_internal(f)
    }
}

impl std::fmt::Display for AssertionDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_internal(f)
    }
}

impl std::error::Error for AssertionDecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// This error type is used inside `AssertionDecodeError` to describe the
/// root cause for the decoding error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssertionDecodeErrorCause {
    /// The assertion had an unexpected data type.
    #[error("the assertion had an unexpected data type: expected {expected}, found {found}")]
    UnexpectedDataType { expected: String, found: String },

    /// The assertion label does not name the requested type.
    #[error("the assertion had an unexpected label: expected {expected}, found {found}")]
    UnexpectedLabel { expected: String, found: String },

    /// Binary data could not be interpreted as UTF-8.
    #[error("binary data could not be interpreted as UTF-8")]
    BinaryDataNotUtf8,

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    CborError(#[from] serde_cbor::Error),

}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn instance_labels() {
        assert_eq!(split_instance("c2pa.actions"), ("c2pa.actions", 1));
        assert_eq!(split_instance("c2pa.ingredient__3"), ("c2pa.ingredient", 3));
        assert_eq!(split_instance("org.test__x"), ("org.test__x", 1));
        assert_eq!(label_with_instance("c2pa.ingredient", 1), "c2pa.ingredient");
        assert_eq!(label_with_instance("c2pa.ingredient", 2), "c2pa.ingredient__2");

        let a = Assertion::from_data_cbor("c2pa.ingredient__2", &[0xa0]);
        assert_eq!(a.label_root(), "c2pa.ingredient");
        assert_eq!(a.instance(), 2);
    }

    #[test]
    fn json_and_cbor_views() {
        let json = Assertion::from_data_json("org.test.json", br#"{"a":1}"#).unwrap();
        assert_eq!(json.content_type(), "application/json");
        assert_eq!(json.as_json_object().unwrap()["a"], 1);

        let cbor_bytes = json_to_cbor(&serde_json::json!({"b": [1, 2]})).unwrap();
        let cbor = Assertion::from_data_cbor("org.test.cbor", &cbor_bytes);
        assert_eq!(cbor.as_json_object().unwrap()["b"][1], 2);

        let bin = Assertion::from_data_binary("c2pa.thumbnail.claim.jpeg", "image/jpeg", &[1]);
        assert!(bin.is_binary());
        assert!(matches!(bin.as_json_object(), Err(Error::UnsupportedType)));

        assert!(matches!(
            Assertion::from_data_json("org.test.json", &[0xff, 0xfe]),
            Err(Error::AssertionDecoding(_))
        ));
    }
}
