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

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};

/// JSON serializable success or error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Error(ErrorResponse),
    Ok(Value),
}

impl Response {
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(value) => Self::Ok(value),
                Err(e) => Self::Error(ErrorResponse::from_error(&Error::JsonError(e))),
            },
            Err(e) => Self::Error(ErrorResponse::from_error(&e)),
        }
    }

    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error(error)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&report)
    }
}

/// Error categories for callers on the other side of the JSON boundary.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    UnsupportedFormat,
    NotFound,
    Malformed,
    SignatureInvalid,
    ContentTampered,
    SignError,
    Io,
    Config,
    Other,
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UnsupportedFormat => ErrorCode::UnsupportedFormat,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Malformed => ErrorCode::Malformed,
            ErrorKind::SignatureInvalid => ErrorCode::SignatureInvalid,
            ErrorKind::ContentTampered => ErrorCode::ContentTampered,
            ErrorKind::SignError => ErrorCode::SignError,
            ErrorKind::Io => ErrorCode::Io,
            ErrorKind::Config => ErrorCode::Config,
        }
    }
}

/// JSON serializable error with message, code and context.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// Additional context for the cause of the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ErrorResponse {
    /// An uncategorized error.
    pub fn new<V: std::fmt::Display>(error: V) -> Self {
        Self {
            message: error.to_string(),
            code: Some(ErrorCode::Other),
            context: None,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self {
            message: error.to_string(),
            code: Some(error.kind().into()),
            context: None,
        }
    }

    pub fn set_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn set_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let resp = ErrorResponse::from_error(&Error::JumbfNotFound).set_context("a.jpg");
        assert_eq!(resp.code, Some(ErrorCode::NotFound));
        assert_eq!(resp.context.as_deref(), Some("a.jpg"));

        let resp = ErrorResponse::new("something else").set_code(ErrorCode::Io);
        assert_eq!(resp.code, Some(ErrorCode::Io));
    }

    #[test]
    fn response_json() {
        let ok: Value =
            serde_json::from_str(&Response::from_result(Ok(vec!["jpeg"])).to_string()).unwrap();
        assert_eq!(ok["ok"][0], "jpeg");

        let err: Value = serde_json::from_str(
            &Response::from_result::<()>(Err(Error::UnsupportedType)).to_string(),
        )
        .unwrap();
        assert_eq!(err["error"]["code"], "UnsupportedFormat");
        assert_eq!(err["error"]["message"], "type is unsupported");
    }
}
