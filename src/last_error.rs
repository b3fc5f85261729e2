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

//! Per-thread record of the last error seen by the JSON API.
//!
//! Rust callers get errors as values; this exists for bindings that can
//! only return a string or a flag.

use std::cell::RefCell;

use crate::error::Result;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Message of the last failing JSON API call on this thread.
///
/// Every JSON API call resets it, so read it right after the failure.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow().clone())
}

pub(crate) fn set_last_error<S: Into<String>>(message: S) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(message.into()));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Records the outcome of a call: clears on success, stores the message
/// on failure.
pub(crate) fn track<T>(result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => clear_last_error(),
        Err(e) => set_last_error(e.to_string()),
    }
    result
}
