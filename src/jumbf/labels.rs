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

#![deny(missing_docs)]

//! Labels for JUMBF boxes as defined in C2PA 1.0 Specification, and the
//! JUMBF URIs built from them.
//!
//! See <https://c2pa.org/specifications/specifications/1.0/specs/C2PA_Specification.html#_c2pa_box_details>.

/// Label for the C2PA manifest store.
///
/// See <https://c2pa.org/specifications/specifications/1.0/specs/C2PA_Specification.html#_c2pa_box_details>.
pub const MANIFEST_STORE: &str = "c2pa";

/// Label for the C2PA assertion store box.
pub const ASSERTIONS: &str = "c2pa.assertions";

/// Label for the C2PA claim box.
pub const CLAIM: &str = "c2pa.claim";

/// Label for the C2PA claim signature box.
pub const SIGNATURE: &str = "c2pa.signature";

/// Scheme prefix of self-contained JUMBF URIs.
pub(crate) const JUMBF_PREFIX: &str = "self#jumbf=";

// Split off JUMBF prefix.
pub(crate) fn to_normalized_uri(uri: &str) -> String {
    let output = match uri.split_once('=') {
        Some((_, path)) => path,
        None => uri,
    };

    // Add leading "/" if needed.
    let manifest_store_part = format!("{MANIFEST_STORE}/");
    if output.starts_with(&manifest_store_part) {
        format!("/{output}")
    } else {
        output.to_string()
    }
}

/// URI of a manifest within the store.
pub(crate) fn to_manifest_uri(manifest_label: &str) -> String {
    format!("{JUMBF_PREFIX}/{MANIFEST_STORE}/{manifest_label}")
}

/// URI of an assertion within a manifest.
pub(crate) fn to_assertion_uri(manifest_label: &str, assertion_label: &str) -> String {
    format!(
        "{}/{ASSERTIONS}/{assertion_label}",
        to_manifest_uri(manifest_label)
    )
}

/// URI of the signature box of a manifest.
pub(crate) fn to_signature_uri(manifest_label: &str) -> String {
    format!("{}/{SIGNATURE}", to_manifest_uri(manifest_label))
}

/// Relative URI of an assertion in the manifest that references it.
pub(crate) fn to_relative_assertion_uri(assertion_label: &str) -> String {
    format!("{JUMBF_PREFIX}{ASSERTIONS}/{assertion_label}")
}

// Extract an assertion label from a JUMBF URI.
pub(crate) fn assertion_label_from_uri(uri: &str) -> Option<String> {
    let raw_uri = to_normalized_uri(uri);
    let parts: Vec<&str> = raw_uri.split('/').collect();
    if parts.len() > 4 && parts[1] == MANIFEST_STORE && parts[3] == ASSERTIONS {
        Some(parts[4].to_string())
    } else if parts.len() > 1 && parts[0] == ASSERTIONS {
        Some(parts[1].to_string())
    } else {
        None
    }
}

// Extract a manifest label from an absolute JUMBF URI.
pub(crate) fn manifest_label_from_uri(uri: &str) -> Option<String> {
    let raw_uri = to_normalized_uri(uri);
    let parts: Vec<&str> = raw_uri.split('/').collect();
    if parts.len() > 2 && parts[1] == MANIFEST_STORE && !parts[2].is_empty() {
        Some(parts[2].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn uris() {
        let label = "contentauth:urn:uuid:1234";
        let uri = to_assertion_uri(label, "c2pa.actions");
        assert_eq!(
            uri,
            "self#jumbf=/c2pa/contentauth:urn:uuid:1234/c2pa.assertions/c2pa.actions"
        );
        assert_eq!(assertion_label_from_uri(&uri).unwrap(), "c2pa.actions");
        assert_eq!(manifest_label_from_uri(&uri).unwrap(), label);

        let relative = to_relative_assertion_uri("c2pa.hash.data");
        assert_eq!(assertion_label_from_uri(&relative).unwrap(), "c2pa.hash.data");
        assert_eq!(manifest_label_from_uri(&relative), None);

        assert_eq!(
            manifest_label_from_uri(&to_signature_uri(label)).unwrap(),
            label
        );
        assert_eq!(assertion_label_from_uri("self#jumbf=c2pa"), None);
    }
}
