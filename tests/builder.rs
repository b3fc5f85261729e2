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

#![allow(clippy::unwrap_used)]

mod common;

use std::io::Cursor;

use c2pa_engine::{
    create_signer, Builder, CallbackSigner, Error, ErrorKind, Signer, SignerConfig, SigningAlg,
    ValidationState,
};
use common::{jpeg, read, settings, sign_with, PKEY, SIGNCERT};
use serde_json::json;

const LABEL_A: &str = "urn:uuid:0b6e1f43-7a1c-4c0e-9c9e-2d1f6c0a0001";
const LABEL_B: &str = "urn:uuid:0b6e1f43-7a1c-4c0e-9c9e-2d1f6c0a0002";

fn labeled(label: &str, title: &str) -> String {
    json!({
        "claim_generator": "integration_test/1.0",
        "label": label,
        "title": title,
        "assertions": [
            {"label": "c2pa.actions", "data": {"actions": [{"action": "c2pa.created"}]}}
        ]
    })
    .to_string()
}

fn callback_config() -> SignerConfig {
    SignerConfig::from_pem_chain(SigningAlg::Es256, SIGNCERT, None).unwrap()
}

fn try_sign(builder: &mut Builder, signer: &dyn Signer, dest: &mut Cursor<Vec<u8>>) -> Error {
    builder
        .sign(signer, "image/jpeg", &mut Cursor::new(jpeg()), dest)
        .unwrap_err()
}

#[test]
fn callback_signer_signs() {
    let local = create_signer::from_keys(SIGNCERT, PKEY, SigningAlg::Es256, None).unwrap();
    let signer = CallbackSigner::new(
        move |data: &[u8], signature: &mut [u8]| match local.sign(data) {
            Ok(sig) if sig.len() <= signature.len() => {
                signature[..sig.len()].copy_from_slice(&sig);
                sig.len() as isize
            }
            _ => -1,
        },
        callback_config(),
    );

    let mut builder = Builder::from_json(&labeled(LABEL_A, "callback.jpg"))
        .unwrap()
        .with_settings(settings());
    let mut dest = Cursor::new(Vec::new());
    builder
        .sign(&signer, "image/jpeg", &mut Cursor::new(jpeg()), &mut dest)
        .unwrap();

    let reader = read(dest.get_ref());
    assert_eq!(reader.validation_state(), ValidationState::Validated);
    assert_eq!(reader.active_label(), Some(LABEL_A));
    assert!(reader.validation_status().unwrap().is_valid());

    let info = reader.active_manifest().unwrap().signature_info().unwrap();
    assert_eq!(info.alg, Some(SigningAlg::Es256));
    assert!(info.time.is_some());
}

#[test]
fn failing_callback_leaves_destination_alone() {
    let signer = CallbackSigner::new(|_: &[u8], _: &mut [u8]| -7, callback_config());

    let mut builder = Builder::from_json(&labeled(LABEL_A, "fail.jpg")).unwrap();
    let mut dest = Cursor::new(b"previous contents".to_vec());

    let err = try_sign(&mut builder, &signer, &mut dest);
    assert!(matches!(err, Error::SignerCallback(-7)), "{err}");
    assert_eq!(err.kind(), ErrorKind::SignError);
    assert_eq!(dest.into_inner(), b"previous contents");
}

#[test]
fn ingredient_cycles_are_rejected() {
    // B names A as its parent
    let a = sign_with(&labeled(LABEL_A, "A.jpg"), &jpeg());
    let b = sign_with(&labeled(LABEL_B, "B.jpg"), &a);

    // a new A naming B would make A its own ancestor
    let mut builder = Builder::from_json(&labeled(LABEL_A, "A again.jpg"))
        .unwrap()
        .with_settings(settings());
    builder
        .add_ingredient_from_stream(r#"{"title": "B.jpg"}"#, "jpg", &mut Cursor::new(&b))
        .unwrap();

    let mut dest = Cursor::new(Vec::new());
    let err = try_sign(&mut builder, common::signer().as_ref(), &mut dest);
    assert!(matches!(err, Error::IngredientCycle(_)), "{err}");
    assert!(dest.into_inner().is_empty());
}

#[test]
fn conflicting_labels_are_rejected() {
    let first = sign_with(&labeled(LABEL_A, "first.jpg"), &jpeg());
    let second = sign_with(&labeled(LABEL_A, "second.jpg"), &jpeg());

    let mut builder = Builder::from_json(&labeled(LABEL_B, "both.jpg"))
        .unwrap()
        .with_settings(settings());
    builder
        .add_ingredient_from_stream(r#"{"title": "first.jpg"}"#, "jpg", &mut Cursor::new(&first))
        .unwrap();
    builder
        .add_ingredient_from_stream(r#"{"title": "second.jpg"}"#, "jpg", &mut Cursor::new(&second))
        .unwrap();

    let mut dest = Cursor::new(Vec::new());
    let err = try_sign(&mut builder, common::signer().as_ref(), &mut dest);
    assert!(matches!(err, Error::DuplicateLabel(ref l) if l == LABEL_A), "{err}");
}

#[test]
fn shared_ingredient_is_stored_once() {
    let a = sign_with(&labeled(LABEL_A, "A.jpg"), &jpeg());

    let mut builder = Builder::from_json(&labeled(LABEL_B, "twice.jpg"))
        .unwrap()
        .with_settings(settings());
    for _ in 0..2 {
        builder
            .add_ingredient_from_stream(r#"{"title": "A.jpg"}"#, "jpg", &mut Cursor::new(&a))
            .unwrap();
    }

    let mut dest = Cursor::new(Vec::new());
    builder
        .sign(
            common::signer().as_ref(),
            "jpg",
            &mut Cursor::new(jpeg()),
            &mut dest,
        )
        .unwrap();

    let reader = read(dest.get_ref());
    assert_eq!(reader.manifests().len(), 2);

    let active = reader.active_manifest().unwrap();
    assert_eq!(active.ingredients().len(), 2);
    assert!(active
        .ingredients()
        .iter()
        .all(|i| i.active_manifest() == Some(LABEL_A)));
    assert!(reader.validation_status().unwrap().is_valid());
}

#[test]
fn time_stamp_failure_policy() {
    // nothing listens on the discard port
    let tsa = Some("http://127.0.0.1:9/tsa".to_string());
    let signer = create_signer::from_keys(SIGNCERT, PKEY, SigningAlg::Es256, tsa).unwrap();

    let mut builder = Builder::from_json(&labeled(LABEL_A, "tsa.jpg"))
        .unwrap()
        .with_settings(settings());
    let mut dest = Cursor::new(Vec::new());
    builder
        .sign(signer.as_ref(), "jpg", &mut Cursor::new(jpeg()), &mut dest)
        .unwrap();
    assert!(builder.warnings().iter().any(|w| w.contains("time stamp")));
    let reader = read(dest.get_ref());
    assert!(reader.validation_status().unwrap().is_valid());

    // without a token the declared signing time is reported
    let info = reader.active_manifest().unwrap().signature_info().unwrap();
    assert!(info.time.is_some());

    let mut strict = settings();
    strict.signer.strict_augmentation = true;
    let mut builder = Builder::from_json(&labeled(LABEL_A, "tsa.jpg"))
        .unwrap()
        .with_settings(strict);
    let mut dest = Cursor::new(Vec::new());
    let err = try_sign(&mut builder, signer.as_ref(), &mut dest);
    assert!(matches!(err, Error::TimeStamp(_)), "{err}");
    assert!(dest.into_inner().is_empty());
}

#[test]
fn empty_assertions_policy() {
    let def = r#"{"claim_generator": "integration_test/1.0", "assertions": []}"#;

    // allowed by default
    let signed = sign_with(def, &jpeg());
    assert_eq!(read(&signed).validation_state(), ValidationState::Validated);

    let mut strict = settings();
    strict.builder.require_assertion = true;
    let mut builder = Builder::from_json(def).unwrap().with_settings(strict);
    let mut dest = Cursor::new(Vec::new());
    let err = try_sign(&mut builder, common::signer().as_ref(), &mut dest);
    assert!(matches!(err, Error::NoAssertions));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn sign_in_place_rewrites_stream() {
    let mut stream = Cursor::new(jpeg());
    let mut builder = Builder::from_json(&labeled(LABEL_A, "in_place.jpg"))
        .unwrap()
        .with_settings(settings());
    builder
        .sign_in_place(common::signer().as_ref(), "jpg", &mut stream)
        .unwrap();

    let reader = read(stream.get_ref());
    assert_eq!(reader.active_label(), Some(LABEL_A));
    assert!(reader.validation_status().unwrap().is_valid());
}
