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

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use c2pa_engine::{create_signer, Builder, Reader, Settings, Signer, SigningAlg};

pub const SIGNCERT: &[u8] = include_bytes!("../fixtures/certs/es256.pub");
pub const PKEY: &[u8] = include_bytes!("../fixtures/certs/es256.pem");
pub const ROOT: &str = include_str!("../fixtures/certs/root.pem");

pub fn signer() -> Box<dyn Signer> {
    create_signer::from_keys(SIGNCERT, PKEY, SigningAlg::Es256, None).unwrap()
}

/// Settings trusting the fixture root.
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.trust.trust_anchors = Some(ROOT.to_string());
    settings
}

fn push_segment(jpeg: &mut Vec<u8>, marker: u8, body: &[u8]) {
    jpeg.extend_from_slice(&[0xff, marker]);
    jpeg.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(body);
}

/// A small baseline JPEG whose scan data holds no 0xFF bytes.
pub fn jpeg() -> Vec<u8> {
    let mut jpeg = vec![0xff, 0xd8];
    push_segment(
        &mut jpeg,
        0xe0,
        &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
    );

    let mut dqt = vec![0u8];
    dqt.extend((1..=64).map(|i| i as u8));
    push_segment(&mut jpeg, 0xdb, &dqt);
    push_segment(&mut jpeg, 0xc0, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
    push_segment(&mut jpeg, 0xda, &[1, 1, 0, 0, 63, 0]);
    jpeg.extend((0..2000u32).map(|i| (i * 7 % 251) as u8));
    jpeg.extend_from_slice(&[0xff, 0xd9]);
    jpeg
}

pub fn definition(title: &str) -> String {
    serde_json::json!({
        "claim_generator": "integration_test/1.0",
        "title": title,
        "format": "image/jpeg",
        "assertions": [
            {"label": "c2pa.actions", "data": {"actions": [{"action": "c2pa.created"}]}}
        ]
    })
    .to_string()
}

/// Signs `source` with a fresh builder for `definition`.
pub fn sign_with(definition: &str, source: &[u8]) -> Vec<u8> {
    let mut builder = Builder::from_json(definition)
        .unwrap()
        .with_settings(settings());
    let mut dest = Cursor::new(Vec::new());
    builder
        .sign(
            signer().as_ref(),
            "image/jpeg",
            &mut Cursor::new(source),
            &mut dest,
        )
        .unwrap();
    dest.into_inner()
}

pub fn sign(title: &str, source: &[u8]) -> Vec<u8> {
    sign_with(&definition(title), source)
}

pub fn read(asset: &[u8]) -> Reader {
    Reader::from_stream_with_settings("image/jpeg", &mut Cursor::new(asset), &settings()).unwrap()
}
