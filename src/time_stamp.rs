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

//! RFC 3161 time stamp requests and token inspection.

use std::io::Read;

use asn1_rs::{Any, Class, FromDer, Tag};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use openssl::{cms::CmsContentInfo, cms::CMSOptions};

use crate::{
    error::{Error, Result},
    utils::hash_utils::{hash_by_alg, vec_compare},
};

const TSA_CONTENT_TYPE: &str = "application/timestamp-query";
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

// DER of the AlgorithmIdentifier OIDs we produce and accept
const SHA256_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
const SHA384_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];
const SHA512_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];

/// The parts of a `TSTInfo` the engine looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TstInfo {
    pub gen_time: DateTime<Utc>,
    pub hash_alg: &'static str,
    pub hashed_message: Vec<u8>,
}

fn der_len(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    der_len(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn der_unsigned(value: &[u8]) -> Vec<u8> {
    let start = value.iter().take_while(|b| **b == 0).count();
    let mut content = Vec::with_capacity(value.len() + 1);
    match value.get(start) {
        None => content.push(0),
        Some(b) if b & 0x80 != 0 => {
            content.push(0);
            content.extend_from_slice(&value[start..]);
        }
        Some(_) => content.extend_from_slice(&value[start..]),
    }
    der_tlv(0x02, &content)
}

/// DER encodes a `TimeStampReq` for a SHA-256 imprint.
pub(crate) fn time_stamp_request(imprint: &[u8], nonce: u64) -> Vec<u8> {
    let mut alg_id = der_tlv(0x06, SHA256_OID);
    alg_id.extend_from_slice(&[0x05, 0x00]);

    let mut message_imprint = der_tlv(0x30, &alg_id);
    message_imprint.extend(der_tlv(0x04, imprint));
    let message_imprint = der_tlv(0x30, &message_imprint);

    let mut req = der_tlv(0x02, &[0x01]);
    req.extend(message_imprint);
    req.extend(der_unsigned(&nonce.to_be_bytes()));
    // certReq
    req.extend_from_slice(&[0x01, 0x01, 0xff]);

    der_tlv(0x30, &req)
}

fn der_items(data: &[u8]) -> Result<Vec<Any<'_>>> {
    let mut items = Vec::new();
    let mut rem = data;
    while !rem.is_empty() {
        let (next, item) =
            Any::from_der(rem).map_err(|e| Error::TimeStamp(format!("bad DER: {e}")))?;
        items.push(item);
        rem = next;
    }
    Ok(items)
}

fn expect_tag<'a>(item: Option<&'a Any<'a>>, tag: Tag, what: &str) -> Result<&'a Any<'a>> {
    match item {
        Some(any) if any.tag() == tag && any.class() == Class::Universal => Ok(any),
        _ => Err(Error::TimeStamp(format!("{what} not found"))),
    }
}

/// Extracts the time stamp token from a DER `TimeStampResp`.
pub(crate) fn token_from_response(resp: &[u8]) -> Result<Vec<u8>> {
    let (_, outer) =
        Any::from_der(resp).map_err(|e| Error::TimeStamp(format!("bad response: {e}")))?;
    let (token_der, status_info) = Any::from_der(outer.data)
        .map_err(|e| Error::TimeStamp(format!("bad response: {e}")))?;
    let status_info = expect_tag(Some(&status_info), Tag::Sequence, "PKIStatusInfo")?;
    let status_items = der_items(status_info.data)?;
    let status = expect_tag(status_items.first(), Tag::Integer, "PKIStatus")?;

    // granted (0) or grantedWithMods (1)
    if status.data.len() != 1 || status.data[0] > 1 {
        return Err(Error::TimeStamp(format!(
            "time authority refused the request (status {:?})",
            status.data
        )));
    }

    let items = der_items(token_der)?;
    expect_tag(items.first(), Tag::Sequence, "TimeStampToken")?;
    Ok(token_der.to_vec())
}

/// Requests a time stamp token over `data` from the authority at `url`.
pub(crate) fn request_timestamp(url: &str, data: &[u8]) -> Result<Vec<u8>> {
    url::Url::parse(url).map_err(|e| Error::TimeStamp(format!("invalid TSA url: {e}")))?;

    let imprint = hash_by_alg("sha256", data, None)?;
    let body = time_stamp_request(&imprint, rand::random::<u64>() >> 1);

    let response = ureq::post(url)
        .set("Content-Type", TSA_CONTENT_TYPE)
        .send_bytes(&body)
        .map_err(|e| Error::TimeStamp(e.to_string()))?;

    let mut resp_bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_SIZE)
        .read_to_end(&mut resp_bytes)
        .map_err(|e| Error::TimeStamp(e.to_string()))?;

    let token = token_from_response(&resp_bytes)?;

    // make sure the authority stamped what we sent
    let info = verify_timestamp(&token, data)?;
    debug!("time stamp issued at {}", info.gen_time);
    Ok(token)
}

fn parse_gen_time(raw: &[u8]) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::TimeStamp("genTime is not text".into()))?
        .trim_end_matches('Z');

    NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.f")
        .map(|t| DateTime::<Utc>::from_naive_utc_and_offset(t, Utc))
        .map_err(|e| Error::TimeStamp(format!("bad genTime: {e}")))
}

/// Decodes a DER `TSTInfo`.
pub(crate) fn parse_tst_info(der: &[u8]) -> Result<TstInfo> {
    let (_, outer) =
        Any::from_der(der).map_err(|e| Error::TimeStamp(format!("bad TSTInfo: {e}")))?;
    let items = der_items(outer.data)?;

    let imprint = expect_tag(items.get(2), Tag::Sequence, "messageImprint")?;
    let imprint_items = der_items(imprint.data)?;

    let alg_id = expect_tag(imprint_items.first(), Tag::Sequence, "hashAlgorithm")?;
    let alg_items = der_items(alg_id.data)?;
    let oid = expect_tag(alg_items.first(), Tag::Oid, "hash OID")?;
    let hash_alg = match oid.data {
        SHA256_OID => "sha256",
        SHA384_OID => "sha384",
        SHA512_OID => "sha512",
        _ => return Err(Error::TimeStamp("unsupported imprint hash".into())),
    };

    let hashed = expect_tag(imprint_items.get(1), Tag::OctetString, "hashedMessage")?;
    let gen_time = expect_tag(items.get(4), Tag::GeneralizedTime, "genTime")?;

    Ok(TstInfo {
        gen_time: parse_gen_time(gen_time.data)?,
        hash_alg,
        hashed_message: hashed.data.to_vec(),
    })
}

/// Checks the token's CMS signature and that it stamps `data`.
///
/// The TSA certificate is not evaluated against trust lists.
pub(crate) fn verify_timestamp(token: &[u8], data: &[u8]) -> Result<TstInfo> {
    let mut cms = CmsContentInfo::from_der(token)
        .map_err(|e| Error::TimeStamp(format!("bad token: {e}")))?;

    let mut tst_der = Vec::new();
    cms.verify(
        None,
        None,
        None,
        Some(&mut tst_der),
        CMSOptions::NO_SIGNER_CERT_VERIFY,
    )
    .map_err(|e| Error::TimeStamp(format!("token signature invalid: {e}")))?;

    let info = parse_tst_info(&tst_der)?;
    let expected = hash_by_alg(info.hash_alg, data, None)?;
    if !vec_compare(&expected, &info.hashed_message) {
        return Err(Error::TimeStamp("message imprint mismatch".into()));
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn request_encoding() {
        let imprint = [0xabu8; 32];
        let req = time_stamp_request(&imprint, 0x80);

        let (rem, outer) = Any::from_der(&req).unwrap();
        assert!(rem.is_empty());
        assert_eq!(outer.tag(), Tag::Sequence);

        let items = der_items(outer.data).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].data, &[1]);
        // nonce 0x80 needs a leading zero to stay positive
        assert_eq!(items[2].data, &[0x00, 0x80]);
        assert_eq!(items[3].tag(), Tag::Boolean);

        let imprint_items = der_items(items[1].data).unwrap();
        assert_eq!(imprint_items[1].data, &imprint);
    }

    #[test]
    fn long_lengths() {
        let content = vec![7u8; 300];
        let tlv = der_tlv(0x04, &content);
        assert_eq!(&tlv[..4], &[0x04, 0x82, 0x01, 0x2c]);
        assert_eq!(tlv.len(), 304);
    }

    #[test]
    fn rejected_response() {
        // TimeStampResp { status: { rejection } }
        let status = der_tlv(0x30, &der_tlv(0x02, &[2]));
        let resp = der_tlv(0x30, &status);

        assert!(matches!(
            token_from_response(&resp),
            Err(Error::TimeStamp(_))
        ));
        assert!(matches!(
            token_from_response(b"garbage"),
            Err(Error::TimeStamp(_))
        ));
    }

    #[test]
    fn tst_info_fields() {
        let mut alg_id = der_tlv(0x06, SHA256_OID);
        alg_id.extend_from_slice(&[0x05, 0x00]);
        let mut imprint = der_tlv(0x30, &alg_id);
        imprint.extend(der_tlv(0x04, &[1u8; 32]));

        let mut tst = der_tlv(0x02, &[1]);
        tst.extend(der_tlv(0x06, &[0x2a, 0x03]));
        tst.extend(der_tlv(0x30, &imprint));
        tst.extend(der_tlv(0x02, &[0x05]));
        tst.extend(der_tlv(0x18, b"20240102030405.5Z"));
        let tst = der_tlv(0x30, &tst);

        let info = parse_tst_info(&tst).unwrap();
        assert_eq!(info.hash_alg, "sha256");
        assert_eq!(info.hashed_message, vec![1u8; 32]);
        assert_eq!(info.gen_time.to_rfc3339(), "2024-01-02T03:04:05.500+00:00");
    }

    #[test]
    fn unreachable_authority() {
        assert!(matches!(
            request_timestamp("http://127.0.0.1:9/tsa", b"data"),
            Err(Error::TimeStamp(_))
        ));
        assert!(matches!(
            request_timestamp("not a url", b"data"),
            Err(Error::TimeStamp(_))
        ));
    }
}
