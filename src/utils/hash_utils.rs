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

use std::io::{Cursor, SeekFrom};

use serde::{Deserialize, Serialize};
// direct sha functions
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{asset_io::CAIRead, Error, Result};

const MAX_HASH_BUF: usize = 256 * 1024 * 1024; // cap memory usage to 256MB

/// Default hash algorithm for new manifests.
pub(crate) const DEFAULT_HASH_ALG: &str = "sha256";

/// A byte range of an asset left out of a content hash.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct HashRange {
    start: usize,
    length: usize,
}

impl HashRange {
    pub fn new(start: usize, length: usize) -> Self {
        HashRange { start, length }
    }

    /// return start as usize
    pub fn start(&self) -> usize {
        self.start
    }

    /// return length as usize
    pub fn length(&self) -> usize {
        self.length
    }

    fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }
}

/// Compare two byte vectors return true if match, false otherwise
pub(crate) fn vec_compare(va: &[u8], vb: &[u8]) -> bool {
    (va.len() == vb.len()) &&  // zip stops at the shortest
     va.iter()
       .zip(vb)
       .all(|(a,b)| a == b)
}

#[derive(Clone)]
pub(crate) enum Hasher {
    SHA256(Sha256),
    SHA384(Sha384),
    SHA512(Sha512),
}

impl Hasher {
    /// Creates a hasher for one of "sha256", "sha384" or "sha512".
    pub(crate) fn new(alg: &str) -> Result<Self> {
        use Hasher::*;
        Ok(match alg {
            "sha256" => SHA256(Sha256::new()),
            "sha384" => SHA384(Sha384::new()),
            "sha512" => SHA512(Sha512::new()),
            _ => return Err(Error::BadParam(format!("unsupported hash algorithm {alg}"))),
        })
    }

    // update hash value with new data
    pub(crate) fn update(&mut self, data: &[u8]) {
        use Hasher::*;
        match self {
            SHA256(ref mut d) => d.update(data),
            SHA384(ref mut d) => d.update(data),
            SHA512(ref mut d) => d.update(data),
        }
    }

    // consume hasher and return the final digest
    pub(crate) fn finalize(hasher_enum: Hasher) -> Vec<u8> {
        use Hasher::*;
        match hasher_enum {
            SHA256(d) => d.finalize().to_vec(),
            SHA384(d) => d.finalize().to_vec(),
            SHA512(d) => d.finalize().to_vec(),
        }
    }
}

/// Return a Sha256 hash of array of bytes
pub(crate) fn hash_sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Hashes `data` with `alg`, skipping the `exclusions` ranges.
pub(crate) fn hash_by_alg(
    alg: &str,
    data: &[u8],
    exclusions: Option<Vec<HashRange>>,
) -> Result<Vec<u8>> {
    hash_stream_by_alg(alg, &mut Cursor::new(data), exclusions)
}

/// Hashes the whole of `data` with `alg`, skipping the `exclusions`
/// ranges.
///
/// Exclusions may be given in any order but must not overlap and must lie
/// inside the stream.
pub fn hash_stream_by_alg(
    alg: &str,
    data: &mut dyn CAIRead,
    exclusions: Option<Vec<HashRange>>,
) -> Result<Vec<u8>> {
    let mut hasher_enum = Hasher::new(alg)?;

    let data_len = data.seek(SeekFrom::End(0))? as usize;
    data.rewind()?;

    let mut ranges = exclusions.unwrap_or_default();
    ranges.sort_by_key(|r| r.start());

    // convert the exclusions into the ranges that are hashed
    let mut included: Vec<(usize, usize)> = Vec::new();
    let mut pos = 0usize;
    for r in &ranges {
        if r.start() < pos || r.end() > data_len {
            return Err(Error::HashMismatch(format!(
                "exclusion {}..{} outside the asset",
                r.start(),
                r.end()
            )));
        }
        if r.start() > pos {
            included.push((pos, r.start() - pos));
        }
        pos = r.end();
    }
    if pos < data_len {
        included.push((pos, data_len - pos));
    }

    for (start, len) in included {
        data.seek(SeekFrom::Start(start as u64))?;

        let mut remaining = len;
        let mut chunk = vec![0u8; std::cmp::min(remaining, MAX_HASH_BUF)];
        while remaining > 0 {
            let n = std::cmp::min(remaining, chunk.len());
            data.read_exact(&mut chunk[..n])?;
            hasher_enum.update(&chunk[..n]);
            remaining -= n;
        }
    }

    Ok(Hasher::finalize(hasher_enum))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn exclusions_are_skipped() {
        let data = b"0123456789abcdef";
        let expected = hash_sha256(b"0123cdef");

        let exclusions = vec![HashRange::new(8, 4), HashRange::new(4, 4)];
        let hash = hash_by_alg("sha256", data, Some(exclusions)).unwrap();
        assert_eq!(hash, expected);

        let merged = hash_by_alg("sha256", data, Some(vec![HashRange::new(4, 8)])).unwrap();
        assert_eq!(merged, expected);
    }

    #[test]
    fn algorithms() {
        assert_eq!(hash_by_alg("sha256", b"abc", None).unwrap().len(), 32);
        assert_eq!(hash_by_alg("sha384", b"abc", None).unwrap().len(), 48);
        assert_eq!(hash_by_alg("sha512", b"abc", None).unwrap().len(), 64);
        assert!(matches!(
            hash_by_alg("md5", b"abc", None),
            Err(Error::BadParam(_))
        ));
    }

    #[test]
    fn bad_exclusions() {
        assert!(hash_by_alg("sha256", b"0123", Some(vec![HashRange::new(2, 8)])).is_err());
        assert!(hash_by_alg(
            "sha256",
            b"0123456789",
            Some(vec![HashRange::new(2, 4), HashRange::new(3, 2)])
        )
        .is_err());
    }
}
