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

//! Reading and writing manifest stores in JPEG APP11 segments.
//!
//! The store is split across one or more APP11 segments, each laid out as
//!
//! ```text
//! FF EB | Le | "JP" | En | Z | LBox TBox | data
//! ```
//!
//! where `En` identifies the box instance, `Z` is the 1-based sequence
//! number and `LBox TBox` is the JUMBF superbox header, repeated in every
//! segment. Only the marker structure is parsed; entropy coded data after
//! SOS is copied untouched.

use std::{
    collections::BTreeSet,
    io::{Cursor, Read, SeekFrom},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::{
    asset_io::{
        AssetIO, CAIRead, CAIReadWrite, CAIReader, CAIWriter, HashBlockObjectType,
        HashObjectPositions,
    },
    error::{Error, Result},
};

static SUPPORTED_TYPES: [&str; 3] = ["jpg", "jpeg", "image/jpeg"];

const SOI: u8 = 0xd8;
const EOI: u8 = 0xd9;
const SOS: u8 = 0xda;
const APP0: u8 = 0xe0;
const APP1: u8 = 0xe1;
const APP11: u8 = 0xeb;

// c2pa superbox UUID as it appears in the jumd box
const C2PA_UUID: [u8; 16] = [
    0x63, 0x32, 0x70, 0x61, 0x00, 0x11, 0x00, 0x10, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

// CI + En + Z
const APP11_HEADER_LEN: usize = 8;
// LBox + TBox
const JUMBF_HEADER_LEN: usize = 8;
// Le(2) + APP11 header + JUMBF header + data must fit in 65535
const MAX_APP11_DATA: usize = 65535 - 2 - APP11_HEADER_LEN - JUMBF_HEADER_LEN;

#[derive(Clone, Copy, Debug)]
struct App11Header {
    en: u16,
    z: u32,
    starts_c2pa: bool,
}

#[derive(Debug)]
struct Segment {
    marker: u8,
    // first byte of the segment, fill bytes included
    offset: u64,
    size: u64,
    // segment body, after the length field
    body_offset: u64,
    body_len: u64,
    app11: Option<App11Header>,
}

impl Segment {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

fn truncated(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::InvalidAsset("JPEG is truncated".to_string())
    } else {
        Error::IoError(e)
    }
}

fn read_app11_header(reader: &mut dyn CAIRead, body_len: u64) -> Result<Option<App11Header>> {
    // too short to hold a JUMBF box
    if body_len < (APP11_HEADER_LEN + JUMBF_HEADER_LEN) as u64 {
        return Ok(None);
    }

    let mut buf = vec![0u8; std::cmp::min(body_len, 40) as usize];
    reader.read_exact(&mut buf).map_err(truncated)?;

    if &buf[0..2] != b"JP" {
        return Ok(None);
    }

    let en = u16::from_be_bytes([buf[2], buf[3]]);
    let z = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let starts_c2pa = z == 1 && buf.len() == 40 && buf[24..40] == C2PA_UUID;

    Ok(Some(App11Header { en, z, starts_c2pa }))
}

/// Walks the marker segments up to SOS or EOI.
fn parse_segments(reader: &mut dyn CAIRead, stop_at_c2pa: bool) -> Result<Vec<Segment>> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.rewind()?;

    let mut soi = [0u8; 2];
    reader.read_exact(&mut soi).map_err(truncated)?;
    if soi != [0xff, SOI] {
        return Err(Error::InvalidAsset("missing JPEG SOI marker".to_string()));
    }

    let mut segments = vec![Segment {
        marker: SOI,
        offset: 0,
        size: 2,
        body_offset: 2,
        body_len: 0,
        app11: None,
    }];

    loop {
        let offset = reader.stream_position()?;

        let mut b = reader.read_u8().map_err(truncated)?;
        if b != 0xff {
            return Err(Error::InvalidAsset(format!(
                "expected JPEG marker at offset {offset}"
            )));
        }
        // skip fill bytes
        while b == 0xff {
            b = reader.read_u8().map_err(truncated)?;
        }
        let marker = b;

        match marker {
            0x00 => {
                return Err(Error::InvalidAsset(format!(
                    "invalid JPEG marker at offset {offset}"
                )))
            }
            SOS | EOI => {
                // everything from here on is copied as is
                segments.push(Segment {
                    marker,
                    offset,
                    size: len - offset,
                    body_offset: reader.stream_position()?,
                    body_len: 0,
                    app11: None,
                });
                break;
            }
            0x01 | 0xd0..=0xd7 => {
                let pos = reader.stream_position()?;
                segments.push(Segment {
                    marker,
                    offset,
                    size: pos - offset,
                    body_offset: pos,
                    body_len: 0,
                    app11: None,
                });
                continue;
            }
            _ => (),
        }

        let le = reader.read_u16::<BigEndian>().map_err(truncated)? as u64;
        if le < 2 {
            return Err(Error::InvalidAsset(format!(
                "invalid segment length at offset {offset}"
            )));
        }

        let body_offset = reader.stream_position()?;
        let body_len = le - 2;
        let end = body_offset + body_len;
        if end > len {
            return Err(Error::InvalidAsset(format!(
                "segment at offset {offset} extends past the end of the file"
            )));
        }

        let app11 = if marker == APP11 {
            read_app11_header(reader, body_len)?
        } else {
            None
        };

        segments.push(Segment {
            marker,
            offset,
            size: end - offset,
            body_offset,
            body_len,
            app11,
        });

        if stop_at_c2pa && app11.map_or(false, |h| h.starts_c2pa) {
            break;
        }

        reader.seek(SeekFrom::Start(end))?;
    }

    Ok(segments)
}

/// Indices of the segments holding the first manifest store, in order.
fn c2pa_segment_indices(segments: &[Segment]) -> Result<Vec<usize>> {
    let mut store_en = None;
    let mut next_z = 1u32;
    let mut indices = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        let Some(header) = seg.app11 else {
            continue;
        };

        match store_en {
            None if header.starts_c2pa => {
                store_en = Some(header.en);
                next_z = 2;
                indices.push(i);
            }
            Some(en) if header.en == en => {
                if header.z != next_z {
                    return Err(Error::InvalidAsset(format!(
                        "C2PA segment {} found where {next_z} was expected",
                        header.z
                    )));
                }
                next_z += 1;
                indices.push(i);
            }
            _ => (),
        }
    }

    Ok(indices)
}

/// Smallest box instance number not used by other JUMBF segments.
fn free_box_instance(segments: &[Segment], c2pa: &[usize]) -> u16 {
    let used: BTreeSet<u16> = segments
        .iter()
        .enumerate()
        .filter(|(i, _)| !c2pa.contains(i))
        .filter_map(|(_, s)| s.app11.map(|h| h.en))
        .collect();

    (1..=u16::MAX).find(|en| !used.contains(en)).unwrap_or(1)
}

/// Splits a manifest store into APP11 segments.
fn make_c2pa_segments(store_bytes: &[u8], en: u16) -> Result<Vec<u8>> {
    if store_bytes.len() < JUMBF_HEADER_LEN {
        return Err(Error::BadParam("manifest store is too short".to_string()));
    }
    let (jumbf_header, data) = store_bytes.split_at(JUMBF_HEADER_LEN);

    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(MAX_APP11_DATA).collect()
    };

    let mut out = Vec::with_capacity(store_bytes.len() + chunks.len() * 20);
    for (i, chunk) in chunks.iter().enumerate() {
        let le = 2 + APP11_HEADER_LEN + JUMBF_HEADER_LEN + chunk.len();
        let z = u32::try_from(i + 1)
            .map_err(|_| Error::BadParam("manifest store is too large".to_string()))?;

        out.extend_from_slice(&[0xff, APP11]);
        out.write_u16::<BigEndian>(le as u16)?;
        out.extend_from_slice(b"JP");
        out.write_u16::<BigEndian>(en)?;
        out.write_u32::<BigEndian>(z)?;
        out.extend_from_slice(jumbf_header);
        out.extend_from_slice(chunk);
    }

    Ok(out)
}

/// Supports working with JPEG files
pub struct JpegIO {}

impl CAIReader for JpegIO {
    fn read_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<Vec<u8>> {
        let segments = parse_segments(asset_reader, false)?;
        let indices = c2pa_segment_indices(&segments)?;
        if indices.is_empty() {
            return Err(Error::JumbfNotFound);
        }

        let mut store = Vec::new();
        for (n, i) in indices.iter().enumerate() {
            let seg = &segments[*i];
            // the first segment keeps its box header, continuations repeat it
            let skip = if n == 0 {
                APP11_HEADER_LEN
            } else {
                APP11_HEADER_LEN + JUMBF_HEADER_LEN
            } as u64;

            asset_reader.seek(SeekFrom::Start(seg.body_offset + skip))?;
            Read::take(&mut *asset_reader, seg.body_len - skip).read_to_end(&mut store)?;
        }

        let box_len = u32::from_be_bytes([store[0], store[1], store[2], store[3]]) as usize;
        if box_len != store.len() {
            return Err(Error::InvalidAsset(format!(
                "C2PA box length {box_len} does not match {} bytes found",
                store.len()
            )));
        }

        debug!("read {} byte manifest store from {} segments", store.len(), indices.len());
        Ok(store)
    }

    fn has_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<bool> {
        let segments = parse_segments(asset_reader, true)?;
        Ok(segments.iter().any(|s| s.app11.map_or(false, |h| h.starts_c2pa)))
    }
}

impl CAIWriter for JpegIO {
    fn write_cai(
        &self,
        input_stream: &mut dyn CAIRead,
        output_stream: &mut dyn CAIReadWrite,
        store_bytes: &[u8],
    ) -> Result<()> {
        let mut source = Vec::new();
        input_stream.rewind()?;
        input_stream.read_to_end(&mut source)?;

        let segments = parse_segments(&mut Cursor::new(&source), false)?;
        let c2pa = c2pa_segment_indices(&segments)?;

        let insert_at = match c2pa.first() {
            Some(i) => segments[*i].offset,
            None => segments
                .iter()
                .skip(1)
                .take_while(|s| s.marker == APP0 || s.marker == APP1)
                .last()
                .unwrap_or(&segments[0])
                .end(),
        };

        let new_segments = if store_bytes.is_empty() {
            Vec::new()
        } else {
            make_c2pa_segments(store_bytes, free_box_instance(&segments, &c2pa))?
        };

        // copy everything except the old store, splicing in the new one
        let mut out = Vec::with_capacity(source.len() + new_segments.len());
        for (i, seg) in segments.iter().enumerate() {
            if seg.offset == insert_at {
                out.extend_from_slice(&new_segments);
            }
            if !c2pa.contains(&i) {
                out.extend_from_slice(&source[seg.offset as usize..seg.end() as usize]);
            }
        }

        output_stream.write_all(&out)?;
        output_stream.flush()?;
        Ok(())
    }

    fn get_object_locations_from_stream(
        &self,
        input_stream: &mut dyn CAIRead,
    ) -> Result<Vec<HashObjectPositions>> {
        let segments = parse_segments(input_stream, false)?;
        let c2pa = c2pa_segment_indices(&segments)?;
        let len = input_stream.seek(SeekFrom::End(0))? as usize;

        let mut positions: Vec<HashObjectPositions> = Vec::new();
        let mut pos = 0usize;
        for i in c2pa {
            let seg = &segments[i];
            let (start, size) = (seg.offset as usize, seg.size as usize);

            if start > pos {
                positions.push(HashObjectPositions {
                    offset: pos,
                    length: start - pos,
                    htype: HashBlockObjectType::Other,
                });
            }

            // merge adjacent store segments
            match positions.last_mut() {
                Some(last)
                    if last.htype == HashBlockObjectType::Cai
                        && last.offset + last.length == start =>
                {
                    last.length += size
                }
                _ => positions.push(HashObjectPositions {
                    offset: start,
                    length: size,
                    htype: HashBlockObjectType::Cai,
                }),
            }
            pos = start + size;
        }

        if pos < len {
            positions.push(HashObjectPositions {
                offset: pos,
                length: len - pos,
                htype: HashBlockObjectType::Other,
            });
        }

        Ok(positions)
    }

    fn remove_cai_store_from_stream(
        &self,
        input_stream: &mut dyn CAIRead,
        output_stream: &mut dyn CAIReadWrite,
    ) -> Result<()> {
        self.write_cai(input_stream, output_stream, &[])
    }
}

impl AssetIO for JpegIO {
    fn new(_asset_type: &str) -> Self
    where
        Self: Sized,
    {
        JpegIO {}
    }

    fn get_handler(&self, asset_type: &str) -> Box<dyn AssetIO> {
        Box::new(JpegIO::new(asset_type))
    }

    fn get_reader(&self) -> &dyn CAIReader {
        self
    }

    fn get_writer(&self, asset_type: &str) -> Option<Box<dyn CAIWriter>> {
        Some(Box::new(JpegIO::new(asset_type)))
    }

    fn supported_types(&self) -> &[&str] {
        &SUPPORTED_TYPES
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn magic_matches(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(&[0xff, SOI, 0xff])
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::utils::test::{fake_store, test_jpeg};

    fn embed(jpeg: &[u8], store: &[u8]) -> Vec<u8> {
        let mut output = Cursor::new(Vec::new());
        JpegIO {}
            .write_cai(&mut Cursor::new(jpeg), &mut output, store)
            .unwrap();
        output.into_inner()
    }

    fn without(data: &[u8], positions: &[HashObjectPositions]) -> Vec<u8> {
        positions
            .iter()
            .filter(|p| p.htype == HashBlockObjectType::Other)
            .flat_map(|p| data[p.offset..p.offset + p.length].to_vec())
            .collect()
    }

    #[test]
    fn no_store() {
        let jpeg = test_jpeg();
        let jpeg_io = JpegIO {};

        assert!(matches!(
            jpeg_io.read_cai(&mut Cursor::new(&jpeg)),
            Err(Error::JumbfNotFound)
        ));
        assert!(!jpeg_io.has_cai(&mut Cursor::new(&jpeg)).unwrap());

        let positions = jpeg_io
            .get_object_locations_from_stream(&mut Cursor::new(&jpeg))
            .unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].length, jpeg.len());
    }

    #[test]
    fn write_read_store() {
        let jpeg = test_jpeg();
        let store = fake_store(1000);
        let output = embed(&jpeg, &store);

        let jpeg_io = JpegIO {};
        assert!(jpeg_io.has_cai(&mut Cursor::new(&output)).unwrap());
        assert_eq!(jpeg_io.read_cai(&mut Cursor::new(&output)).unwrap(), store);

        // everything outside the store is untouched
        let positions = jpeg_io
            .get_object_locations_from_stream(&mut Cursor::new(&output))
            .unwrap();
        let cai: Vec<_> = positions
            .iter()
            .filter(|p| p.htype == HashBlockObjectType::Cai)
            .collect();
        assert_eq!(cai.len(), 1);
        assert_eq!(cai[0].length, store.len() + 4 + APP11_HEADER_LEN);
        assert_eq!(without(&output, &positions), jpeg);
    }

    #[test]
    fn store_follows_app0() {
        let jpeg = test_jpeg();
        let output = embed(&jpeg, &fake_store(100));

        // SOI, then the 18 byte APP0 segment of the test image
        assert_eq!(&output[0..4], &[0xff, SOI, 0xff, APP0]);
        assert_eq!(&output[20..22], &[0xff, APP11]);
    }

    #[test]
    fn replace_and_remove() {
        let jpeg = test_jpeg();
        let first = embed(&jpeg, &fake_store(5000));
        let second_store = fake_store(300);
        let second = embed(&first, &second_store);

        let jpeg_io = JpegIO {};
        assert_eq!(jpeg_io.read_cai(&mut Cursor::new(&second)).unwrap(), second_store);
        assert_eq!(second.len(), jpeg.len() + second_store.len() + 12);

        let mut removed = Cursor::new(Vec::new());
        jpeg_io
            .remove_cai_store_from_stream(&mut Cursor::new(&second), &mut removed)
            .unwrap();
        assert_eq!(removed.into_inner(), jpeg);
    }

    #[test]
    fn multi_segment_store() {
        let jpeg = test_jpeg();
        let store = fake_store(MAX_APP11_DATA * 2 + 100);
        let output = embed(&jpeg, &store);

        let segments = parse_segments(&mut Cursor::new(&output), false).unwrap();
        assert_eq!(c2pa_segment_indices(&segments).unwrap().len(), 3);

        let jpeg_io = JpegIO {};
        assert_eq!(jpeg_io.read_cai(&mut Cursor::new(&output)).unwrap(), store);

        let positions = jpeg_io
            .get_object_locations_from_stream(&mut Cursor::new(&output))
            .unwrap();
        assert_eq!(
            positions
                .iter()
                .filter(|p| p.htype == HashBlockObjectType::Cai)
                .count(),
            1
        );
        assert_eq!(without(&output, &positions), jpeg);
    }

    #[test]
    fn keeps_other_jumbf_segments() {
        // a non C2PA JUMBF box already using instance 1
        let mut other = vec![0xff, APP11, 0x00, 0x1a];
        other.extend_from_slice(b"JP");
        other.extend_from_slice(&[0, 1, 0, 0, 0, 1]);
        other.extend_from_slice(&[0, 0, 0, 0x10]);
        other.extend_from_slice(b"xml ");
        other.extend_from_slice(b"<x></x>\0");

        let jpeg = test_jpeg();
        let mut with_other = jpeg[..2].to_vec();
        with_other.extend_from_slice(&other);
        with_other.extend_from_slice(&jpeg[2..]);

        let output = embed(&with_other, &fake_store(64));
        let segments = parse_segments(&mut Cursor::new(&output), false).unwrap();
        let c2pa = c2pa_segment_indices(&segments).unwrap();
        assert_eq!(segments[c2pa[0]].app11.unwrap().en, 2);
        assert_eq!(
            segments
                .iter()
                .filter(|s| s.marker == APP11 && s.app11.map(|h| h.en) == Some(1))
                .count(),
            1
        );
    }

    #[test]
    fn truncated_jpeg() {
        let output = embed(&test_jpeg(), &fake_store(1000));
        let jpeg_io = JpegIO {};

        // cut inside the store segment
        let cut = &output[..200];
        assert!(matches!(
            jpeg_io.read_cai(&mut Cursor::new(cut)),
            Err(Error::InvalidAsset(_))
        ));

        // not a JPEG at all
        assert!(matches!(
            jpeg_io.read_cai(&mut Cursor::new(b"GIF89a")),
            Err(Error::InvalidAsset(_))
        ));
    }

    #[test]
    fn inconsistent_box_length() {
        let mut store = fake_store(1000);
        store[0..4].copy_from_slice(&2000u32.to_be_bytes());
        let output = embed(&test_jpeg(), &store);

        assert!(matches!(
            JpegIO {}.read_cai(&mut Cursor::new(&output)),
            Err(Error::InvalidAsset(_))
        ));
    }
}
