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

//! Generation and parsing of the ISO BMFF / JUMBF boxes that make up a
//! manifest store.
//!
//!  # References
//!
//!  - [ISO BMFF Byte Stream Format](https://w3c.github.io/media-source/isobmff-byte-stream-format.html)
//!  - [JPEG universal metadata box format](https://www.iso.org/standard/73604.html)

use std::{
    any::Any,
    fmt,
    io::{Cursor, Read, Result as IoResult, Seek, SeekFrom, Write},
};

use byteorder::{BigEndian, ReadBytesExt};
use hex::FromHex;
use log::debug;
use thiserror::Error;

/// `JumbfParseError` enumerates errors detected while parsing JUMBF data
/// structures.
#[derive(Debug, Error)]
pub enum JumbfParseError {
    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("invalid box header")]
    InvalidBoxHeader,

    #[error("box extends past its container")]
    InvalidBoxRange,

    #[error("invalid JUMBF header")]
    InvalidJumbfHeader,

    #[error("invalid JUMB box")]
    InvalidJumbBox,

    #[error("invalid JSON box")]
    InvalidJsonBox,

    #[error("invalid CBOR box")]
    InvalidCborBox,

    #[error("invalid embedded file box")]
    InvalidEmbeddedFileBox,

    #[error("expected JUMD")]
    ExpectedJumdError,

    #[error("invalid JUMD box")]
    InvalidDescriptionBox,

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// A specialized `JumbfParseResult` type for JUMBF parsing operations.
pub type JumbfParseResult<T> = std::result::Result<T, JumbfParseError>;

//-----------------
// ANCHOR ISO BMFF
//-----------------
macro_rules! write_u8 {
    ($w:expr, $n:expr) => {{
        use byteorder::WriteBytesExt;
        $w.write_u8($n)?
    }};
}
macro_rules! write_u32 {
    ($w:expr, $n:expr) => {{
        use byteorder::{BigEndian, WriteBytesExt};
        $w.write_u32::<BigEndian>($n)?;
    }};
}
macro_rules! write_all {
    ($w:expr, $n:expr) => {
        $w.write_all($n)?;
    };
}
macro_rules! box_size {
    ($b:expr) => {
        $b.box_size()?
    };
}
macro_rules! boxes_size {
    ($b:expr) => {{
        let mut size = 0;
        for b in $b.iter() {
            size += box_size!(b);
        }
        size
    }};
}

/// Size of a box header (LBox + TBox).
pub const HEADER_SIZE: u64 = 8;

/// Counts the bytes written through it.
struct ByteCounter {
    count: u64,
}

impl ByteCounter {
    fn calculate<F>(f: F) -> IoResult<u64>
    where
        F: FnOnce(&mut dyn Write) -> IoResult<()>,
    {
        let mut counter = ByteCounter { count: 0 };
        f(&mut counter)?;
        Ok(counter.count)
    }
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

fn too_large() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, "box too large")
}

fn len_u32(len: usize) -> IoResult<u32> {
    u32::try_from(len).map_err(|_| too_large())
}

/// ISO BMFF box.
pub trait BMFFBox: Any {
    /// Box type code.
    fn box_type(&self) -> &'static [u8; 4];

    /// Box size.
    fn box_size(&self) -> IoResult<u32> {
        (HEADER_SIZE as u32)
            .checked_add(self.box_payload_size()?)
            .ok_or_else(too_large)
    }

    /// Payload size of the box.
    fn box_payload_size(&self) -> IoResult<u32>;

    /// Writes the box to the given writer.
    fn write_box(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_u32!(writer, self.box_size()?);
        write_all!(writer, self.box_type());

        self.write_box_payload(writer)
    }

    /// Writes the payload of the box to the given writer.
    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()>;

    // Necessary method to enable conversion between types...
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn BMFFBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BMFFBox")
            .field("type", &String::from_utf8_lossy(self.box_type()))
            .field("size", &self.box_size().ok())
            .finish()
    }
}

//---------------
// SECTION JUMBF
//---------------

pub const JUMBF_EMBEDDED_FILE_UUID: &str = "40CB0C32BB8A489DA70B2AD6F47F4369";

pub const CAI_BLOCK_UUID: &str = "6332706100110010800000AA00389B71"; // c2pa
pub const CAI_STORE_UUID: &str = "63326D6100110010800000AA00389B71"; // c2ma
pub const CAI_ASSERTION_STORE_UUID: &str = "6332617300110010800000AA00389B71"; // c2as
pub const CAI_JSON_ASSERTION_UUID: &str = "6A736F6E00110010800000AA00389B71"; // json
pub const CAI_CBOR_ASSERTION_UUID: &str = "63626F7200110010800000AA00389B71"; // cbor
pub const CAI_CLAIM_UUID: &str = "6332636C00110010800000AA00389B71"; // c2cl
pub const CAI_SIGNATURE_UUID: &str = "6332637300110010800000AA00389B71"; // c2cs

const TOGGLE_REQUESTABLE: u8 = 0x01;
const TOGGLE_LABEL: u8 = 0x02;
const TOGGLE_ID: u8 = 0x04;
const TOGGLE_SIGNATURE: u8 = 0x08;
const TOGGLE_PRIVATE: u8 = 0x10;

// ANCHOR JUMBF superbox
/// JUMBF superbox (ISO 19566-5:2019, Annex A)
#[derive(Debug)]
pub struct JUMBFSuperBox {
    desc_box: JUMBFDescriptionBox,
    data_boxes: Vec<Box<dyn BMFFBox>>,
    // where the box was found, when it was read rather than built
    offset: Option<u64>,
    size: u64,
}

impl JUMBFSuperBox {
    pub fn new(box_label: &str, a_type: Option<&str>) -> Self {
        JUMBFSuperBox::from(JUMBFDescriptionBox::new(box_label, a_type))
    }

    pub fn from(a_box: JUMBFDescriptionBox) -> Self {
        JUMBFSuperBox {
            desc_box: a_box,
            data_boxes: vec![],
            offset: None,
            size: 0,
        }
    }

    pub fn add_data_box(&mut self, b: Box<dyn BMFFBox>) {
        self.data_boxes.push(b)
    }

    // getters
    pub fn desc_box(&self) -> &JUMBFDescriptionBox {
        &self.desc_box
    }

    /// Byte range `(offset, size)` this box occupied in the data it was
    /// read from.
    pub fn source_range(&self) -> Option<(u64, u64)> {
        self.offset.map(|o| (o, self.size))
    }

    fn data_box<T: BMFFBox>(&self, index: usize) -> Option<&T> {
        self.data_boxes
            .get(index)
            .and_then(|b| b.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn data_box_as_json_box(&self, index: usize) -> Option<&JUMBFJSONContentBox> {
        self.data_box::<JUMBFJSONContentBox>(index)
    }

    pub fn data_box_as_cbor_box(&self, index: usize) -> Option<&JUMBFCBORContentBox> {
        self.data_box::<JUMBFCBORContentBox>(index)
    }

    pub fn data_box_as_embedded_file_content_box(
        &self,
        index: usize,
    ) -> Option<&JUMBFEmbeddedFileContentBox> {
        self.data_box::<JUMBFEmbeddedFileContentBox>(index)
    }

    pub fn data_box_as_embedded_media_type_box(
        &self,
        index: usize,
    ) -> Option<&JUMBFEmbeddedFileDescriptionBox> {
        self.data_box::<JUMBFEmbeddedFileDescriptionBox>(index)
    }

    /// Iterates the child superboxes.
    pub fn superboxes(&self) -> impl Iterator<Item = &JUMBFSuperBox> {
        self.data_boxes
            .iter()
            .filter_map(|b| b.as_ref().as_any().downcast_ref::<JUMBFSuperBox>())
    }

    /// Serializes the whole box, header included.
    pub fn to_bytes(&self) -> IoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.box_size()? as usize);
        self.write_box(&mut out)?;
        Ok(out)
    }
}

impl BMFFBox for JUMBFSuperBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"jumb"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        let mut size = box_size!(self.desc_box);
        if !self.data_boxes.is_empty() {
            size += boxes_size!(self.data_boxes)
        }
        Ok(size)
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        self.desc_box.write_box(writer)?;
        for b in &self.data_boxes {
            b.write_box(writer)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR JUMBF Description box
/// JUMBF Description box (ISO 19566-5:2019, Annex A)
#[derive(Debug)]
pub struct JUMBFDescriptionBox {
    box_uuid: [u8; 16],           // a 128-bit UUID for the type
    toggles: u8,                  // bit field for valid values
    label: String,                // UTF-8, written null terminated
    box_id: Option<u32>,          // user assigned value
    signature: Option<[u8; 32]>,  // SHA-256 hash of the payload
    private: Option<Vec<u8>>,     // private box, kept as raw bytes
}

impl JUMBFDescriptionBox {
    /// Makes a new `JUMBFDescriptionBox` instance.
    pub fn new(box_label: &str, a_type: Option<&str>) -> Self {
        JUMBFDescriptionBox {
            box_uuid: a_type
                .and_then(|t| <[u8; 16]>::from_hex(t).ok())
                .unwrap_or([0u8; 16]),
            toggles: TOGGLE_REQUESTABLE | TOGGLE_LABEL,
            label: box_label.to_owned(),
            box_id: None,
            signature: None,
            private: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn uuid(&self) -> String {
        hex::encode_upper(self.box_uuid)
    }
}

impl BMFFBox for JUMBFDescriptionBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"jumd"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        let size = ByteCounter::calculate(|w| self.write_box_payload(w))?;
        u32::try_from(size).map_err(|_| too_large())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_all!(writer, &self.box_uuid);
        write_u8!(writer, self.toggles);

        if self.toggles & TOGGLE_LABEL != 0 {
            write_all!(writer, self.label.as_bytes());
            write_u8!(writer, 0);
        }

        if let Some(x) = self.box_id {
            write_u32!(writer, x);
        }

        if let Some(x) = self.signature {
            write_all!(writer, &x);
        }

        if let Some(private) = &self.private {
            write_all!(writer, private);
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR Padding Content Box
/// Padding Content Box ('free')
#[derive(Debug)]
pub struct JUMBFPaddingContentBox {
    padding: Vec<u8>,
}

impl JUMBFPaddingContentBox {
    /// A padding box of `box_size` zero bytes of payload.
    pub fn new(box_size: usize) -> Self {
        JUMBFPaddingContentBox {
            padding: vec![0u8; box_size],
        }
    }
}

impl BMFFBox for JUMBFPaddingContentBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"free"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        len_u32(self.padding.len())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_all!(writer, &self.padding);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR JSON Content box
/// JSON Content box (ISO 19566-5:2019, Annex B)
#[derive(Debug)]
pub struct JUMBFJSONContentBox {
    json: Vec<u8>,
}

impl JUMBFJSONContentBox {
    pub fn new(json_in: Vec<u8>) -> Self {
        JUMBFJSONContentBox { json: json_in }
    }

    pub fn json(&self) -> &[u8] {
        &self.json
    }
}

impl BMFFBox for JUMBFJSONContentBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"json"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        len_u32(self.json.len())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_all!(writer, &self.json);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR CBOR Content box
/// CBOR Content box (ISO 19566-5:2019, Annex C)
#[derive(Debug)]
pub struct JUMBFCBORContentBox {
    cbor: Vec<u8>,
}

impl JUMBFCBORContentBox {
    pub fn new(cbor_in: Vec<u8>) -> Self {
        JUMBFCBORContentBox { cbor: cbor_in }
    }

    pub fn cbor(&self) -> &[u8] {
        &self.cbor
    }
}

impl BMFFBox for JUMBFCBORContentBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"cbor"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        len_u32(self.cbor.len())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_all!(writer, &self.cbor);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR Embedded file description box
/// Embedded file description box ('bfdb')
#[derive(Debug)]
pub struct JUMBFEmbeddedFileDescriptionBox {
    toggles: u8,
    media_type: String,
    file_name: Option<String>,
}

impl JUMBFEmbeddedFileDescriptionBox {
    pub fn new(media_type: String, file_name: Option<String>) -> Self {
        JUMBFEmbeddedFileDescriptionBox {
            toggles: if file_name.is_some() { 1 } else { 0 },
            media_type,
            file_name,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

impl BMFFBox for JUMBFEmbeddedFileDescriptionBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"bfdb"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        let size = ByteCounter::calculate(|w| self.write_box_payload(w))?;
        u32::try_from(size).map_err(|_| too_large())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_u8!(writer, self.toggles);
        write_all!(writer, self.media_type.as_bytes());
        write_u8!(writer, 0);

        if let Some(name) = &self.file_name {
            write_all!(writer, name.as_bytes());
            write_u8!(writer, 0);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR Embedded file content box
/// Embedded file content box ('bidb')
#[derive(Debug)]
pub struct JUMBFEmbeddedFileContentBox {
    data: Vec<u8>,
}

impl JUMBFEmbeddedFileContentBox {
    pub fn new(data_in: Vec<u8>) -> Self {
        JUMBFEmbeddedFileContentBox { data: data_in }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl BMFFBox for JUMBFEmbeddedFileContentBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"bidb"
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        len_u32(self.data.len())
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        write_all!(writer, &self.data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ANCHOR Raw superbox
/// A previously serialized superbox, written back byte for byte.
#[derive(Debug)]
pub struct JUMBFRawBox {
    bytes: Vec<u8>,
}

impl JUMBFRawBox {
    /// `bytes` must hold a complete box, header included.
    pub fn new(bytes: Vec<u8>) -> Self {
        JUMBFRawBox { bytes }
    }
}

impl BMFFBox for JUMBFRawBox {
    fn box_type(&self) -> &'static [u8; 4] {
        b"jumb"
    }

    fn box_size(&self) -> IoResult<u32> {
        len_u32(self.bytes.len())
    }

    fn box_payload_size(&self) -> IoResult<u32> {
        len_u32(self.bytes.len().saturating_sub(HEADER_SIZE as usize))
    }

    fn write_box(&self, writer: &mut dyn Write) -> IoResult<()> {
        writer.write_all(&self.bytes)
    }

    fn write_box_payload(&self, writer: &mut dyn Write) -> IoResult<()> {
        writer.write_all(self.bytes.get(HEADER_SIZE as usize..).unwrap_or_default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//---------------
// SECTION Reading
//---------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxType {
    Jumb,
    Jumd,
    Json,
    Cbor,
    Padding,
    EmbedMediaDesc,
    EmbedContent,
    Other([u8; 4]),
    Empty,
}

impl From<[u8; 4]> for BoxType {
    fn from(tbox: [u8; 4]) -> Self {
        match &tbox {
            b"jumb" => BoxType::Jumb,
            b"jumd" => BoxType::Jumd,
            b"json" => BoxType::Json,
            b"cbor" => BoxType::Cbor,
            b"free" => BoxType::Padding,
            b"bfdb" => BoxType::EmbedMediaDesc,
            b"bidb" => BoxType::EmbedContent,
            _ => BoxType::Other(tbox),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxHeader {
    pub name: BoxType,
    pub size: u64,
}

pub struct BoxReader {}

impl BoxReader {
    /// Reads an 8 byte box header. Returns `BoxType::Empty` at end of data.
    pub fn read_header<R: Read>(reader: &mut R) -> JumbfParseResult<BoxHeader> {
        let mut buf = [0u8; 8];
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        match filled {
            0 => {
                return Ok(BoxHeader {
                    name: BoxType::Empty,
                    size: 0,
                })
            }
            8 => (),
            _ => return Err(JumbfParseError::UnexpectedEof),
        }

        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as u64;
        // extended and to-end-of-file sizes never appear in manifest stores
        if size < HEADER_SIZE {
            return Err(JumbfParseError::InvalidBoxHeader);
        }

        Ok(BoxHeader {
            name: BoxType::from([buf[4], buf[5], buf[6], buf[7]]),
            size,
        })
    }

    fn read_payload<R: Read>(reader: &mut R, header: &BoxHeader) -> JumbfParseResult<Vec<u8>> {
        let len = header.size - HEADER_SIZE;
        let mut payload = Vec::new();
        reader.take(len).read_to_end(&mut payload)?;
        if payload.len() as u64 != len {
            return Err(JumbfParseError::UnexpectedEof);
        }
        Ok(payload)
    }

    fn read_desc_box(payload: &[u8]) -> JumbfParseResult<JUMBFDescriptionBox> {
        let mut reader = Cursor::new(payload);

        let mut box_uuid = [0u8; 16];
        reader
            .read_exact(&mut box_uuid)
            .map_err(|_| JumbfParseError::InvalidDescriptionBox)?;
        let toggles = reader
            .read_u8()
            .map_err(|_| JumbfParseError::InvalidDescriptionBox)?;

        let mut label = String::new();
        if toggles & TOGGLE_LABEL != 0 {
            let start = reader.position() as usize;
            let rest = &payload[start..];
            let nul = rest
                .iter()
                .position(|b| *b == 0)
                .ok_or(JumbfParseError::InvalidDescriptionBox)?;
            label = std::str::from_utf8(&rest[..nul])
                .map_err(|_| JumbfParseError::InvalidDescriptionBox)?
                .to_owned();
            reader.set_position((start + nul + 1) as u64);
        }

        let box_id = if toggles & TOGGLE_ID != 0 {
            Some(
                reader
                    .read_u32::<BigEndian>()
                    .map_err(|_| JumbfParseError::InvalidDescriptionBox)?,
            )
        } else {
            None
        };

        let signature = if toggles & TOGGLE_SIGNATURE != 0 {
            let mut sig = [0u8; 32];
            reader
                .read_exact(&mut sig)
                .map_err(|_| JumbfParseError::InvalidDescriptionBox)?;
            Some(sig)
        } else {
            None
        };

        let private = if toggles & TOGGLE_PRIVATE != 0 {
            let start = reader.position() as usize;
            Some(payload[start..].to_vec())
        } else {
            None
        };

        Ok(JUMBFDescriptionBox {
            box_uuid,
            toggles,
            label,
            box_id,
            signature,
            private,
        })
    }

    fn read_embedded_media_desc_box(
        payload: &[u8],
    ) -> JumbfParseResult<JUMBFEmbeddedFileDescriptionBox> {
        let (toggles, rest) = payload
            .split_first()
            .ok_or(JumbfParseError::InvalidEmbeddedFileBox)?;

        let mut parts = rest.split(|b| *b == 0);
        let media_type = parts
            .next()
            .and_then(|p| std::str::from_utf8(p).ok())
            .ok_or(JumbfParseError::InvalidEmbeddedFileBox)?
            .to_owned();

        let file_name = if toggles & 1 != 0 {
            parts
                .next()
                .and_then(|p| std::str::from_utf8(p).ok())
                .map(str::to_owned)
        } else {
            None
        };

        Ok(JUMBFEmbeddedFileDescriptionBox {
            toggles: *toggles,
            media_type,
            file_name,
        })
    }

    /// Reads one superbox starting at the current position.
    ///
    /// The box must fit in the remaining data; offsets recorded on the
    /// returned boxes are absolute positions in `reader`.
    pub fn read_super_box<R: Read + Seek>(reader: &mut R) -> JumbfParseResult<JUMBFSuperBox> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        Self::read_bounded_super_box(reader, end)
    }

    fn read_bounded_super_box<R: Read + Seek>(
        reader: &mut R,
        limit: u64,
    ) -> JumbfParseResult<JUMBFSuperBox> {
        let start_pos = reader.stream_position()?;

        let jumb_header = BoxReader::read_header(reader)?;
        match jumb_header.name {
            BoxType::Empty => return Err(JumbfParseError::UnexpectedEof),
            BoxType::Jumb => (),
            _ => return Err(JumbfParseError::InvalidJumbfHeader),
        }

        // figure out where this particular box ends...
        let dest_pos = start_pos + jumb_header.size;
        if dest_pos > limit {
            return Err(JumbfParseError::InvalidBoxRange);
        }

        let jumd_header = BoxReader::read_header(reader)?;
        if jumd_header.name != BoxType::Jumd {
            return Err(JumbfParseError::ExpectedJumdError);
        }
        if reader.stream_position()? - HEADER_SIZE + jumd_header.size > dest_pos {
            return Err(JumbfParseError::InvalidBoxRange);
        }

        let jdesc = BoxReader::read_desc_box(&BoxReader::read_payload(reader, &jumd_header)?)?;
        debug!("START#Label: {:?}", jdesc.label());

        let mut sbox = JUMBFSuperBox::from(jdesc);
        sbox.offset = Some(start_pos);
        sbox.size = jumb_header.size;

        loop {
            let pos = reader.stream_position()?;
            if pos == dest_pos {
                break;
            }

            let box_header = BoxReader::read_header(reader)?;
            if box_header.name == BoxType::Empty {
                return Err(JumbfParseError::UnexpectedEof);
            }
            if pos + box_header.size > dest_pos {
                return Err(JumbfParseError::InvalidBoxRange);
            }

            let next_box: Box<dyn BMFFBox> = match box_header.name {
                BoxType::Jumb => {
                    reader.seek(SeekFrom::Start(pos))?;
                    Box::new(BoxReader::read_bounded_super_box(reader, dest_pos)?)
                }
                BoxType::Json => Box::new(JUMBFJSONContentBox::new(
                    BoxReader::read_payload(reader, &box_header)
                        .map_err(|_| JumbfParseError::InvalidJsonBox)?,
                )),
                BoxType::Cbor => Box::new(JUMBFCBORContentBox::new(
                    BoxReader::read_payload(reader, &box_header)
                        .map_err(|_| JumbfParseError::InvalidCborBox)?,
                )),
                BoxType::Padding => Box::new(JUMBFPaddingContentBox {
                    padding: BoxReader::read_payload(reader, &box_header)?,
                }),
                BoxType::EmbedMediaDesc => Box::new(BoxReader::read_embedded_media_desc_box(
                    &BoxReader::read_payload(reader, &box_header)?,
                )?),
                BoxType::EmbedContent => Box::new(JUMBFEmbeddedFileContentBox::new(
                    BoxReader::read_payload(reader, &box_header)
                        .map_err(|_| JumbfParseError::InvalidEmbeddedFileBox)?,
                )),
                BoxType::Jumd => return Err(JumbfParseError::InvalidJumbBox),
                BoxType::Other(tbox) => {
                    debug!("skipping unknown box {:?}", String::from_utf8_lossy(&tbox));
                    reader.seek(SeekFrom::Start(pos + box_header.size))?;
                    continue;
                }
                BoxType::Empty => return Err(JumbfParseError::UnexpectedEof),
            };
            sbox.add_data_box(next_box);
        }

        debug!("END#Label: {:?}", sbox.desc_box().label());
        Ok(sbox)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sample_store() -> JUMBFSuperBox {
        let mut store = JUMBFSuperBox::new("c2pa", Some(CAI_BLOCK_UUID));

        let mut manifest = JUMBFSuperBox::new("urn:uuid:1234", Some(CAI_STORE_UUID));

        let mut claim = JUMBFSuperBox::new("c2pa.claim", Some(CAI_CLAIM_UUID));
        claim.add_data_box(Box::new(JUMBFCBORContentBox::new(vec![0xa0])));
        manifest.add_data_box(Box::new(claim));

        let mut sig = JUMBFSuperBox::new("c2pa.signature", Some(CAI_SIGNATURE_UUID));
        sig.add_data_box(Box::new(JUMBFCBORContentBox::new(vec![])));
        sig.add_data_box(Box::new(JUMBFPaddingContentBox::new(20)));
        manifest.add_data_box(Box::new(sig));

        let mut thumb =
            JUMBFSuperBox::new("c2pa.thumbnail.claim.jpeg", Some(JUMBF_EMBEDDED_FILE_UUID));
        thumb.add_data_box(Box::new(JUMBFEmbeddedFileDescriptionBox::new(
            "image/jpeg".to_string(),
            None,
        )));
        thumb.add_data_box(Box::new(JUMBFEmbeddedFileContentBox::new(vec![1, 2, 3])));
        manifest.add_data_box(Box::new(thumb));

        store.add_data_box(Box::new(manifest));
        store
    }

    #[test]
    fn write_and_read_store() {
        let bytes = sample_store().to_bytes().unwrap();
        assert_eq!(&bytes[4..8], b"jumb");

        let sbox = BoxReader::read_super_box(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(sbox.desc_box().label(), "c2pa");
        assert_eq!(sbox.desc_box().uuid(), CAI_BLOCK_UUID);
        assert_eq!(sbox.source_range(), Some((0, bytes.len() as u64)));

        let manifest = sbox.superboxes().next().unwrap();
        assert_eq!(manifest.desc_box().uuid(), CAI_STORE_UUID);

        let labels: Vec<&str> = manifest.superboxes().map(|b| b.desc_box().label()).collect();
        assert_eq!(
            labels,
            ["c2pa.claim", "c2pa.signature", "c2pa.thumbnail.claim.jpeg"]
        );

        let mut children = manifest.superboxes();
        let claim = children.next().unwrap();
        assert_eq!(claim.data_box_as_cbor_box(0).unwrap().cbor(), &[0xa0]);

        // cbor signature followed by its padding box
        let sig = children.next().unwrap();
        assert!(sig.data_box_as_cbor_box(0).is_some());
        assert!(sig.data_box_as_cbor_box(1).is_none());

        let thumb = children.next().unwrap();
        assert_eq!(
            thumb.data_box_as_embedded_media_type_box(0).unwrap().media_type(),
            "image/jpeg"
        );
        assert_eq!(
            thumb.data_box_as_embedded_file_content_box(1).unwrap().data(),
            &[1, 2, 3]
        );

        // the same structure serializes to the same bytes
        assert_eq!(sbox.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn raw_box_is_verbatim() {
        let bytes = sample_store().to_bytes().unwrap();
        let sbox = BoxReader::read_super_box(&mut Cursor::new(&bytes)).unwrap();
        let (offset, size) = sbox.superboxes().next().unwrap().source_range().unwrap();

        let raw = bytes[offset as usize..(offset + size) as usize].to_vec();
        let mut store = JUMBFSuperBox::new("c2pa", Some(CAI_BLOCK_UUID));
        store.add_data_box(Box::new(JUMBFRawBox::new(raw)));

        assert_eq!(store.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn truncated_store() {
        let bytes = sample_store().to_bytes().unwrap();

        for cut in [4, 12, 40, bytes.len() / 2, bytes.len() - 1] {
            let result = BoxReader::read_super_box(&mut Cursor::new(&bytes[..cut]));
            assert!(result.is_err(), "cut at {cut} should fail");
        }
    }

    #[test]
    fn child_larger_than_parent() {
        let mut bytes = sample_store().to_bytes().unwrap();
        // inflate the first child superbox's length past the parent
        let child = 8 + JUMBFDescriptionBox::new("c2pa", Some(CAI_BLOCK_UUID))
            .box_size()
            .unwrap() as usize;
        bytes[child..child + 4].copy_from_slice(&u32::MAX.to_be_bytes());

        assert!(matches!(
            BoxReader::read_super_box(&mut Cursor::new(&bytes)),
            Err(JumbfParseError::InvalidBoxRange)
        ));
    }

    #[test]
    fn label_without_terminator() {
        let mut desc = Vec::new();
        desc.extend_from_slice(&<[u8; 16]>::from_hex(CAI_BLOCK_UUID).unwrap());
        desc.push(TOGGLE_REQUESTABLE | TOGGLE_LABEL);
        desc.extend_from_slice(b"c2pa");

        assert!(matches!(
            BoxReader::read_desc_box(&desc),
            Err(JumbfParseError::InvalidDescriptionBox)
        ));
    }
}
