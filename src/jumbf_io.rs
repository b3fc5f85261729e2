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

use std::{collections::HashMap, io::Read};

use lazy_static::lazy_static;

use crate::{
    asset_handlers::{c2pa_io::C2paIO, jpeg_io::JpegIO},
    asset_io::{AssetIO, CAIRead, CAIReadWrite, CAIReader, CAIWriter, HashObjectPositions},
    error::{Error, Result},
};

// number of leading bytes inspected by format detection
const MAGIC_PREFIX_LEN: u64 = 16;

fn all_handlers() -> Vec<Box<dyn AssetIO>> {
    vec![Box::new(C2paIO::new("")), Box::new(JpegIO::new(""))]
}

// initialize asset handlers
lazy_static! {
    static ref ASSET_HANDLERS: HashMap<String, Box<dyn AssetIO>> = {
        let mut handler_map = HashMap::new();

        // build handler map
        for h in all_handlers() {
            // get the supported types add entry for each
            for supported_type in h.supported_types() {
                handler_map.insert(supported_type.to_string(), h.get_handler(supported_type));
            }
        }

        handler_map
    };
}

// initialize streaming write handlers
lazy_static! {
    static ref CAI_WRITERS: HashMap<String, Box<dyn CAIWriter>> = {
        let mut handler_map = HashMap::new();

        // build handler map
        for h in all_handlers() {
            for supported_type in h.supported_types() {
                if let Some(writer) = h.get_writer(supported_type) {
                    handler_map.insert(supported_type.to_string(), writer);
                }
            }
        }

        handler_map
    };
}

/// Classifies a stream by its leading bytes.
///
/// Returns the canonical MIME type of the format. Only the first few bytes
/// are read; the stream is left rewound.
pub fn detect_format(stream: &mut dyn CAIRead) -> Result<&'static str> {
    let mut prefix = Vec::with_capacity(MAGIC_PREFIX_LEN as usize);
    stream.rewind()?;
    Read::take(&mut *stream, MAGIC_PREFIX_LEN).read_to_end(&mut prefix)?;
    stream.rewind()?;

    all_handlers()
        .iter()
        .find(|h| h.magic_matches(&prefix))
        .map(|h| h.mime_type())
        .ok_or(Error::UnsupportedType)
}

/// Returns `true` if the asset carries a manifest store, without reading
/// or validating it.
pub fn has_manifest(asset_type: &str, input_stream: &mut dyn CAIRead) -> Result<bool> {
    match get_cailoader_handler(asset_type) {
        Some(handler) => handler.has_cai(input_stream),
        None => Err(Error::UnsupportedType),
    }
}

/// Return jumbf block from stream asset
pub fn load_jumbf_from_stream(asset_type: &str, input_stream: &mut dyn CAIRead) -> Result<Vec<u8>> {
    let cai_block = match get_cailoader_handler(asset_type) {
        Some(asset_handler) => asset_handler.read_cai(input_stream)?,
        None => return Err(Error::UnsupportedType),
    };
    if cai_block.is_empty() {
        return Err(Error::JumbfNotFound);
    }
    Ok(cai_block)
}

/// writes the jumbf data in store_bytes
/// reads an asset of asset_type from reader, adds jumbf data and then writes to
/// writer
pub fn save_jumbf_to_stream(
    asset_type: &str,
    input_stream: &mut dyn CAIRead,
    output_stream: &mut dyn CAIReadWrite,
    store_bytes: &[u8],
) -> Result<()> {
    match get_caiwriter_handler(asset_type) {
        Some(asset_handler) => asset_handler.write_cai(input_stream, output_stream, store_bytes),
        None => Err(Error::UnsupportedType),
    }
}

/// Copies an asset without its manifest store.
pub fn remove_jumbf_from_stream(
    asset_type: &str,
    input_stream: &mut dyn CAIRead,
    output_stream: &mut dyn CAIReadWrite,
) -> Result<()> {
    match get_caiwriter_handler(asset_type) {
        Some(asset_handler) => {
            asset_handler.remove_cai_store_from_stream(input_stream, output_stream)
        }
        None => Err(Error::UnsupportedType),
    }
}

/// Extensions and MIME types that can be read and written, sorted.
pub fn supported_types() -> Vec<String> {
    let mut types: Vec<String> = ASSET_HANDLERS.keys().cloned().collect();
    types.sort();
    types
}

pub(crate) fn get_cailoader_handler(asset_type: &str) -> Option<&dyn CAIReader> {
    let asset_type = asset_type.to_lowercase();

    ASSET_HANDLERS.get(&asset_type).map(|h| h.get_reader())
}

pub(crate) fn get_caiwriter_handler(asset_type: &str) -> Option<&dyn CAIWriter> {
    let asset_type = asset_type.to_lowercase();

    CAI_WRITERS.get(&asset_type).map(|h| h.as_ref())
}

pub(crate) fn object_locations_from_stream(
    format: &str,
    stream: &mut dyn CAIRead,
) -> Result<Vec<HashObjectPositions>> {
    match get_caiwriter_handler(format) {
        Some(handler) => handler.get_object_locations_from_stream(stream),
        _ => Err(Error::UnsupportedType),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Cursor;

    use super::*;
    use crate::utils::test::{fake_store, test_jpeg};

    #[test]
    fn detect() {
        let mut jpeg = Cursor::new(test_jpeg());
        assert_eq!(detect_format(&mut jpeg).unwrap(), "image/jpeg");
        assert_eq!(jpeg.position(), 0);

        let mut store = Cursor::new(fake_store(64));
        assert_eq!(detect_format(&mut store).unwrap(), "application/c2pa");

        assert!(matches!(
            detect_format(&mut Cursor::new(b"\x89PNG\r\n\x1a\n")),
            Err(Error::UnsupportedType)
        ));
        assert!(matches!(
            detect_format(&mut Cursor::new(Vec::new())),
            Err(Error::UnsupportedType)
        ));
    }

    #[test]
    fn handlers_by_type() {
        let types = supported_types();
        assert!(types.contains(&"image/jpeg".to_string()));
        assert!(types.contains(&"c2pa".to_string()));
        assert!(get_cailoader_handler("JPG").is_some());
        assert!(get_cailoader_handler("image/png").is_none());
    }

    #[test]
    fn save_load_remove() {
        let jpeg = test_jpeg();
        let store = fake_store(500);

        assert!(!has_manifest("jpeg", &mut Cursor::new(&jpeg)).unwrap());

        let mut output = Cursor::new(Vec::new());
        save_jumbf_to_stream("image/jpeg", &mut Cursor::new(&jpeg), &mut output, &store).unwrap();
        assert!(has_manifest("jpeg", &mut output).unwrap());
        assert_eq!(load_jumbf_from_stream("jpg", &mut output).unwrap(), store);

        let mut removed = Cursor::new(Vec::new());
        remove_jumbf_from_stream("jpg", &mut output, &mut removed).unwrap();
        assert_eq!(removed.into_inner(), jpeg);

        assert!(matches!(
            load_jumbf_from_stream("png", &mut Cursor::new(&jpeg)),
            Err(Error::UnsupportedType)
        ));
    }
}
