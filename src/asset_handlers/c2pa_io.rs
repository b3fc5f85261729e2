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

use std::io::{Read, SeekFrom};

use crate::{
    asset_io::{
        AssetIO, CAIRead, CAIReadWrite, CAIReader, CAIWriter, HashBlockObjectType,
        HashObjectPositions,
    },
    error::{Error, Result},
};

static SUPPORTED_TYPES: [&str; 3] = [
    "c2pa",
    "application/c2pa",
    "application/x-c2pa-manifest-store",
];

/// Supports working with ".c2pa" files containing only manifest store data
pub struct C2paIO {}

fn is_jumbf(prefix: &[u8]) -> bool {
    prefix.len() >= 8 && &prefix[4..8] == b"jumb"
}

impl CAIReader for C2paIO {
    fn read_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<Vec<u8>> {
        let mut cai_data = Vec::new();
        // read the whole file
        asset_reader.rewind()?;
        asset_reader.read_to_end(&mut cai_data)?;

        if cai_data.is_empty() {
            return Err(Error::JumbfNotFound);
        }
        if !is_jumbf(&cai_data) {
            return Err(Error::InvalidAsset(
                "manifest store does not start with a JUMBF box".to_string(),
            ));
        }
        Ok(cai_data)
    }

    fn has_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<bool> {
        let mut prefix = Vec::with_capacity(8);
        asset_reader.rewind()?;
        Read::take(&mut *asset_reader, 8).read_to_end(&mut prefix)?;
        Ok(is_jumbf(&prefix))
    }
}

impl CAIWriter for C2paIO {
    fn write_cai(
        &self,
        _input_stream: &mut dyn CAIRead,
        output_stream: &mut dyn CAIReadWrite,
        store_bytes: &[u8],
    ) -> Result<()> {
        // just write the store bytes and ignore the input stream
        output_stream.write_all(store_bytes)?;
        output_stream.flush()?;
        Ok(())
    }

    fn get_object_locations_from_stream(
        &self,
        input_stream: &mut dyn CAIRead,
    ) -> Result<Vec<HashObjectPositions>> {
        // the whole file is manifest data
        let len = input_stream.seek(SeekFrom::End(0))? as usize;
        Ok(vec![HashObjectPositions {
            offset: 0,
            length: len,
            htype: HashBlockObjectType::Cai,
        }])
    }

    fn remove_cai_store_from_stream(
        &self,
        _input_stream: &mut dyn CAIRead,
        _output_stream: &mut dyn CAIReadWrite,
    ) -> Result<()> {
        Ok(())
    }
}

impl AssetIO for C2paIO {
    fn new(_asset_type: &str) -> Self
    where
        Self: Sized,
    {
        C2paIO {}
    }

    fn get_handler(&self, asset_type: &str) -> Box<dyn AssetIO> {
        Box::new(C2paIO::new(asset_type))
    }

    fn get_reader(&self) -> &dyn CAIReader {
        self
    }

    fn get_writer(&self, asset_type: &str) -> Option<Box<dyn CAIWriter>> {
        Some(Box::new(C2paIO::new(asset_type)))
    }

    fn supported_types(&self) -> &[&str] {
        &SUPPORTED_TYPES
    }

    fn mime_type(&self) -> &'static str {
        "application/c2pa"
    }

    fn magic_matches(&self, prefix: &[u8]) -> bool {
        is_jumbf(prefix)
    }
}
