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

use std::io::{Read, Seek, Write};

use crate::error::Result;

/// A seekable byte source the engine can read assets from.
pub trait CAIRead: Read + Seek + Send {}

impl<T> CAIRead for T where T: Read + Seek + Send {}

/// A seekable byte sink the engine can write assets to.
pub trait CAIReadWrite: CAIRead + Write {}

impl<T> CAIReadWrite for T where T: Read + Write + Seek + Send {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashBlockObjectType {
    /// The embedded manifest store.
    Cai,
    /// Everything else in the asset.
    Other,
}

/// A byte range of an asset and what it holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashObjectPositions {
    pub offset: usize,
    pub length: usize,
    pub htype: HashBlockObjectType,
}

/// Reads the manifest store out of an asset.
pub trait CAIReader: Sync + Send {
    /// Returns the manifest store bytes.
    ///
    /// Returns [`Error::JumbfNotFound`](crate::Error::JumbfNotFound) when
    /// the asset has no store and
    /// [`Error::InvalidAsset`](crate::Error::InvalidAsset) when the
    /// container is truncated or inconsistent.
    fn read_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<Vec<u8>>;

    /// Returns `true` if the asset carries a manifest store, without
    /// reading it.
    fn has_cai(&self, asset_reader: &mut dyn CAIRead) -> Result<bool>;
}

/// Writes a manifest store into an asset.
pub trait CAIWriter: Sync + Send {
    /// Copies `input_stream` to `output_stream`, replacing any existing
    /// store with `store_bytes`.
    fn write_cai(
        &self,
        input_stream: &mut dyn CAIRead,
        output_stream: &mut dyn CAIReadWrite,
        store_bytes: &[u8],
    ) -> Result<()>;

    /// Returns the byte ranges of the asset, with the manifest store
    /// ranges marked [`HashBlockObjectType::Cai`].
    fn get_object_locations_from_stream(
        &self,
        input_stream: &mut dyn CAIRead,
    ) -> Result<Vec<HashObjectPositions>>;

    /// Copies `input_stream` to `output_stream` without any manifest store.
    fn remove_cai_store_from_stream(
        &self,
        input_stream: &mut dyn CAIRead,
        output_stream: &mut dyn CAIReadWrite,
    ) -> Result<()>;
}

/// A container format handler.
pub trait AssetIO: Sync + Send {
    fn new(asset_type: &str) -> Self
    where
        Self: Sized;

    fn get_handler(&self, asset_type: &str) -> Box<dyn AssetIO>;

    fn get_reader(&self) -> &dyn CAIReader;

    fn get_writer(&self, asset_type: &str) -> Option<Box<dyn CAIWriter>>;

    /// Extensions and MIME types handled.
    fn supported_types(&self) -> &[&str];

    /// The canonical MIME type of the format.
    fn mime_type(&self) -> &'static str;

    /// Returns `true` if `prefix`, the first bytes of a stream, belong to
    /// this format.
    fn magic_matches(&self, prefix: &[u8]) -> bool;
}
