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

//! Building, signing and embedding new manifests.

use std::io::{Cursor, Read};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    assertion::Assertion,
    assertions::{c2pa_action, labels, Action, Actions, Relationship},
    asset_io::{CAIRead, CAIReadWrite},
    claim::Claim,
    claim_generator_info::ClaimGeneratorInfo,
    error::{Error, Result},
    ingredient::Ingredient,
    jumbf_io::{get_caiwriter_handler, has_manifest},
    manifest_assertion::{ManifestAssertion, ManifestAssertionKind},
    resource_store::{ResourceRef, ResourceStore},
    settings::{get_settings, Settings},
    store::{SignedAsset, Store},
    utils::mime::{format_to_extension, format_to_mime},
    Signer,
};

/// The JSON description of a manifest to be built.
///
/// Unrecognized fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ManifestDefinition {
    /// User agent of the application making the claim.
    #[serde(default)]
    pub claim_generator: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claim_generator_info: Vec<ClaimGeneratorInfo>,

    /// MIME type of the asset. Defaults to the format given when signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Label of the new manifest. A `urn:uuid:` label is generated if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Resource reference to the claim thumbnail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ResourceRef>,

    #[serde(default)]
    pub assertions: Vec<ManifestAssertion>,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

/// Builds a manifest and signs it into an asset.
///
/// # Example
///
/// ```no_run
/// # use std::io::Cursor;
/// # use c2pa_engine::{Builder, Result, Signer};
/// # fn sign(signer: &dyn Signer, source: &[u8]) -> Result<Vec<u8>> {
/// let mut builder = Builder::from_json(
///     r#"{"claim_generator": "my_app/1.0", "title": "image.jpg"}"#,
/// )?;
/// let mut dest = Cursor::new(Vec::new());
/// builder.sign(signer, "image/jpeg", &mut Cursor::new(source), &mut dest)?;
/// # Ok(dest.into_inner())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    pub definition: ManifestDefinition,
    resources: ResourceStore,
    settings: Option<Settings>,
    warnings: Vec<String>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from a JSON [`ManifestDefinition`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            definition: serde_json::from_str(json)?,
            ..Default::default()
        })
    }

    /// Uses `settings` instead of the process-wide settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_else(get_settings)
    }

    /// Adds a CBOR assertion with `label`.
    pub fn add_assertion<S, T>(&mut self, label: S, data: &T) -> Result<&mut Self>
    where
        S: Into<String>,
        T: Serialize,
    {
        self.definition
            .assertions
            .push(ManifestAssertion::from_labeled_assertion(label, data)?);
        Ok(self)
    }

    /// Adds an assertion stored as JSON rather than CBOR.
    pub fn add_assertion_json<S, T>(&mut self, label: S, data: &T) -> Result<&mut Self>
    where
        S: Into<String>,
        T: Serialize,
    {
        let assertion = ManifestAssertion::from_labeled_assertion(label, data)?
            .set_kind(ManifestAssertionKind::Json);
        self.definition.assertions.push(assertion);
        Ok(self)
    }

    /// Adds a resource, such as a thumbnail, referenced by `id` from the
    /// definition.
    pub fn add_resource(&mut self, id: &str, stream: &mut dyn Read) -> Result<&mut Self> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        self.resources.add(id, data);
        Ok(self)
    }

    /// Adds an ingredient read from `stream`.
    ///
    /// `ingredient_json` is an ingredient definition whose fields (title,
    /// relationship, thumbnail) override what is read from the asset.
    pub fn add_ingredient_from_stream(
        &mut self,
        ingredient_json: &str,
        format: &str,
        stream: &mut dyn CAIRead,
    ) -> Result<&mut Ingredient> {
        let definition = Ingredient::from_json(ingredient_json)?;
        let mut ingredient =
            Ingredient::from_stream_with_settings(format, stream, &self.settings())?;
        ingredient.merge_definition(definition);

        self.definition.ingredients.push(ingredient);
        self.definition
            .ingredients
            .last_mut()
            .ok_or(Error::JumbfCreationError)
    }

    pub fn add_ingredient(&mut self, ingredient: Ingredient) -> &mut Self {
        self.definition.ingredients.push(ingredient);
        self
    }

    /// Warnings from the last signing operation, such as a time stamp that
    /// could not be fetched.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // Checks that do not need the asset.
    fn check_definition(&self, settings: &Settings) -> Result<()> {
        let def = &self.definition;
        if def.claim_generator.is_empty() && def.claim_generator_info.is_empty() {
            return Err(Error::MissingField("claim_generator".into()));
        }
        if settings.builder.require_assertion && def.assertions.is_empty() {
            return Err(Error::NoAssertions);
        }
        if let Some(i) = def.ingredients.iter().find(|i| !i.is_resolved()) {
            return Err(Error::MissingField(format!(
                "asset stream for ingredient \"{}\"",
                i.title()
            )));
        }
        if def.ingredients.iter().filter(|i| i.is_parent()).count() > 1 {
            return Err(Error::BadParam(
                "a manifest can have only one parent ingredient".into(),
            ));
        }
        if let Some(a) = def
            .assertions
            .iter()
            .find(|a| labels::is_hash_binding(a.label()))
        {
            return Err(Error::BadParam(format!(
                "{} is added when signing",
                a.label()
            )));
        }
        Ok(())
    }

    fn claim_generator(&self) -> String {
        let def = &self.definition;
        let generator = if def.claim_generator.is_empty() {
            def.claim_generator_info
                .iter()
                .map(ClaimGeneratorInfo::user_agent)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            def.claim_generator.clone()
        };
        format!("{generator} {}", ClaimGeneratorInfo::default().user_agent())
    }

    // The source's own store becomes the parent unless one was given.
    fn source_parent(
        &self,
        format: &str,
        source: &[u8],
        settings: &Settings,
    ) -> Result<Option<Ingredient>> {
        if self.definition.ingredients.iter().any(Ingredient::is_parent)
            || !has_manifest(format, &mut Cursor::new(source))?
        {
            return Ok(None);
        }

        debug!("adding the source's manifest as parent ingredient");
        let mut parent =
            Ingredient::from_stream_with_settings(format, &mut Cursor::new(source), settings)?;
        parent.set_relationship(Relationship::ParentOf);
        if parent.title().is_empty() {
            let title = self.definition.title.clone().unwrap_or_default();
            parent.set_title(title);
        }
        Ok(Some(parent))
    }

    fn to_claim(&self, format: &str, parent: Option<&Ingredient>) -> Result<Claim> {
        let def = &self.definition;
        let claim_format = def
            .format
            .as_deref()
            .map(format_to_mime)
            .unwrap_or_else(|| format.to_owned());

        let mut claim = match &def.label {
            Some(label) => Claim::new_with_label(label, self.claim_generator(), &claim_format),
            None => Claim::new(self.claim_generator(), &claim_format),
        };
        if !def.claim_generator_info.is_empty() {
            claim.claim_generator_info = Some(def.claim_generator_info.clone());
        }
        claim.set_title(def.title.clone());
        if let Some(instance_id) = &def.instance_id {
            claim.set_instance_id(instance_id);
        }

        if let Some(thumb) = &def.thumbnail {
            let data = self.resources.get(&thumb.identifier)?;
            let ext = format_to_extension(&thumb.format).ok_or(Error::UnsupportedType)?;
            claim.add_raw_assertion(Assertion::from_data_binary(
                &format!("{}.{ext}", labels::CLAIM_THUMBNAIL),
                &format_to_mime(&thumb.format),
                data,
            ))?;
        }

        for ingredient in parent.into_iter().chain(def.ingredients.iter()) {
            let assertion = ingredient.to_assertion(&mut claim, &self.resources)?;
            claim.add_assertion(&assertion)?;
        }

        for ma in &def.assertions {
            if ma.label() == labels::ACTIONS {
                let actions = Actions::from_json_value(ma.value())?;
                claim.add_assertion(&actions)?;
            } else {
                claim.add_raw_assertion(ma.to_claim_assertion()?)?;
            }
        }

        if !def.assertions.iter().any(|a| a.label() == labels::ACTIONS) {
            let has_parent = parent.is_some() || def.ingredients.iter().any(Ingredient::is_parent);
            claim.add_assertion(&default_actions(has_parent))?;
        }

        Ok(claim)
    }

    // Builds the store holding the new claim and its ingredients' stores.
    fn to_store(&self, format: &str, source: &[u8], settings: &Settings) -> Result<Store> {
        self.check_definition(settings)?;

        let parent = self.source_parent(format, source, settings)?;
        let claim = self.to_claim(format, parent.as_ref())?;

        let mut store = Store::new();
        for ingredient_store in parent
            .iter()
            .chain(self.definition.ingredients.iter())
            .filter_map(Ingredient::manifest_store)
        {
            store.merge_ingredient_store(ingredient_store.clone())?;
        }
        store.commit_claim(claim)?;
        Ok(store)
    }

    fn sign_to_bytes(
        &mut self,
        signer: &dyn Signer,
        format: &str,
        source: &mut dyn CAIRead,
    ) -> Result<SignedAsset> {
        let format = format_to_mime(format);
        if get_caiwriter_handler(&format).is_none() {
            return Err(Error::UnsupportedType);
        }
        let settings = self.settings();

        let mut source_bytes = Vec::new();
        source.rewind()?;
        source.read_to_end(&mut source_bytes)?;

        let mut store = self.to_store(&format, &source_bytes, &settings)?;
        let signed = store.embed_in_bytes(&format, &source_bytes, signer, &settings)?;

        for w in &signed.warnings {
            warn!("{w}");
        }
        self.warnings.clone_from(&signed.warnings);
        Ok(signed)
    }

    /// Signs a new manifest into a copy of `source` written to `dest`.
    ///
    /// `dest` is written from its start only after signing has succeeded,
    /// so any failure leaves it untouched. Returns the manifest store bytes.
    pub fn sign(
        &mut self,
        signer: &dyn Signer,
        format: &str,
        source: &mut dyn CAIRead,
        dest: &mut dyn CAIReadWrite,
    ) -> Result<Vec<u8>> {
        let signed = self.sign_to_bytes(signer, format, source)?;

        dest.rewind()?;
        dest.write_all(&signed.asset)?;
        dest.flush()?;
        Ok(signed.manifest)
    }

    /// Signs a new manifest into `stream`, replacing its contents.
    ///
    /// Streams cannot be truncated, so a result shorter than the current
    /// contents is refused before anything is written.
    pub fn sign_in_place(
        &mut self,
        signer: &dyn Signer,
        format: &str,
        stream: &mut dyn CAIReadWrite,
    ) -> Result<Vec<u8>> {
        let signed = {
            let mut source: &mut dyn CAIReadWrite = &mut *stream;
            self.sign_to_bytes(signer, format, &mut source)?
        };

        let current_len = stream.seek(std::io::SeekFrom::End(0))?;
        if (signed.asset.len() as u64) < current_len {
            return Err(Error::StreamError(format!(
                "signed asset is {} bytes, shorter than the {current_len} byte stream it replaces",
                signed.asset.len()
            )));
        }

        stream.rewind()?;
        stream.write_all(&signed.asset)?;
        stream.flush()?;
        Ok(signed.manifest)
    }

    /// Signs a manifest store to be kept next to the asset instead of in it.
    ///
    /// The asset is read but never modified. Returns the `.c2pa` store
    /// bytes.
    pub fn sign_sidecar(
        &mut self,
        signer: &dyn Signer,
        format: &str,
        asset: &mut dyn CAIRead,
    ) -> Result<Vec<u8>> {
        let format = format_to_mime(format);
        let settings = self.settings();

        let mut asset_bytes = Vec::new();
        asset.rewind()?;
        asset.read_to_end(&mut asset_bytes)?;

        let mut store = self.to_store(&format, &asset_bytes, &settings)?;
        let (manifest, warnings) =
            store.sign_sidecar(&mut Cursor::new(&asset_bytes), signer, &settings)?;

        for w in &warnings {
            warn!("{w}");
        }
        self.warnings = warnings;
        Ok(manifest)
    }
}

// Added when the definition carries no actions of its own.
fn default_actions(has_parent: bool) -> Actions {
    let action = if has_parent {
        c2pa_action::OPENED
    } else {
        c2pa_action::CREATED
    };
    Actions::new().add_action(Action::new(action).set_software_agent(ClaimGeneratorInfo::default()))
}
