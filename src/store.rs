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

use std::{collections::HashMap, io::Cursor};

use log::debug;
use petgraph::{algo::toposort, graph::DiGraph};

use crate::{
    assertion::{Assertion, AssertionBase},
    assertions::{labels, DataHash},
    asset_io::{CAIRead, HashBlockObjectType},
    claim::Claim,
    cose_sign::cose_sign,
    error::{Error, Result},
    jumbf::{
        boxes::*,
        labels::{assertion_label_from_uri, ASSERTIONS, CLAIM, MANIFEST_STORE, SIGNATURE},
    },
    jumbf_io::{object_locations_from_stream, save_jumbf_to_stream},
    settings::Settings,
    utils::hash_utils::{hash_by_alg, hash_stream_by_alg, HashRange},
    Signer,
};

/// Name of the data hash the engine adds to a claim.
const DATA_HASH_NAME: &str = "jumbf manifest";

// layout passes before giving up on a stable placeholder
const MAX_LAYOUT_PASSES: usize = 5;

/// A `Store` maintains a list of `Claim` structs.
///
/// Claims are kept in an arena in the order they were added; the last one
/// is the active manifest. Ingredient relationships are expressed by label
/// and must form a DAG.
#[derive(Clone, Debug, Default)]
pub struct Store {
    claims_map: HashMap<String, usize>,
    claims: Vec<Claim>,
}

/// The output of embedding a signed store.
#[derive(Debug)]
pub(crate) struct SignedAsset {
    pub asset: Vec<u8>,
    pub manifest: Vec<u8>,
    pub warnings: Vec<String>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// All claims, oldest first.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Label of the active manifest.
    pub fn provenance_label(&self) -> Option<&str> {
        self.claims.last().map(Claim::label)
    }

    /// The active manifest's claim.
    pub fn provenance_claim(&self) -> Option<&Claim> {
        self.claims.last()
    }

    pub(crate) fn provenance_claim_mut(&mut self) -> Option<&mut Claim> {
        self.claims.last_mut()
    }

    pub fn get_claim(&self, label: &str) -> Option<&Claim> {
        self.claims_map
            .get(label)
            .and_then(|index| self.claims.get(*index))
    }

    fn insert_claim(&mut self, claim: Claim) -> Result<()> {
        if let Some(existing) = self.get_claim(claim.label()) {
            // a manifest shared by two ingredients is kept once
            if existing.original_box().is_some() && existing.original_box() == claim.original_box()
            {
                debug!("manifest {} already in store", claim.label());
                return Ok(());
            }
            return Err(Error::DuplicateLabel(claim.label().to_owned()));
        }

        self.claims_map
            .insert(claim.label().to_owned(), self.claims.len());
        self.claims.push(claim);
        Ok(())
    }

    /// Adds the manifests of an ingredient's store, keeping their order.
    pub(crate) fn merge_ingredient_store(&mut self, other: Store) -> Result<()> {
        for claim in other.claims {
            self.insert_claim(claim)?;
        }
        Ok(())
    }

    /// Adds `claim` as the new active manifest and returns its label.
    ///
    /// Every manifest the claim names as an ingredient must already be in
    /// the store. Reusing the label of one of its own ancestors is a cycle;
    /// reusing any other label is a duplicate.
    pub(crate) fn commit_claim(&mut self, claim: Claim) -> Result<String> {
        let label = claim.label().to_owned();

        for ingredient_label in claim.ingredient_manifest_labels() {
            if ingredient_label != label && !self.claims_map.contains_key(&ingredient_label) {
                return Err(Error::ClaimMissing {
                    label: ingredient_label,
                });
            }
        }

        self.check_ingredient_graph(Some(&claim))?;

        if self.claims_map.contains_key(&label) {
            return Err(Error::DuplicateLabel(label));
        }

        self.claims_map.insert(label.clone(), self.claims.len());
        self.claims.push(claim);
        Ok(label)
    }

    /// Fails with [`Error::IngredientCycle`] if a manifest is its own
    /// ingredient, directly or transitively.
    ///
    /// `pending` is checked as if it were already in the store; a pending
    /// claim that shares a label with a stored one takes its node.
    pub(crate) fn check_ingredient_graph(&self, pending: Option<&Claim>) -> Result<()> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes = HashMap::new();

        for claim in self.claims.iter().chain(pending) {
            nodes
                .entry(claim.label())
                .or_insert_with(|| graph.add_node(claim.label()));
        }

        for claim in self.claims.iter().chain(pending) {
            let Some(&from) = nodes.get(claim.label()) else {
                continue;
            };
            for ingredient_label in claim.ingredient_manifest_labels() {
                if let Some(&to) = nodes.get(ingredient_label.as_str()) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| Error::IngredientCycle(graph[cycle.node_id()].to_string()))
    }

    // The manifest superbox for `claim`. Claims read from a store are
    // written back verbatim.
    fn manifest_box(claim: &Claim, reserve_size: usize) -> Result<Box<dyn BMFFBox>> {
        if let Some(original) = claim.original_box() {
            return Ok(Box::new(JUMBFRawBox::new(original.to_vec())));
        }

        let mut manifest = JUMBFSuperBox::new(claim.label(), Some(CAI_STORE_UUID));

        let mut assertion_store = JUMBFSuperBox::new(ASSERTIONS, Some(CAI_ASSERTION_STORE_UUID));
        for ca in claim.claim_assertion_store() {
            assertion_store.add_data_box(Box::new(Claim::assertion_box(ca.assertion())));
        }
        manifest.add_data_box(Box::new(assertion_store));

        let mut claim_box = JUMBFSuperBox::new(CLAIM, Some(CAI_CLAIM_UUID));
        claim_box.add_data_box(Box::new(JUMBFCBORContentBox::new(claim.data()?)));
        manifest.add_data_box(Box::new(claim_box));

        // the signature box always occupies the reserved size
        let sig = claim.signature_val();
        if sig.len() > reserve_size {
            return Err(Error::CoseSigboxTooSmall);
        }
        let mut sig_box = JUMBFSuperBox::new(SIGNATURE, Some(CAI_SIGNATURE_UUID));
        sig_box.add_data_box(Box::new(JUMBFCBORContentBox::new(sig.to_vec())));
        sig_box.add_data_box(Box::new(JUMBFPaddingContentBox::new(
            reserve_size - sig.len(),
        )));
        manifest.add_data_box(Box::new(sig_box));

        Ok(Box::new(manifest))
    }

    /// Serializes the store as a `c2pa` JUMBF superbox.
    ///
    /// `reserve_size` is the room left for the signature of claims that
    /// were not read from a store.
    pub(crate) fn to_jumbf(&self, reserve_size: usize) -> Result<Vec<u8>> {
        let mut cai_block = JUMBFSuperBox::new(MANIFEST_STORE, Some(CAI_BLOCK_UUID));
        for claim in &self.claims {
            cai_block.add_data_box(Store::manifest_box(claim, reserve_size)?);
        }
        Ok(cai_block.to_bytes()?)
    }

    /// Parses a manifest store.
    ///
    /// Assertion hashes are taken over the bytes as found, and each
    /// manifest keeps its superbox so it can be carried into a new store
    /// unchanged.
    pub fn from_jumbf(buffer: &[u8]) -> Result<Store> {
        if buffer.is_empty() {
            return Err(Error::JumbfNotFound);
        }

        let mut reader = Cursor::new(buffer);
        let cai_block = BoxReader::read_super_box(&mut reader)?;
        if cai_block.desc_box().uuid() != CAI_BLOCK_UUID {
            return Err(Error::InvalidClaim(format!(
                "store box is labeled {:?}, not a c2pa store",
                cai_block.desc_box().label()
            )));
        }

        let mut store = Store::new();
        for manifest_box in cai_block.superboxes() {
            if manifest_box.desc_box().uuid() != CAI_STORE_UUID {
                debug!("skipping box {:?}", manifest_box.desc_box().label());
                continue;
            }
            let claim = Store::claim_from_manifest_box(buffer, manifest_box)?;
            store.insert_claim(claim)?;
        }

        if store.claims.is_empty() {
            return Err(Error::InvalidClaim("store holds no manifests".into()));
        }

        store.check_ingredient_graph(None)?;
        Ok(store)
    }

    fn claim_from_manifest_box(buffer: &[u8], manifest_box: &JUMBFSuperBox) -> Result<Claim> {
        let label = manifest_box.desc_box().label().to_owned();

        let mut claim_boxes = manifest_box
            .superboxes()
            .filter(|sb| sb.desc_box().uuid() == CAI_CLAIM_UUID);
        let claim_box = claim_boxes
            .next()
            .ok_or_else(|| Error::JumbfBoxNotFound(format!("{label}/{CLAIM}")))?;
        if claim_boxes.next().is_some() {
            return Err(Error::InvalidClaim(format!(
                "{label} holds more than one claim"
            )));
        }
        let claim_cbor = claim_box
            .data_box_as_cbor_box(0)
            .ok_or_else(|| Error::JumbfBoxNotFound(format!("{label}/{CLAIM}")))?;
        let mut claim = Claim::from_data(&label, claim_cbor.cbor())?;

        let sig = manifest_box
            .superboxes()
            .find(|sb| sb.desc_box().uuid() == CAI_SIGNATURE_UUID)
            .and_then(|sb| sb.data_box_as_cbor_box(0))
            .ok_or_else(|| Error::JumbfBoxNotFound(format!("{label}/{SIGNATURE}")))?;
        claim.set_signature_val(sig.cbor().to_vec());

        if let Some(assertion_store) = manifest_box
            .superboxes()
            .find(|sb| sb.desc_box().uuid() == CAI_ASSERTION_STORE_UUID)
        {
            for assertion_box in assertion_store.superboxes() {
                let assertion = Store::assertion_from_box(assertion_box)?;
                let alg = claim
                    .assertions()
                    .iter()
                    .find(|uri| {
                        assertion_label_from_uri(uri.url()).as_deref() == Some(assertion.label())
                    })
                    .and_then(|uri| uri.alg())
                    .unwrap_or(claim.alg())
                    .to_owned();

                let payload = box_payload(source_bytes(buffer, assertion_box)?);
                let hash = hash_by_alg(&alg, payload, None)?;
                claim.put_assertion_from_store(assertion, hash);
            }
        }

        claim.set_original_box(source_bytes(buffer, manifest_box)?.to_vec());
        Ok(claim)
    }

    fn assertion_from_box(sb: &JUMBFSuperBox) -> Result<Assertion> {
        let label = sb.desc_box().label();
        let missing = || Error::JumbfBoxNotFound(format!("content of assertion {label}"));

        match sb.desc_box().uuid().as_str() {
            CAI_JSON_ASSERTION_UUID => {
                let json = sb.data_box_as_json_box(0).ok_or_else(missing)?;
                Assertion::from_data_json(label, json.json())
            }
            CAI_CBOR_ASSERTION_UUID => {
                let cbor = sb.data_box_as_cbor_box(0).ok_or_else(missing)?;
                Ok(Assertion::from_data_cbor(label, cbor.cbor()))
            }
            JUMBF_EMBEDDED_FILE_UUID => {
                let media = sb.data_box_as_embedded_media_type_box(0).ok_or_else(missing)?;
                let content = sb
                    .data_box_as_embedded_file_content_box(1)
                    .ok_or_else(missing)?;
                Ok(Assertion::from_data_binary(
                    label,
                    media.media_type(),
                    content.data(),
                ))
            }
            other => Err(Error::InvalidClaim(format!(
                "assertion {label} has unknown type {other}"
            ))),
        }
    }

    /// Hash of the payload of the manifest superbox labeled `label`.
    ///
    /// This is what an ingredient's `c2pa_manifest` hashed URI records.
    pub(crate) fn get_manifest_box_hash(&self, label: &str, alg: &str) -> Result<Vec<u8>> {
        let claim = self.get_claim(label).ok_or_else(|| Error::ClaimMissing {
            label: label.to_owned(),
        })?;

        let manifest_box = match claim.original_box() {
            Some(original) => original.to_vec(),
            None => {
                let mut built = Vec::new();
                Store::manifest_box(claim, claim.signature_val().len())?.write_box(&mut built)?;
                built
            }
        };

        hash_by_alg(alg, box_payload(&manifest_box), None)
    }

    fn reserve_size(signer: &dyn Signer, settings: &Settings) -> usize {
        let ocsp = if signer.use_ocsp() {
            let stapled = signer.ocsp_val().map_or(0, |v| v.len());
            settings.signer.ocsp_reserve_size.max(stapled)
        } else {
            0
        };
        signer.reserve_size() + ocsp
    }

    // Adds a zeroed data hash to the active claim unless it has one.
    fn add_placeholder_data_hash(&mut self) -> Result<()> {
        let pc = self.provenance_claim_mut().ok_or(Error::ClaimEncoding)?;
        if pc.original_box().is_some() || pc.is_signed() {
            return Err(Error::InvalidClaim(format!(
                "{} is already signed",
                pc.label()
            )));
        }

        if pc.data_hash()?.is_none() {
            let mut dh = DataHash::new(DATA_HASH_NAME, pc.alg());
            dh.set_hash(vec![0u8; hash_by_alg(pc.alg(), &[], None)?.len()]);
            pc.add_assertion(&dh)?;
        }
        Ok(())
    }

    fn update_data_hash<F: FnOnce(&mut DataHash)>(&mut self, update: F) -> Result<()> {
        let pc = self.provenance_claim_mut().ok_or(Error::ClaimEncoding)?;

        let assertion = pc
            .assertions_by_root(labels::DATA_HASH)
            .next()
            .ok_or_else(|| Error::AssertionMissing {
                label: labels::DATA_HASH.to_owned(),
            })?;
        let label = assertion.label().to_owned();
        let mut dh = DataHash::from_assertion(assertion)?;

        update(&mut dh);

        let mut updated = dh.to_assertion()?;
        updated.set_label(label);
        pc.replace_assertion(updated)
    }

    fn data_hash_alg(&self) -> Result<String> {
        let pc = self.provenance_claim().ok_or(Error::ClaimEncoding)?;
        let dh = pc.data_hash()?.ok_or_else(|| Error::AssertionMissing {
            label: labels::DATA_HASH.to_owned(),
        })?;
        Ok(dh.alg_or(pc.alg()).to_owned())
    }

    fn sign_claim(&mut self, signer: &dyn Signer, settings: &Settings) -> Result<Vec<String>> {
        let pc = self.provenance_claim_mut().ok_or(Error::ClaimEncoding)?;
        let claim_bytes = pc.data()?;
        let outcome = cose_sign(signer, &claim_bytes, &settings.signer)?;
        pc.set_signature_val(outcome.cose);
        Ok(outcome.warnings)
    }

    /// Signs the active claim and embeds the store into a copy of `source`.
    ///
    /// Nothing is written outside the returned buffers, so a failure at any
    /// step leaves the caller's destination untouched.
    pub(crate) fn embed_in_bytes(
        &mut self,
        format: &str,
        source: &[u8],
        signer: &dyn Signer,
        settings: &Settings,
    ) -> Result<SignedAsset> {
        let reserve_size = Store::reserve_size(signer, settings);
        self.add_placeholder_data_hash()?;

        // The exclusions describe where the store lands, and writing them
        // can change the store's size. Repeat until the layout holds.
        let mut exclusions: Vec<HashRange> = Vec::new();
        let mut placed: Option<(Vec<u8>, usize)> = None;
        for pass in 0..MAX_LAYOUT_PASSES {
            let jumbf = self.to_jumbf(reserve_size)?;
            let mut out = Cursor::new(Vec::with_capacity(source.len() + jumbf.len()));
            save_jumbf_to_stream(format, &mut Cursor::new(source), &mut out, &jumbf)?;

            let found = manifest_ranges(format, &mut out)?;
            if found == exclusions {
                debug!("store layout settled after {} passes", pass + 1);
                placed = Some((out.into_inner(), jumbf.len()));
                break;
            }

            exclusions = found;
            let new_exclusions = exclusions.clone();
            self.update_data_hash(move |dh| dh.set_exclusions(new_exclusions))?;
        }
        let (placed, jumbf_len) = placed.ok_or(Error::JumbfCreationError)?;

        let alg = self.data_hash_alg()?;
        let hash = hash_by_alg(&alg, &placed, Some(exclusions))?;
        self.update_data_hash(|dh| dh.set_hash(hash))?;

        let warnings = self.sign_claim(signer, settings)?;

        let manifest = self.to_jumbf(reserve_size)?;
        if manifest.len() != jumbf_len {
            return Err(Error::JumbfCreationError);
        }

        let mut out = Cursor::new(Vec::with_capacity(placed.len()));
        save_jumbf_to_stream(format, &mut Cursor::new(source), &mut out, &manifest)?;

        Ok(SignedAsset {
            asset: out.into_inner(),
            manifest,
            warnings,
        })
    }

    /// Signs the active claim for a store kept next to `asset`.
    ///
    /// The data hash covers every byte of the asset. Returns the store
    /// bytes and any augmentation warnings.
    pub(crate) fn sign_sidecar(
        &mut self,
        asset: &mut dyn CAIRead,
        signer: &dyn Signer,
        settings: &Settings,
    ) -> Result<(Vec<u8>, Vec<String>)> {
        let reserve_size = Store::reserve_size(signer, settings);
        self.add_placeholder_data_hash()?;

        let alg = self.data_hash_alg()?;
        let hash = hash_stream_by_alg(&alg, asset, None)?;
        self.update_data_hash(|dh| {
            dh.set_exclusions(Vec::new());
            dh.set_hash(hash);
        })?;

        let warnings = self.sign_claim(signer, settings)?;
        Ok((self.to_jumbf(reserve_size)?, warnings))
    }
}

// Ranges of `stream` holding the manifest store.
fn manifest_ranges(format: &str, stream: &mut dyn CAIRead) -> Result<Vec<HashRange>> {
    Ok(object_locations_from_stream(format, stream)?
        .into_iter()
        .filter(|p| p.htype == HashBlockObjectType::Cai)
        .map(|p| HashRange::new(p.offset, p.length))
        .collect())
}

// The bytes `sb` was read from.
fn source_bytes<'a>(buffer: &'a [u8], sb: &JUMBFSuperBox) -> Result<&'a [u8]> {
    let (offset, size) = sb
        .source_range()
        .ok_or_else(|| Error::InvalidClaim("box was not read from the store".into()))?;
    let start = usize::try_from(offset).map_err(|_| Error::JumbfCreationError)?;
    let end = start
        .checked_add(usize::try_from(size).map_err(|_| Error::JumbfCreationError)?)
        .ok_or(Error::JumbfCreationError)?;

    buffer
        .get(start..end)
        .ok_or_else(|| Error::InvalidClaim(format!("box at {start} runs past the store")))
}

// A serialized box without its header.
fn box_payload(bytes: &[u8]) -> &[u8] {
    // LBox of 1 means a 64 bit XLBox follows the type
    let header = if bytes.starts_with(&[0, 0, 0, 1]) {
        2 * HEADER_SIZE as usize
    } else {
        HEADER_SIZE as usize
    };
    bytes.get(header..).unwrap_or_default()
}
