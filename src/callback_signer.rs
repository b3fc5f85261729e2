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

//! A [`Signer`] whose signing operation is supplied by the caller.

use log::debug;

use crate::{
    openssl::{COSE_OVERHEAD, TIMESTAMP_RESERVE},
    Error, Result, Signer, SignerConfig, SigningAlg,
};

/// External signing operation.
///
/// `sign` receives the bytes to be signed and a buffer to fill with the
/// signature. It returns the number of bytes written, or a negative value
/// on failure.
pub trait SignerCallback: Send + Sync {
    fn sign(&self, data: &[u8], signature: &mut [u8]) -> isize;
}

impl<F> SignerCallback for F
where
    F: Fn(&[u8], &mut [u8]) -> isize + Send + Sync,
{
    fn sign(&self, data: &[u8], signature: &mut [u8]) -> isize {
        self(data, signature)
    }
}

/// Wraps a [`SignerCallback`] and a [`SignerConfig`] as a [`Signer`].
pub struct CallbackSigner {
    callback: Box<dyn SignerCallback>,
    config: SignerConfig,
}

impl CallbackSigner {
    /// Creates a signer from a closure.
    pub fn new<F>(callback: F, config: SignerConfig) -> Self
    where
        F: Fn(&[u8], &mut [u8]) -> isize + Send + Sync + 'static,
    {
        Self::from_callback(callback, config)
    }

    /// Creates a signer from any [`SignerCallback`] implementation.
    pub fn from_callback<C>(callback: C, config: SignerConfig) -> Self
    where
        C: SignerCallback + 'static,
    {
        Self {
            callback: Box::new(callback),
            config,
        }
    }

    fn buffer_len(&self) -> usize {
        self.config
            .reserve_size
            .max(self.config.alg.max_signature_len())
    }
}

impl Signer for CallbackSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut signature = vec![0u8; self.buffer_len()];

        let rc = self.callback.sign(data, &mut signature);
        if rc < 0 {
            debug!("signer callback returned {rc}");
            return Err(Error::SignerCallback(rc));
        }

        let len = rc as usize;
        if len == 0 || len > signature.len() {
            return Err(Error::SigningError(format!(
                "callback reported {len} signature bytes for a {} byte buffer",
                signature.len()
            )));
        }

        signature.truncate(len);
        Ok(signature)
    }

    fn alg(&self) -> SigningAlg {
        self.config.alg
    }

    fn certs(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.config.certs.clone())
    }

    fn reserve_size(&self) -> usize {
        let timestamp_size = if self.config.time_authority_url.is_some() {
            TIMESTAMP_RESERVE
        } else {
            0
        };
        COSE_OVERHEAD + self.buffer_len() + self.config.certs_size() + timestamp_size
    }

    fn time_authority_url(&self) -> Option<String> {
        self.config.time_authority_url.clone()
    }

    fn use_ocsp(&self) -> bool {
        self.config.use_ocsp || self.config.ocsp_val.is_some()
    }

    fn ocsp_val(&self) -> Option<Vec<u8>> {
        self.config.ocsp_val.clone()
    }
}
