// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote resource access for the lighting bridge.
//!
//! The bridge exposes its resources at `/clip/v2/resource/<type>[/<id>]` and
//! wraps every answer in an envelope:
//!
//! ```json
//! {"errors": [], "data": [ ... ]}
//! ```
//!
//! # Implementations
//!
//! - [`HttpClient`]: HTTPS access to a real bridge (feature `http`)
//! - [`MemoryBridge`]: an in-process bridge for tests and dry runs
//!
//! Both implement [`BridgeApi`], which the rest of the library is generic
//! over.

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::{BridgeConfig, HttpClient};
pub use memory::{MemoryBridge, Method};

use std::future::Future;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{ResourceRef, ResourceType};

/// Request/response access to bridge resources.
///
/// Every method resolves to the unwrapped `data` array of the envelope.
/// Writes (`put`, `post`) usually answer with `{rid, rtype}` references
/// rather than full records.
pub trait BridgeApi: Send + Sync {
    /// Reads a whole collection, or one record when `id` is given.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or the bridge reports an
    /// error.
    fn get(
        &self,
        resource: ResourceType,
        id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Value>, ProtocolError>> + Send;

    /// Updates a record.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or the bridge reports an
    /// error.
    fn put(
        &self,
        resource: ResourceType,
        id: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Vec<Value>, ProtocolError>> + Send;

    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or the bridge reports an
    /// error.
    fn post(
        &self,
        resource: ResourceType,
        body: &Value,
    ) -> impl Future<Output = Result<Vec<Value>, ProtocolError>> + Send;

    /// Deletes a record. Resolves to `true` once the bridge acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or the bridge reports an
    /// error.
    fn delete(
        &self,
        resource: ResourceType,
        id: &str,
    ) -> impl Future<Output = Result<bool, ProtocolError>> + Send;
}

/// Reads a single record.
///
/// # Errors
///
/// Returns `ProtocolError::ResourceNotFound` if the bridge answers with an
/// empty `data` array, or the error of the underlying request.
pub async fn fetch_record<B: BridgeApi>(
    bridge: &B,
    resource: ResourceType,
    id: &str,
) -> Result<Value, ProtocolError> {
    bridge
        .get(resource, Some(id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ProtocolError::ResourceNotFound {
            resource: resource.path().to_string(),
            id: id.to_string(),
        })
}

/// Returns the identifier of the first reference in a write response.
#[must_use]
pub fn created_id(data: &[Value]) -> Option<String> {
    data.iter()
        .find_map(ResourceRef::from_value)
        .map(|r| r.rid)
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    errors: Vec<EnvelopeError>,
    data: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    description: String,
}

/// Unwraps a `{errors: [], data: [...]}` response body.
///
/// # Errors
///
/// - `ProtocolError::Rejected` if the envelope lists errors
/// - `ProtocolError::MalformedEnvelope` if the body is not an envelope
pub fn unwrap_envelope(body: &str) -> Result<Vec<Value>, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;

    if !envelope.errors.is_empty() {
        return Err(ProtocolError::Rejected(
            envelope.errors.into_iter().map(|e| e.description).collect(),
        ));
    }

    envelope
        .data
        .ok_or_else(|| ProtocolError::MalformedEnvelope("missing data array".to_string()))
}
