//! Raw form of a primary object.
//!
//! Every stored record is a JSON document:
//!
//! ```text
//! {"schema": 1, "object": {"Person": { ...fields... }}}
//! ```
//!
//! The schema number lets a newer build refuse records it cannot read
//! rather than silently dropping fields.

use gendb_types::PrimaryObject;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::RawRow;

/// Schema written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct RawFormRef<'a> {
    schema: u32,
    object: &'a PrimaryObject,
}

#[derive(Deserialize)]
struct RawForm {
    schema: u32,
    object: serde_json::Value,
}

/// Serialize an object into its raw form.
pub fn encode(object: &PrimaryObject) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(&RawFormRef {
        schema: SCHEMA_VERSION,
        object,
    })
    .map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Deserialize a raw form.
///
/// Fails with [`StoreError::SchemaTooNew`] for records from a newer schema.
pub fn decode(raw: &[u8]) -> StoreResult<PrimaryObject> {
    let form: RawForm =
        serde_json::from_slice(raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if form.schema > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: form.schema,
            supported: SCHEMA_VERSION,
        });
    }
    serde_json::from_value(form.object).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Build the stored row for an object with its precomputed order key.
pub fn to_row(object: &PrimaryObject, order_by: String) -> StoreResult<RawRow> {
    Ok(RawRow {
        handle: object.handle().clone(),
        gramps_id: object.gramps_id().as_str().to_string(),
        order_by,
        data: encode(object)?,
    })
}

/// Decode a row and check that the payload agrees with its key.
pub fn from_row(row: &RawRow) -> StoreResult<PrimaryObject> {
    let object = decode(&row.data)?;
    if object.handle() != &row.handle {
        return Err(StoreError::Serialization(format!(
            "row {} holds object {}",
            row.handle,
            object.handle()
        )));
    }
    Ok(object)
}
