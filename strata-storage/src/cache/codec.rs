//! Value codec and the bean envelope.
//!
//! Cached beans are wrapped in an envelope that records the bean's type tag
//! and primary key. Decoding checks both, so a payload written for another
//! type or another row surfaces as [`CacheError::Inconsistency`] and is never
//! trusted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strata_core::{CacheError, CacheResult, Entity, Pk};

/// Serializes values to bytes for the byte store.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T>;
}

/// JSON codec over serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Encode {
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode {
            reason: e.to_string(),
        })
    }
}

#[derive(Serialize)]
struct BeanEnvelopeRef<'a, T> {
    type_tag: &'a str,
    pk: Pk,
    bean: &'a T,
}

#[derive(Deserialize)]
struct BeanHeader {
    type_tag: String,
    pk: Pk,
}

#[derive(Deserialize)]
struct BeanEnvelope<T> {
    bean: T,
}

/// Encode a bean with its type tag and primary key.
pub fn encode_bean<C: Codec, T: Entity>(codec: &C, bean: &T) -> CacheResult<Vec<u8>> {
    codec.encode(&BeanEnvelopeRef {
        type_tag: T::type_tag(),
        pk: bean.primary_key(),
        bean,
    })
}

/// Decode a bean, checking that it was written for `T` and for `expected`.
pub fn decode_bean<C: Codec, T: Entity>(codec: &C, expected: &Pk, bytes: &[u8]) -> CacheResult<T> {
    let table = T::table_meta().name;

    let header: BeanHeader = codec.decode(bytes)?;
    if header.type_tag != T::type_tag() {
        return Err(CacheError::Inconsistency {
            table,
            reason: format!("expected {}, found {}", T::type_tag(), header.type_tag),
        });
    }
    if &header.pk != expected {
        return Err(CacheError::Inconsistency {
            table,
            reason: format!("expected key {}, envelope holds {}", expected, header.pk),
        });
    }

    let envelope: BeanEnvelope<T> = codec.decode(bytes)?;
    let actual = envelope.bean.primary_key();
    if &actual != expected {
        return Err(CacheError::Inconsistency {
            table,
            reason: format!("expected key {}, decoded {}", expected, actual),
        });
    }
    Ok(envelope.bean)
}
