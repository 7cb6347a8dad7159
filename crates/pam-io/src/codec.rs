//! gzip-compressed JSON, the byte format of every artifact.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pam_core::{PamError, PamResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize>(value: &T) -> PamResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, value)?;
    Ok(encoder.finish()?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> PamResult<T> {
    serde_json::from_reader(GzDecoder::new(bytes))
        .map_err(|err| PamError::Parse(format!("decoding artifact: {err}")))
}
