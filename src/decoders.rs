//! Stream decoding for cross-reference stream payloads.
//!
//! Cross-reference streams are almost always `/FlateDecode` with a PNG
//! predictor (`/DecodeParms << /Predictor 12 /Columns n >>`), so this module
//! covers exactly that: zlib/deflate inflation with a raw-deflate retry for
//! files with a corrupt zlib header, plus TIFF and PNG predictor reversal.

use crate::error::{Error, Result};
use crate::object::Object;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::collections::HashMap;
use std::io::Read;

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Extract predictor parameters from a `/DecodeParms` value, which may be
    /// a dictionary or an array of dictionaries (first one wins).
    pub fn from_object(params: &Object) -> Option<Self> {
        let dict = match params {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.iter().find_map(|o| o.as_dict())?,
            _ => return None,
        };
        let int = |key: &str, default: i64| {
            dict.get(key).and_then(Object::as_integer).unwrap_or(default)
        };
        Some(Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1) as usize,
            colors: int("Colors", 1) as usize,
            bits_per_component: int("BitsPerComponent", 8) as usize,
        })
    }

    /// Bytes of sample data per row, without the PNG predictor tag byte.
    fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

/// Decode the payload of a cross-reference stream according to its own
/// dictionary: apply `/Filter` then reverse any `/DecodeParms` predictor.
///
/// # Errors
///
/// Returns `Error::Decode` for an unsupported filter or undecodable data.
pub fn decode_xref_stream_data(data: &[u8], dict: &HashMap<String, Object>) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => Vec::new(),
        Some(Object::Name(name)) => vec![name.as_str()],
        Some(Object::Array(arr)) => arr.iter().filter_map(Object::as_name).collect(),
        Some(other) => {
            return Err(Error::Decode(format!("invalid /Filter entry: {:?}", other)));
        }
    };

    let mut decoded = data.to_vec();
    for filter in filters {
        decoded = match filter {
            "FlateDecode" | "Fl" => flate_decode(&decoded)?,
            other => {
                return Err(Error::Decode(format!(
                    "unsupported xref stream filter: {}",
                    other
                )));
            }
        };
    }

    let params = dict
        .get("DecodeParms")
        .and_then(DecodeParams::from_object)
        .unwrap_or_default();
    decode_predictor(&decoded, &params)
}

/// Inflate zlib data, retrying as raw deflate when the zlib wrapper is
/// corrupt. Partial output before a late corruption is kept; the truncation
/// surfaces later as an `XrefCorrupt` during entry decoding, where the
/// recovery fallback can take over.
pub fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(input).read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        Err(e) => {
            if !output.is_empty() {
                log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
                return Ok(output);
            }
            log::info!("zlib decode failed ({}), trying raw deflate", e);
        }
    }

    output.clear();
    match DeflateDecoder::new(input).read_to_end(&mut output) {
        Ok(_) => Ok(output),
        Err(e) => {
            if !output.is_empty() {
                log::warn!("raw deflate partial recovery: {} bytes before error", output.len());
                Ok(output)
            } else {
                Err(Error::Decode(format!("FlateDecode failed: {}", e)))
            }
        }
    }
}

/// Reverse the predictor declared in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("unsupported predictor: {}", other))),
    }
}

/// TIFF predictor 2: each sample is a delta from its left neighbor.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row = params.pixel_bytes_per_row();
    if row == 0 || data.len() % row != 0 {
        return Err(Error::Decode(format!(
            "data length {} is not a multiple of row size {}",
            data.len(),
            row
        )));
    }

    let colors = params.colors.max(1);
    let mut out = Vec::with_capacity(data.len());
    for row_data in data.chunks(row) {
        for (i, &byte) in row_data.iter().enumerate() {
            if i < colors {
                out.push(byte);
            } else {
                let left = out[out.len() - colors];
                out.push(byte.wrapping_add(left));
            }
        }
    }
    Ok(out)
}

/// PNG predictors 10-15: each row carries a tag byte selecting the filter
/// applied to that row, followed by the filtered samples.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let row = pixel_bytes + 1;
    if pixel_bytes == 0 || data.len() % row != 0 {
        return Err(Error::Decode(format!(
            "data length {} is not a multiple of row size {}",
            data.len(),
            row
        )));
    }

    let bpp = (params.colors * params.bits_per_component).div_ceil(8).max(1);
    let mut out: Vec<u8> = Vec::with_capacity(data.len() / row * pixel_bytes);
    let mut prev_row = vec![0u8; pixel_bytes];

    for chunk in data.chunks(row) {
        let tag = chunk[0];
        let mut current = chunk[1..].to_vec();

        for i in 0..pixel_bytes {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev_row[i];
            let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let raw = current[i];
            current[i] = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::Decode(format!("invalid PNG row filter tag: {}", other)));
                }
            };
        }

        out.extend_from_slice(&current);
        prev_row = current;
    }
    Ok(out)
}

/// Paeth predictor function from the PNG specification.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
