//! Encoding and decoding enclosures to JSON or YAML
//!
//! Thin helpers over `serde_json` / `serde_yaml` so callers do not have to
//! drive a `DeserializeSeed` by hand. Files are read and written buffered.

use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, DeserializeSeed, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::enclosure::{Enclosure, EnclosureSeed};

/// Errors from encoding or decoding an enclosure
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Encoded output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Unknown format: {name} (expected json or yaml)")]
    UnknownFormat { name: String },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Persisted encoding of an enclosure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Guess the format from a file extension, if it names one
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for Format {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(CodecError::UnknownFormat { name: s.to_string() }),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}

/// Encode `enclosure` into `writer`
pub fn encode_to_writer<T, W>(format: Format, writer: W, enclosure: &Enclosure<T>, pretty: bool) -> CodecResult<()>
where
    T: Serialize,
    W: Write,
{
    debug!(%format, pretty, declared_total = enclosure.declared_total(), "encode_to_writer: called");
    match format {
        Format::Json if pretty => serde_json::to_writer_pretty(writer, enclosure)?,
        Format::Json => serde_json::to_writer(writer, enclosure)?,
        Format::Yaml => serde_yaml::to_writer(writer, enclosure)?,
    }
    Ok(())
}

/// Encode `enclosure` into a string
pub fn encode_to_string<T: Serialize>(format: Format, enclosure: &Enclosure<T>, pretty: bool) -> CodecResult<String> {
    let mut buf = Vec::new();
    encode_to_writer(format, &mut buf, enclosure, pretty)?;
    Ok(String::from_utf8(buf)?)
}

/// Decode an enclosure from `reader` using `seed` for publisher and counter
pub fn decode_from_reader<T, R>(format: Format, reader: R, seed: EnclosureSeed<T>) -> CodecResult<Enclosure<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    debug!(%format, "decode_from_reader: called");
    let enclosure = match format {
        Format::Json => {
            let mut de = serde_json::Deserializer::from_reader(reader);
            let enclosure = seed.deserialize(&mut de)?;
            de.end()?;
            enclosure
        }
        Format::Yaml => seed.deserialize(serde_yaml::Deserializer::from_reader(reader))?,
    };
    Ok(enclosure)
}

/// Decode an enclosure from a string
pub fn decode_from_str<T: DeserializeOwned>(format: Format, s: &str, seed: EnclosureSeed<T>) -> CodecResult<Enclosure<T>> {
    decode_from_reader(format, s.as_bytes(), seed)
}

/// Encode `enclosure` into the file at `path`, replacing it
pub fn write_file<T: Serialize>(path: &Path, format: Format, enclosure: &Enclosure<T>, pretty: bool) -> CodecResult<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_to_writer(format, &mut writer, enclosure, pretty)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        %format,
        declared_total = enclosure.declared_total(),
        counted = enclosure.counter().count(),
        "Enclosure written"
    );
    Ok(())
}

/// Decode the enclosure stored in the file at `path`
pub fn read_file<T: DeserializeOwned>(path: &Path, format: Format, seed: EnclosureSeed<T>) -> CodecResult<Enclosure<T>> {
    let file = fs::File::open(path)?;
    let enclosure = decode_from_reader(format, BufReader::new(file), seed)?;
    info!(
        path = %path.display(),
        %format,
        declared_total = enclosure.declared_total(),
        counted = enclosure.counter().count(),
        "Enclosure read"
    );
    Ok(enclosure)
}

/// Read only the declared total of a persisted enclosure
///
/// The payload is skipped without being decoded, so no counter is touched.
pub fn peek_declared_total<R: Read>(format: Format, reader: R) -> CodecResult<u64> {
    debug!(%format, "peek_declared_total: called");
    let total = match format {
        Format::Json => {
            let mut de = serde_json::Deserializer::from_reader(reader);
            let total = (&mut de).deserialize_tuple(2, DeclaredTotalVisitor)?;
            de.end()?;
            total
        }
        Format::Yaml => serde_yaml::Deserializer::from_reader(reader).deserialize_tuple(2, DeclaredTotalVisitor)?,
    };
    Ok(total)
}

/// Read only the declared total of the enclosure stored at `path`
pub fn peek_file(path: &Path, format: Format) -> CodecResult<u64> {
    let file = fs::File::open(path)?;
    peek_declared_total(format, BufReader::new(file))
}

struct DeclaredTotalVisitor;

impl<'de> Visitor<'de> for DeclaredTotalVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [declared_total, payload] pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<u64, A::Error> {
        let total: u64 = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
        // Drain the payload so the sequence is well-formed for the deserializer
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(total)
    }
}
