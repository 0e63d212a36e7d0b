// src/compression/mod.rs
//! Codecs for the control tarball of a package
//!
//! A `.deb` names its control member `control.tar`, `control.tar.gz` or
//! `control.tar.xz`; the suffix alone decides the codec. Packages using
//! anything else (zstd, bzip2) are rejected rather than guessed at.

use std::io::{self, Read, Write};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// xz preset for re-encoded members, matching `xz` and `dpkg-deb` defaults
const XZ_PRESET: u32 = 6;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Cannot decode {format} control tarball: {source}")]
    Decode {
        format: CompressionFormat,
        source: io::Error,
    },

    #[error("Cannot encode {format} control tarball: {source}")]
    Encode {
        format: CompressionFormat,
        source: io::Error,
    },
}

/// How a control tarball is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum CompressionFormat {
    /// Plain `control.tar`
    None,
    Gzip,
    Xz,
}

impl CompressionFormat {
    /// Resolve the text following `control.tar` in a member name
    ///
    /// # Examples
    /// ```
    /// use pr_test::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_suffix(".xz"), Some(CompressionFormat::Xz));
    /// assert_eq!(CompressionFormat::from_suffix(""), Some(CompressionFormat::None));
    /// assert_eq!(CompressionFormat::from_suffix(".zst"), None);
    /// ```
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|format| format.suffix() == suffix)
    }

    /// Text appended to `control.tar` for this format
    pub fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Xz => ".xz",
        }
    }
}

/// Wrap `reader` so it yields the uncompressed tarball
pub fn decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}

/// Uncompress a whole member
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let mut tarball = Vec::with_capacity(data.len() * 4);
    decoder(data, format)
        .read_to_end(&mut tarball)
        .map_err(|source| CompressionError::Decode { format, source })?;
    Ok(tarball)
}

/// Compress a rebuilt tarball with the member's original codec
pub fn compress(tarball: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let encode_err = |source| CompressionError::Encode { format, source };

    match format {
        CompressionFormat::None => Ok(tarball.to_vec()),
        CompressionFormat::Gzip => {
            let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            gz.write_all(tarball).map_err(encode_err)?;
            gz.finish().map_err(encode_err)
        }
        CompressionFormat::Xz => {
            let mut xz = xz2::write::XzEncoder::new(Vec::new(), XZ_PRESET);
            xz.write_all(tarball).map_err(encode_err)?;
            xz.finish().map_err(encode_err)
        }
    }
}
