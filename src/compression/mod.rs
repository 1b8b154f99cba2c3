// src/compression/mod.rs

//! Decompression of source archives
//!
//! Release tarballs come gzip, xz or zstd compressed, often from URLs that
//! say nothing about the format (`/archive/refs/tags/0.6.40.tar.gz` is
//! honest, `/download?id=7` is not). The codec is sniffed from the payload.

use std::io::{self, Read};
use strum_macros::Display;

/// Compression wrapped around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Codec {
    /// Uncompressed tar
    Plain,
    Gzip,
    Xz,
    Zstd,
}

const SIGNATURES: &[(Codec, &[u8])] = &[
    (Codec::Gzip, &[0x1f, 0x8b]),
    (Codec::Xz, &[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
    (Codec::Zstd, &[0x28, 0xb5, 0x2f, 0xfd]),
];

impl Codec {
    /// Identify the codec from the leading bytes; unknown data is `Plain`
    pub fn sniff(data: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(_, magic)| data.starts_with(magic))
            .map(|(codec, _)| *codec)
            .unwrap_or(Codec::Plain)
    }

    /// Wrap `data` in a reader that yields the decompressed stream
    pub fn reader<'a>(&self, data: &'a [u8]) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Codec::Plain => Box::new(data),
            Codec::Gzip => Box::new(flate2::read::GzDecoder::new(data)),
            Codec::Xz => Box::new(xz2::read::XzDecoder::new(data)),
            Codec::Zstd => Box::new(zstd::Decoder::new(data)?),
        })
    }
}

/// Sniff the codec of `data` and open a decompressing reader over it
pub fn decompress(data: &[u8]) -> io::Result<(Codec, Box<dyn Read + '_>)> {
    let codec = Codec::sniff(data);
    let reader = codec.reader(data)?;
    Ok((codec, reader))
}
