// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Lodestar.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Outer compression envelope of the primary executable

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Legacy `.lzma` (LZMA-alone) stream
    Lzma,
    Gzip,
    Zstd,
}

impl Envelope {
    /// Pick the envelope from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "lzma" => Some(Self::Lzma),
            "gz" => Some(Self::Gzip),
            "zst" | "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }

    /// `launcher.pack.lzma` -> `launcher.pack`
    pub fn intermediate_path(path: &Path) -> PathBuf {
        path.with_extension("")
    }

    /// Decode `input` into `output`, replacing it. Returns the decoded size.
    pub fn decode(self, input: &Path, output: &Path) -> io::Result<u64> {
        let result = self.decode_into(input, output);
        if result.is_err() {
            let _ = std::fs::remove_file(output);
        }
        result
    }

    fn decode_into(self, input: &Path, output: &Path) -> io::Result<u64> {
        let mut reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output)?);

        match self {
            Self::Lzma => lzma_rs::lzma_decompress(&mut reader, &mut writer)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?,
            Self::Gzip => {
                let mut decoder = flate2::bufread::GzDecoder::new(reader);
                io::copy(&mut decoder, &mut writer)?;
            }
            Self::Zstd => zstd::stream::copy_decode(reader, &mut writer)?,
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(writer.get_ref().metadata()?.len())
    }
}
