//! Archive bundler
//!
//! Packs a flat set of blob files into a single `.tar.bz2` and unpacks it
//! again. Files are stored under their basenames with no directories.
//!
//! The output must be deterministic: the sync protocol compares archive
//! MD5s to decide whether anything changed, so identical blob sets have to
//! produce byte-identical archives. The file list is sorted and every tar
//! header carries fixed metadata (mtime 0, uid/gid 0, mode 0644).

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use tracing::debug;

use crate::error::{Error, Result};

/// Pack `files` into a single compressed archive at `archive_path`
///
/// Each file is stored under its basename. The input order does not
/// matter; entries are written in sorted order.
pub fn pack(archive_path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut files: Vec<PathBuf> = files.to_vec();
    files.sort();
    debug!("packing {} files into {:?}", files.len(), archive_path);

    let out = File::create(archive_path)?;
    let encoder = BzEncoder::new(out, Compression::best());
    let mut builder = tar::Builder::new(encoder);

    for file in &files {
        let name = file
            .file_name()
            .ok_or_else(|| Error::Io(std::io::Error::other(format!("no basename: {file:?}"))))?;
        let data = fs::read(file)?;

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        builder.append_data(&mut header, name, data.as_slice())?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Unpack an archive produced by [`pack`] into `dest_dir`
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    debug!("unpacking {:?} into {:?}", archive_path, dest_dir);
    fs::create_dir_all(dest_dir)?;
    let file = File::open(archive_path)?;
    let decoder = BzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest_dir)?;
    Ok(())
}
