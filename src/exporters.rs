pub mod gmod;
pub mod vmd;

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub use gmod::{GModExporter, Granularity};
pub use vmd::{VmdExporter, VmdMotion};

/// Characters that cannot appear in a file name on Windows.
pub const FORBIDDEN_FILENAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Something that can turn its state into the bytes of an output file.
pub trait Exporter {
    /// Encode the complete output file.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Extension added to output paths that have none.
    fn default_extension(&self) -> Option<&str> {
        None
    }

    /// Encode and write to `path`, returning the path actually written.
    ///
    /// The file name is sanitized and missing parent directories are created.
    /// Nothing is left at the destination if encoding or writing fails.
    fn export(&self, path: &Path) -> Result<PathBuf> {
        let path = sanitize_path(path, self.default_extension());
        let data = self.encode()?;

        write_atomic(&path, &data)?;
        log::info!("Wrote {} bytes to {}", data.len(), path.display());

        Ok(path)
    }
}

/// Replace forbidden characters in the file name component of `path`.
///
/// Directory components are left alone. Non-ASCII names are allowed but logged.
pub fn sanitize_path(path: &Path, default_extension: Option<&str>) -> PathBuf {
    let file_name = match path.file_name() {
        Some(v) => v.to_string_lossy().to_string(),
        None => return path.to_path_buf(),
    };

    let sanitized = file_name
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect::<String>();
    if !sanitized.is_ascii() {
        log::warn!("Output file name contains non-ASCII characters: {sanitized}");
    }

    let mut r = path.with_file_name(sanitized);
    if let Some(ext) = default_extension {
        if r.extension().is_none() {
            r.set_extension(ext);
        }
    }

    r
}

/// Write `data` next to `path` and move it into place once complete.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            log::debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let written = (|| -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(&partial)?);
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = written.and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(Error::io(path, e));
    }

    Ok(())
}
