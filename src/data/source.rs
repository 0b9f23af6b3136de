use std::path::Path;

use anyhow::Result;

use crate::data::parquet::ParquetSource;
use crate::domain::error::DataError;
use crate::domain::traits::EventSource;

/// Event file formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Hdf5,
}

impl FileFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "parquet" | "pq"       => Ok(FileFormat::Parquet),
            "h5" | "hdf5" | "he5"  => Ok(FileFormat::Hdf5),
            other                  => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Hdf5    => "h5",
        }
    }
}

/// The reader for `path`, chosen by extension.
pub fn open_source(path: &Path) -> Result<Box<dyn EventSource>> {
    match FileFormat::from_path(path)? {
        FileFormat::Parquet => Ok(Box::new(ParquetSource)),
        FileFormat::Hdf5    => hdf5_source(),
    }
}

#[cfg(feature = "hdf5")]
fn hdf5_source() -> Result<Box<dyn EventSource>> {
    Ok(Box::new(crate::data::hdf5::Hdf5Source))
}

#[cfg(not(feature = "hdf5"))]
fn hdf5_source() -> Result<Box<dyn EventSource>> {
    Err(anyhow::Error::new(DataError::UnsupportedFormat("h5".into()))
        .context("built without the `hdf5` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.parquet")).unwrap(), FileFormat::Parquet);
        assert_eq!(FileFormat::from_path(Path::new("x.H5")).unwrap(), FileFormat::Hdf5);
        assert!(matches!(
            FileFormat::from_path(Path::new("events.csv")),
            Err(DataError::UnsupportedFormat(ref e)) if e == "csv"
        ));
    }

    #[test]
    fn test_open_source_rejects_unknown() {
        assert!(open_source(Path::new("events.root")).is_err());
    }
}
