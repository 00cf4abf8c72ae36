use crate::header::{FileHeader, HeaderSource, SERIES_DESCRIPTION, SERIES_INSTANCE_UID};

use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A file and the header fields the importer groups by.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub series_uid: String,
    pub series_description: String,
    /// Value of the frame-identifying tag, once the frame analysis knows it.
    pub frame_tag_value: Option<String>,
}

/// Files sharing one Series Instance UID, in input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subseries {
    pub key: String,
    pub description: String,
    pub files: Vec<FileRecord>,
}

impl Subseries {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|record| record.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Partitions files into subseries by Series Instance UID.
pub struct SeriesGrouper<'a, H> {
    headers: &'a H,
}

impl<'a, H: HeaderSource> SeriesGrouper<'a, H> {
    pub fn new(headers: &'a H) -> Self {
        Self { headers }
    }

    /// Extract the grouping fields of one file. Never fails: an unreadable
    /// header yields `"Unknown"` for both fields.
    pub fn record(&self, path: &Path) -> FileRecord {
        let header = self.headers.load_file_header(path).unwrap_or_else(|err| {
            warn!("{err}");
            FileHeader::new()
        });
        FileRecord {
            path: path.to_path_buf(),
            series_uid: header.value(SERIES_INSTANCE_UID),
            series_description: header.value(SERIES_DESCRIPTION),
            frame_tag_value: None,
        }
    }

    /// Group `files` by series. The description of each subseries is the one
    /// seen last for its key.
    pub fn group(&self, files: &[impl AsRef<Path>]) -> BTreeMap<String, Subseries> {
        let mut subseries: BTreeMap<String, Subseries> = BTreeMap::new();
        for file in files {
            let record = self.record(file.as_ref());
            let entry = subseries
                .entry(record.series_uid.clone())
                .or_insert_with(|| Subseries {
                    key: record.series_uid.clone(),
                    ..Default::default()
                });
            entry.description = record.series_description.clone();
            entry.files.push(record);
        }
        subseries
    }
}
