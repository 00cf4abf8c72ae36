//! Access to DICOM header fields in the dump format the grouping and frame
//! analysis code expects: `(gggg,eeee) VR [value]`.

use dicom::core::{Tag, VR, header::Header};
use dicom::object::{DefaultDicomObject, OpenFileOptions, ReadError, mem::InMemElement};
use dicom_dictionary_std::tags;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Series Instance UID (0020,000E)
pub const SERIES_INSTANCE_UID: Tag = tags::SERIES_INSTANCE_UID;
/// Series Description (0008,103E)
pub const SERIES_DESCRIPTION: Tag = tags::SERIES_DESCRIPTION;

/// Substituted whenever a bracketed value cannot be extracted.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("No such file: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read DICOM header of {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ReadError,
    },
}

/// The header dump of one file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileHeader {
    lines: BTreeMap<Tag, String>,
}

impl FileHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header from plain values, rendering each one the way
    /// [`DicomFileHeaders`] does.
    pub fn from_values<'a>(values: impl IntoIterator<Item = (Tag, &'a str)>) -> Self {
        let mut header = Self::new();
        for (tag, value) in values {
            header.insert(tag, format_line(tag, "LO", value));
        }
        header
    }

    /// Store a raw dump line for `tag`.
    pub fn insert(&mut self, tag: Tag, line: impl Into<String>) {
        self.lines.insert(tag, line.into());
    }

    /// The dump line of `tag`, or the empty string if the file has no such
    /// element.
    pub fn header_value(&self, tag: Tag) -> &str {
        self.lines.get(&tag).map(String::as_str).unwrap_or("")
    }

    /// The bracketed value of `tag`, or [`UNKNOWN`].
    pub fn value(&self, tag: Tag) -> String {
        bracketed_value(self.header_value(tag))
    }

    /// The backslash separated numbers of `tag`, or `None` if the element is
    /// missing or any component is not a number.
    pub fn numbers(&self, tag: Tag) -> Option<Vec<f64>> {
        let value = self.lines.get(&tag).map(|line| bracketed_value(line))?;
        value
            .split('\\')
            .map(|component| component.trim().parse().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Extract the text between the first `[` and the first `]` after it.
///
/// Returns exactly [`UNKNOWN`] when either delimiter is missing.
pub fn bracketed_value(line: &str) -> String {
    line.find('[')
        .and_then(|open| {
            let rest = &line[open + 1..];
            rest.find(']').map(|close| rest[..close].to_string())
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn format_line(tag: Tag, vr: &str, value: &str) -> String {
    format!(
        "({:04x},{:04x}) {} [{}]",
        tag.group(),
        tag.element(),
        vr,
        value
    )
}

/// Source of per-file header dumps.
pub trait HeaderSource {
    fn load_file_header(&self, file: &Path) -> Result<FileHeader, HeaderError>;
}

/// Reads headers straight from DICOM files, stopping before the pixel data.
#[derive(Clone, Copy, Debug, Default)]
pub struct DicomFileHeaders;

impl DicomFileHeaders {
    fn render(object: &DefaultDicomObject) -> FileHeader {
        let mut header = FileHeader::new();
        for element in object.iter() {
            // sequences have no textual value
            let Some(value) = element_text(element) else {
                continue;
            };
            let tag = element.tag();
            header.insert(
                tag,
                format_line(
                    tag,
                    &element.vr().to_string(),
                    value.trim_matches(|c: char| c.is_whitespace() || c == '\0'),
                ),
            );
        }
        header
    }
}

/// Text of one element. Private tags of implicit VR files arrive as UN byte
/// strings; those holding printable ASCII are read as text.
fn element_text(element: &InMemElement) -> Option<String> {
    if element.vr() == VR::UN {
        if let Ok(bytes) = element.to_bytes() {
            if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ' || *b == 0) {
                return Some(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }
    element.to_str().ok().map(|value| value.into_owned())
}

impl HeaderSource for DicomFileHeaders {
    fn load_file_header(&self, file: &Path) -> Result<FileHeader, HeaderError> {
        if !file.is_file() {
            return Err(HeaderError::NotFound(file.to_path_buf()));
        }
        let object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(file)
            .map_err(|source| HeaderError::Read {
                path: file.to_path_buf(),
                source,
            })?;
        Ok(Self::render(&object))
    }
}
