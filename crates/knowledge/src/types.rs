//! Knowledge system type definitions.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Kind of content a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ChunkType {
    #[default]
    Text,
    Table,
    TableWithContext,
}

impl ChunkType {
    /// Parse a type label. Anything that is not a table kind is text.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "table" => ChunkType::Table,
            "table_with_context" => ChunkType::TableWithContext,
            _ => ChunkType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Table => "table",
            ChunkType::TableWithContext => "table_with_context",
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, ChunkType::Table | ChunkType::TableWithContext)
    }
}

impl From<String> for ChunkType {
    fn from(label: String) -> Self {
        ChunkType::from_label(&label)
    }
}

impl From<ChunkType> for &'static str {
    fn from(chunk_type: ChunkType) -> Self {
        chunk_type.as_str()
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widest page range kept as a range. Wider spans are kept as labels.
pub const MAX_PAGE_SPAN: u32 = 50;

/// Page reference of a chunk: a single page, an inclusive range of merged
/// pages ("3-5"), or an opaque label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageRef {
    Number(u32),
    Range(u32, u32),
    Label(String),
}

impl PageRef {
    /// Parse a page value as written in metadata or JSONL records.
    ///
    /// Reversed ranges and ranges wider than [`MAX_PAGE_SPAN`] become labels.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();

        if let Ok(n) = value.parse::<u32>() {
            return PageRef::Number(n);
        }

        if let Some((start, end)) = value.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<u32>(), end.trim().parse::<u32>())
            {
                if start <= end && end - start <= MAX_PAGE_SPAN {
                    return PageRef::Range(start, end);
                }
            }
        }

        PageRef::Label(value.to_string())
    }

    fn from_int(value: i64) -> Self {
        match u32::try_from(value) {
            Ok(n) => PageRef::Number(n),
            Err(_) => PageRef::Label(value.to_string()),
        }
    }

    /// Read a page value from a JSON metadata field.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value::<PageRef>(value.clone())
            .ok()
            .filter(|page| !page.is_blank())
    }

    /// Concrete page numbers covered by this reference. Labels, and ranges
    /// wider than [`MAX_PAGE_SPAN`], cover none.
    pub fn pages(&self) -> Vec<u32> {
        match self {
            PageRef::Number(n) => vec![*n],
            PageRef::Range(start, end) if end.saturating_sub(*start) <= MAX_PAGE_SPAN => {
                (*start..=*end).collect()
            }
            PageRef::Range(..) => Vec::new(),
            PageRef::Label(_) => Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, PageRef::Label(label) if label.is_empty())
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{}", n),
            PageRef::Range(start, end) => write!(f, "{}-{}", start, end),
            PageRef::Label(label) => f.write_str(label),
        }
    }
}

impl Serialize for PageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageRef::Number(n) => serializer.serialize_u32(*n),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for PageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawPage::deserialize(deserializer)? {
            RawPage::Int(n) => Ok(PageRef::from_int(n)),
            RawPage::Float(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
                Ok(PageRef::Number(f as u32))
            }
            RawPage::Float(f) => Err(de::Error::custom(format!("invalid page number {}", f))),
            RawPage::Text(s) => Ok(PageRef::parse(&s)),
        }
    }
}

/// Retrieval identity of a chunk. Chunks sharing a key are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub source: String,
    pub page: String,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} p{}", self.source, self.page)
    }
}

/// Placeholder source name for chunks without one.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Placeholder page for chunks without one.
pub const UNKNOWN_PAGE: &str = "N/A";

/// A retrieved unit of document evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Raw text of the chunk
    pub content: String,

    /// Document name or path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Page or merged page range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRef>,

    /// Content kind
    #[serde(default, rename = "type")]
    pub chunk_type: ChunkType,

    /// Opaque metadata; `source` and `page` are read from here when the
    /// top-level fields are absent
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Chunk {
    pub fn new(
        content: impl Into<String>,
        source: impl Into<String>,
        page: PageRef,
        chunk_type: ChunkType,
    ) -> Self {
        Self {
            content: content.into(),
            source: Some(source.into()),
            page: Some(page),
            chunk_type,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Source name, falling back to `metadata.source`.
    pub fn source_name(&self) -> Option<&str> {
        self.source
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.metadata
                    .get("source")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
            })
    }

    /// Page reference, falling back to `metadata.page`.
    pub fn page_ref(&self) -> Option<PageRef> {
        self.page
            .clone()
            .filter(|p| !p.is_blank())
            .or_else(|| self.metadata.get("page").and_then(PageRef::from_json))
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source: self.source_name().unwrap_or(UNKNOWN_SOURCE).to_string(),
            page: self
                .page_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| UNKNOWN_PAGE.to_string()),
        }
    }

    /// Copy `source` and `page` up from metadata when missing at top level.
    pub fn resolved(mut self) -> Self {
        if self.source.as_deref().map_or(true, str::is_empty) {
            self.source = self.source_name().map(str::to_string);
        }
        if self.page.as_ref().map_or(true, PageRef::is_blank) {
            self.page = self.page_ref();
        }
        self
    }
}

/// Filter applied to a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    /// `table` and `table_with_context` chunks
    Tables,

    /// Everything that is not a table
    Text,

    /// Exact `(source, page)` lookup
    Page { source: String, page: u32 },
}

impl ChunkFilter {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            ChunkFilter::Tables => chunk.chunk_type.is_table(),
            ChunkFilter::Text => !chunk.chunk_type.is_table(),
            ChunkFilter::Page { source, page } => {
                chunk.source_name() == Some(source.as_str())
                    && chunk.page_ref() == Some(PageRef::Number(*page))
            }
        }
    }
}

/// Result of importing chunk records into a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStats {
    /// Chunks written to the index
    pub chunks_imported: u32,

    /// Lines that could not be parsed
    pub lines_skipped: u32,

    /// Distinct sources among imported chunks
    pub sources_count: u32,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Collection name
    pub name: String,

    /// Number of distinct sources
    pub sources_count: u32,

    /// Number of chunks
    pub chunks_count: u32,

    /// Number of table chunks
    pub tables_count: u32,

    /// Database size in bytes
    pub db_size_bytes: u64,

    /// Timestamp of the last import
    pub last_import_at: Option<String>,
}
