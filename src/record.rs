use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Canonical company name as stored in the companies table.
pub type CompanyName = String;

/// Primary key of a news row. The store may use integer or text keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        RecordId::Int(id.into())
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companies: Vec<CompanyName>,
}

impl NewsRecord {
    pub fn new(id: impl Into<RecordId>, content: &str) -> Self {
        Self {
            id: id.into(),
            content: content.to_string(),
            companies: Vec::new(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Row of the companies table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRow {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub aliases: Vec<String>,
}

impl CompanyRow {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), aliases: Vec::new() }
    }

    pub fn with_aliases(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

fn null_as_empty_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter().flatten().collect())
}

/// News row as read from the store, before rows without a key are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsRow {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// One page read from the store. `rows` counts every row the store returned,
/// including the ones dropped for having no id, so paging can advance past them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsPage {
    pub records: Vec<NewsRecord>,
    pub rows: usize,
}

impl NewsPage {
    pub fn from_records(records: Vec<NewsRecord>) -> Self {
        let rows = records.len();
        Self { records, rows }
    }

    pub fn from_rows(rows: Vec<NewsRow>) -> Self {
        let total = rows.len();
        let records: Vec<NewsRecord> = rows
            .into_iter()
            .filter_map(|row| {
                row.id.map(|id| NewsRecord { id, content: row.content, companies: Vec::new() })
            })
            .collect();
        if records.len() < total {
            warn!(dropped = total - records.len(), "Skipping news rows without an id");
        }
        Self { records, rows: total }
    }

    /// Rows the store returned that cannot be processed.
    pub fn dropped(&self) -> usize {
        self.rows - self.records.len()
    }
}

/// A window of records fetched from the store in key order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub offset: usize,
    pub records: Vec<NewsRecord>,
    /// Rows in this window skipped for having no id.
    pub dropped: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub record_id: RecordId,
    pub matched: BTreeSet<CompanyName>,
}
