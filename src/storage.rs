//! Durable stores: listing logs, the seen-lead set and the security skip table.
//!
//! Listing logs are line-delimited JSON, appended and fsynced one record at a
//! time. The skip table is a small pretty-printed JSON object rewritten on
//! every change.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::ListingRecord;

pub const ALL_LISTINGS_FILE: &str = "all_cars.jsonl";
pub const LEADS_FILE: &str = "lead_cars.jsonl";
pub const SECURITY_SKIP_FILE: &str = "security_skip.json";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// An append-only line-delimited JSON file of listing records.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line and sync it to disk.
    pub fn append(&self, record: &ListingRecord) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Every parseable record in file order. Malformed lines are skipped.
    pub fn read_all(&self) -> LedgerResult<Vec<ListingRecord>> {
        let mut records = Vec::new();
        for (lineno, value) in self.read_values()? {
            match serde_json::from_value::<ListingRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{}:{}: skipping record: {}", self.path.display(), lineno, e),
            }
        }
        Ok(records)
    }

    /// Distinct `Link` values across all lines.
    pub fn links(&self) -> LedgerResult<HashSet<String>> {
        Ok(self
            .read_values()?
            .into_iter()
            .filter_map(|(_, value)| value.get("Link")?.as_str().map(str::to_string))
            .collect())
    }

    fn read_values(&self) -> LedgerResult<Vec<(usize, serde_json::Value)>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => values.push((idx + 1, value)),
                Err(e) => warn!("{}:{}: malformed line: {}", self.path.display(), idx + 1, e),
            }
        }
        Ok(values)
    }
}

/// Links already delivered as leads.
#[derive(Debug, Clone, Default)]
pub struct SeenLeads {
    links: HashSet<String>,
}

impl SeenLeads {
    /// Rebuild the set by replaying the lead log.
    pub fn from_store(store: &JsonlStore) -> LedgerResult<Self> {
        let links = store.links()?;
        debug!("Loaded {} seen leads from {}", links.len(), store.path().display());
        Ok(Self { links })
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn insert(&mut self, link: impl Into<String>) -> bool {
        self.links.insert(link.into())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Per-link count of security challenges, persisted as a JSON object.
#[derive(Debug, Clone)]
pub struct SecuritySkipTable {
    path: PathBuf,
    hits: BTreeMap<String, u32>,
}

impl SecuritySkipTable {
    /// Load the table, starting empty when the file is missing or unreadable.
    ///
    /// A file that does not parse is moved aside first so the next save
    /// cannot overwrite it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hits = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                let aside = Self::set_aside(&path);
                error!(
                    "Unreadable skip table {} ({}), moved to {}",
                    path.display(),
                    e,
                    aside.display()
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Could not read skip table {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self { path, hits }
    }

    fn set_aside(path: &Path) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let aside = path.with_extension(format!("json.corrupt-{}", stamp));
        if let Err(e) = fs::rename(path, &aside) {
            error!("Could not move {} aside: {}", path.display(), e);
        }
        aside
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hits(&self, link: &str) -> u32 {
        self.hits.get(link).copied().unwrap_or(0)
    }

    /// Whether `link` has reached the hit ceiling.
    pub fn is_skipped(&self, link: &str, max_hits: u32) -> bool {
        self.hits(link) >= max_hits
    }

    /// Count one more challenge for `link`, returning the new count.
    pub fn record_hit(&mut self, link: &str) -> u32 {
        let count = self.hits.entry(link.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget one link, or every link when `link` is `None`. Returns how many were removed.
    pub fn reset(&mut self, link: Option<&str>) -> usize {
        match link {
            Some(link) => usize::from(self.hits.remove(link).is_some()),
            None => {
                let n = self.hits.len();
                self.hits.clear();
                n
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.hits.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Write the table atomically.
    pub fn save(&self) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.hits)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// The three stores of one data directory.
#[derive(Debug, Clone)]
pub struct LeadLedger {
    pub all_listings: JsonlStore,
    pub leads: JsonlStore,
    pub skip_table_path: PathBuf,
}

impl LeadLedger {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            all_listings: JsonlStore::new(data_dir.join(ALL_LISTINGS_FILE)),
            leads: JsonlStore::new(data_dir.join(LEADS_FILE)),
            skip_table_path: data_dir.join(SECURITY_SKIP_FILE),
        }
    }

    pub fn load_seen(&self) -> LedgerResult<SeenLeads> {
        SeenLeads::from_store(&self.leads)
    }

    pub fn load_skips(&self) -> SecuritySkipTable {
        SecuritySkipTable::load(&self.skip_table_path)
    }
}
