//! Column families: named, independently-configured key spaces.
//!
//! Each family owns a current memory table and remembers the WAL segment it
//! has absorbed through (`log_number`), which recovery uses to skip records
//! a family already contains. The applier walks families through the
//! [`ColumnFamilyMemTables`] cursor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{Error, Result};
use crate::memtable::MemTable;
use crate::options::MemTableOptions;

/// Descriptor of one column family.
#[derive(Debug)]
pub struct ColumnFamilyData {
    /// Family id; 0 is the default family.
    id: u32,
    /// Human-readable name.
    name: String,
    /// WAL segment id this family has absorbed through.
    log_number: AtomicU64,
    /// Current memory table; swapped on flush.
    mem: ArcSwap<MemTable>,
    /// Per-family configuration shared with the tables it spawns.
    options: Arc<MemTableOptions>,
}

impl ColumnFamilyData {
    /// Create a family with a fresh memory table.
    pub fn new(id: u32, name: impl Into<String>, options: MemTableOptions) -> Result<Arc<Self>> {
        options.validate()?;
        let options = Arc::new(options);
        let mem = MemTable::new(id as u64, Arc::clone(&options));
        Ok(Arc::new(Self {
            id,
            name: name.into(),
            log_number: AtomicU64::new(0),
            mem: ArcSwap::from_pointee(mem),
            options,
        }))
    }

    /// Family id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current memory table.
    pub fn mem(&self) -> Arc<MemTable> {
        self.mem.load_full()
    }

    /// Per-family configuration.
    pub fn options(&self) -> &Arc<MemTableOptions> {
        &self.options
    }

    /// WAL segment id this family has absorbed through.
    pub fn log_number(&self) -> u64 {
        self.log_number.load(Ordering::Relaxed)
    }

    /// Record the WAL segment id this family has absorbed through.
    pub fn set_log_number(&self, log_number: u64) {
        self.log_number.store(log_number, Ordering::Relaxed);
    }

    /// Install a fresh memory table (after a flush) and return the retired
    /// one.
    pub fn switch_memtable(&self, new_id: u64) -> Arc<MemTable> {
        let fresh = Arc::new(MemTable::new(new_id, Arc::clone(&self.options)));
        self.mem.swap(fresh)
    }
}

/// Stateful cursor over a set of column-family memory tables.
///
/// `seek` positions the cursor; the accessors read the family under it.
/// Under concurrent application each thread must hold its own clone of the
/// implementing set, since the cursor is mutable state.
pub trait ColumnFamilyMemTables {
    /// Position the cursor on `cf_id`. Returns false when the family does
    /// not exist.
    fn seek(&mut self, cf_id: u32) -> bool;

    /// Descriptor under the cursor.
    fn current(&self) -> Option<&Arc<ColumnFamilyData>>;

    /// Memory table under the cursor.
    fn memtable(&self) -> Option<Arc<MemTable>> {
        self.current().map(|cfd| cfd.mem())
    }

    /// WAL segment id the family under the cursor has absorbed through.
    fn log_number(&self) -> u64 {
        self.current().map(|cfd| cfd.log_number()).unwrap_or(0)
    }
}

/// Map-backed [`ColumnFamilyMemTables`] implementation.
#[derive(Debug, Default, Clone)]
pub struct ColumnFamilySet {
    families: HashMap<u32, Arc<ColumnFamilyData>>,
    current: Option<Arc<ColumnFamilyData>>,
}

impl ColumnFamilySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a family.
    pub fn create_family(
        &mut self,
        id: u32,
        name: impl Into<String>,
        options: MemTableOptions,
    ) -> Result<Arc<ColumnFamilyData>> {
        let name = name.into();
        if self.families.contains_key(&id) {
            return Err(Error::invalid_argument(format!(
                "column family {} already exists",
                id
            )));
        }
        let cfd = ColumnFamilyData::new(id, name, options)?;
        self.families.insert(id, Arc::clone(&cfd));
        Ok(cfd)
    }

    /// Look up a family by id.
    pub fn family(&self, id: u32) -> Option<&Arc<ColumnFamilyData>> {
        self.families.get(&id)
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether the set has no families.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl ColumnFamilyMemTables for ColumnFamilySet {
    fn seek(&mut self, cf_id: u32) -> bool {
        match self.families.get(&cf_id) {
            Some(cfd) => {
                self.current = Some(Arc::clone(cfd));
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    fn current(&self) -> Option<&Arc<ColumnFamilyData>> {
        self.current.as_ref()
    }
}
