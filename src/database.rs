//! Database handle
//!
//! [`Database`] ties the pieces together: it parses the header, bulk-loads
//! both row blocks (in parallel), resolves the field projection and owns the
//! decode caches. All of that lives in one immutable state object published
//! through an [`ArcSwap`]:
//!
//! - lookups take a snapshot of the current state and run against it;
//! - [`Database::reset`] builds a complete new state off to the side and
//!   swaps it in with a single atomic store. In-flight lookups finish against
//!   the state they started with; a failed reset leaves the old state in
//!   place.
//!
//! # Example
//!
//! ```no_run
//! use ip2geo::{Database, Field};
//!
//! let db = Database::options()
//!     .fields(&[Field::Country, Field::City])
//!     .open("IP2LOCATION-LITE-DB3.BIN")?;
//!
//! if let Some(entry) = db.lookup("8.8.8.8".parse()?)? {
//!     println!("{} / {}", entry.country, entry.city);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::cache::{CachePolicy, CacheStats, DecodeCache};
use crate::decoder::FieldDecoder;
use crate::entry::Entry;
use crate::error::Result;
use crate::fields::{EntryKind, Field, Projection};
use crate::header::{BuildDate, Header, IpVersion};
use crate::lookup::{normalize_address, LookupKey};
use crate::rows::RowIndex;
use crate::source::{ByteSource, FileSource, MmapSource};
use arc_swap::ArcSwap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Configuration for opening a [`Database`]
///
/// ```no_run
/// use ip2geo::{CachePolicy, Database};
/// use std::num::NonZeroUsize;
///
/// let db = Database::options()
///     .string_cache(CachePolicy::Lru(NonZeroUsize::new(50_000).unwrap()))
///     .entry_cache(CachePolicy::Unbounded)
///     .open("DB11.BIN")?;
/// # Ok::<(), ip2geo::GeoError>(())
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    fields: Vec<Field>,
    string_cache: CachePolicy,
    entry_cache: CachePolicy,
    parallel_load: bool,
    mmap: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            string_cache: CachePolicy::Unbounded,
            entry_cache: CachePolicy::Disabled,
            parallel_load: true,
            mmap: true,
        }
    }
}

impl OpenOptions {
    /// Defaults: full schema, unbounded string cache, no entry cache,
    /// parallel load, memory-mapped files
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode only these fields (empty = every field of the kind)
    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    /// Backing store for the string cache
    pub fn string_cache(mut self, policy: CachePolicy) -> Self {
        self.string_cache = policy;
        self
    }

    /// Backing store for the whole-entry cache
    pub fn entry_cache(mut self, policy: CachePolicy) -> Self {
        self.entry_cache = policy;
        self
    }

    /// Load the IPv4 and IPv6 row blocks concurrently (default on)
    pub fn parallel_load(mut self, parallel: bool) -> Self {
        self.parallel_load = parallel;
        self
    }

    /// Memory-map files opened by path; otherwise use positional reads
    pub fn mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    /// Open a database file
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Database> {
        let path = path.as_ref();
        let source: Arc<dyn ByteSource> = if self.mmap {
            Arc::new(MmapSource::open(path)?)
        } else {
            Arc::new(FileSource::open(path)?)
        };
        debug!(path = %path.display(), mmap = self.mmap, "opening database");
        Database::with_state(State::build(source, &self)?, self)
    }

    /// Open a database held in memory
    pub fn open_bytes(self, data: Vec<u8>) -> Result<Database> {
        self.open_source(data)
    }

    /// Open any byte source
    pub fn open_source<S: ByteSource + 'static>(self, source: S) -> Result<Database> {
        let state = State::build(Arc::new(source), &self)?;
        Database::with_state(state, self)
    }
}

/// Everything a lookup needs, immutable once built
struct State {
    source: Arc<dyn ByteSource>,
    header: Header,
    projection: Projection,
    v4: RowIndex,
    v6: RowIndex,
    cache: DecodeCache,
}

impl State {
    fn build(source: Arc<dyn ByteSource>, options: &OpenOptions) -> Result<Self> {
        let started = Instant::now();
        let header = Header::read(&*source)?;
        let kind = header.kind;
        let projection = kind.resolve(&options.fields)?;

        let load = |version| RowIndex::load(&*source, version, kind);
        let (v4, v6) = if options.parallel_load {
            rayon::join(|| load(IpVersion::V4), || load(IpVersion::V6))
        } else {
            (load(IpVersion::V4), load(IpVersion::V6))
        };
        let (v4, v6) = (v4?, v6?);

        debug!(
            kind = %kind,
            date = %header.date,
            v4_rows = v4.len(),
            v6_rows = v6.len(),
            fields = projection.mask().len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "database loaded"
        );

        Ok(Self {
            source,
            header,
            projection,
            v4,
            v6,
            cache: DecodeCache::new(options.string_cache, options.entry_cache),
        })
    }

    #[inline]
    fn index(&self, version: IpVersion) -> &RowIndex {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }

    fn decoder(&self) -> FieldDecoder<'_, dyn ByteSource> {
        FieldDecoder::new(&*self.source, &self.cache)
    }

    fn lookup(&self, key: &LookupKey) -> Result<Option<Arc<Entry>>> {
        let index = self.index(key.version());
        let Some(row) = index.find_key(key) else {
            return Ok(None);
        };
        let Some(data) = index.data(row) else {
            return Ok(None);
        };
        self.cache
            .entry((key.version(), row), || {
                self.decoder().decode(&self.projection, data)
            })
            .map(Some)
    }

    fn lookup_projected(&self, key: &LookupKey, projection: &Projection) -> Result<Option<Entry>> {
        let index = self.index(key.version());
        match index.find_key(key).and_then(|row| index.data(row)) {
            Some(data) => self.decoder().decode(projection, data).map(Some),
            None => Ok(None),
        }
    }
}

/// Read-only IP geolocation database
///
/// Cheap to share between threads (`Arc<Database>`); every method takes
/// `&self`.
pub struct Database {
    state: ArcSwap<State>,
    options: OpenOptions,
}

impl Database {
    /// Builder for non-default configuration
    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    /// Open a file with default options (memory-mapped)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Open an in-memory database with default options
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        OpenOptions::new().open_bytes(data)
    }

    /// Open any byte source with default options
    pub fn from_source<S: ByteSource + 'static>(source: S) -> Result<Self> {
        OpenOptions::new().open_source(source)
    }

    fn with_state(state: State, options: OpenOptions) -> Result<Self> {
        Ok(Self {
            state: ArcSwap::from_pointee(state),
            options,
        })
    }

    /// Re-point the handle at a new source, keeping the configured projection
    ///
    /// Row blocks and caches are rebuilt. On error the previous state stays
    /// in effect.
    pub fn reset<S: ByteSource + 'static>(&self, source: S) -> Result<()> {
        let state = State::build(Arc::new(source), &self.options)?;
        self.publish(state);
        Ok(())
    }

    /// [`reset`](Self::reset) with a different field projection
    ///
    /// The new projection applies to the new state only; the stored options
    /// are not changed, so a later plain `reset` goes back to them.
    pub fn reset_with<S: ByteSource + 'static>(&self, source: S, fields: &[Field]) -> Result<()> {
        let options = self.options.clone().fields(fields);
        let state = State::build(Arc::new(source), &options)?;
        self.publish(state);
        Ok(())
    }

    fn publish(&self, state: State) {
        debug!(kind = %state.header.kind, date = %state.header.date, "database reset");
        self.state.store(Arc::new(state));
    }

    /// Look up an address
    ///
    /// `Ok(None)` means the address is outside every range in the file.
    /// IPv4-mapped IPv6 addresses are searched in the IPv4 block.
    pub fn lookup(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>> {
        self.state.load().lookup(&LookupKey::from(addr))
    }

    /// Look up a raw 4- or 16-byte address in network byte order
    pub fn lookup_bytes(&self, addr: &[u8]) -> Result<Option<Arc<Entry>>> {
        let key = normalize_address(addr)?;
        self.state.load().lookup(&key)
    }

    /// Look up an address decoding only `fields`
    ///
    /// Bypasses the entry cache; strings still go through the string cache.
    /// Every requested field must exist in the database kind.
    pub fn lookup_fields(&self, addr: IpAddr, fields: &[Field]) -> Result<Option<Entry>> {
        let state = self.state.load();
        let projection = state.header.kind.resolve(fields)?;
        state.lookup_projected(&LookupKey::from(addr), &projection)
    }

    /// Walk every row of one IP version in address order
    ///
    /// The callback receives the decoded entry, the row's first address and
    /// the first address of the next row (exclusive bound). The final row has
    /// no successor and gets `None`.
    pub fn each<F>(&self, version: IpVersion, fields: &[Field], mut f: F) -> Result<()>
    where
        F: FnMut(&Entry, IpAddr, Option<IpAddr>),
    {
        for item in self.iter(version, fields)? {
            let (entry, low, high) = item?;
            f(&entry, low, high);
        }
        Ok(())
    }

    /// Iterator form of [`each`](Self::each)
    ///
    /// The iterator holds a snapshot of the current state, so a concurrent
    /// reset does not affect a walk in progress.
    pub fn iter(&self, version: IpVersion, fields: &[Field]) -> Result<EntryIter> {
        let state = self.state.load_full();
        let projection = state.header.kind.resolve(fields)?;
        Ok(EntryIter {
            state,
            version,
            projection,
            next: 0,
        })
    }

    /// Database kind from the header
    pub fn kind(&self) -> EntryKind {
        self.state.load().header.kind
    }

    /// Build date from the header
    pub fn date(&self) -> BuildDate {
        self.state.load().header.date
    }

    /// Fields decoded by [`lookup`](Self::lookup), in schema order
    pub fn fields(&self) -> Vec<Field> {
        self.state.load().projection.fields()
    }

    /// Rows loaded for `version`, sentinel included
    pub fn row_count(&self, version: IpVersion) -> usize {
        self.state.load().index(version).len()
    }

    /// Heap bytes held by both row blocks
    pub fn row_memory(&self) -> usize {
        let state = self.state.load();
        state.v4.memory_size() + state.v6.memory_size()
    }

    /// Decode cache counters for the current state
    pub fn cache_stats(&self) -> CacheStats {
        self.state.load().cache.stats()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("Database")
            .field("kind", &state.header.kind)
            .field("date", &state.header.date)
            .field("v4_rows", &state.v4.len())
            .field("v6_rows", &state.v6.len())
            .field("fields", &state.projection.fields())
            .finish()
    }
}

/// Iterator returned by [`Database::iter`]
pub struct EntryIter {
    state: Arc<State>,
    version: IpVersion,
    projection: Projection,
    next: usize,
}

impl Iterator for EntryIter {
    type Item = Result<(Entry, IpAddr, Option<IpAddr>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.state.index(self.version).range(self.next)?;
        self.next += 1;
        Some(
            self.state
                .decoder()
                .decode(&self.projection, range.data)
                .map(|entry| (entry, range.low, range.high)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.state.index(self.version).len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for EntryIter {}
