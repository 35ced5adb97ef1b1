use crate::document::Document;
use crate::error::Error;
use crate::link::LinkRef;
use crate::resolve::Siblings;
use crate::vclock::VClock;

/// Store-side bookkeeping for a bound value.
///
/// `vclock`, `content` and `links` always hold what this process last read
/// from or wrote to the store for `bucket/key`.
#[derive(Debug, Clone, Default)]
pub struct EntityMeta {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) vclock: VClock,
    pub(crate) content: Vec<u8>,
    pub(crate) links: Vec<LinkRef>,
    pub(crate) siblings: Siblings,
}

impl EntityMeta {
    pub(crate) fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        EntityMeta {
            bucket: bucket.into(),
            key: key.into(),
            ..Default::default()
        }
    }
}

/// A domain value bound to an identity.
///
/// Binding is local. Network effects happen only through [`crate::Client`]
/// operations, which replace the held clock and content with the store's.
#[derive(Debug, Clone)]
pub struct Entity<T: Document> {
    pub(crate) meta: EntityMeta,
    pub(crate) value: T,
}

impl<T: Document> Entity<T> {
    /// Binds `value` to `bucket/key`. An empty key lets the store assign one on save.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, value: T) -> Self {
        Entity {
            meta: EntityMeta::new(bucket, key),
            value,
        }
    }

    /// Rebinds to a new identity, discarding any held clock, content and siblings.
    pub fn bind(&mut self, bucket: impl Into<String>, key: impl Into<String>) {
        self.meta = EntityMeta::new(bucket, key);
    }

    pub fn bucket(&self) -> &str {
        &self.meta.bucket
    }

    pub fn key(&self) -> &str {
        &self.meta.key
    }

    /// Changes the bound key. Local only; the held clock, content and
    /// siblings belong to the old key and are discarded.
    pub fn set_key(&mut self, key: impl Into<String>) {
        let bucket = std::mem::take(&mut self.meta.bucket);
        self.meta = EntityMeta::new(bucket, key);
    }

    pub fn vclock(&self) -> &VClock {
        &self.meta.vclock
    }

    /// Content bytes last read or written.
    pub fn content(&self) -> &[u8] {
        &self.meta.content
    }

    /// All link records last read or written, including ones no field claimed.
    pub fn links(&self) -> &[LinkRef] {
        &self.meta.links
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    /// True once the entity has been saved or loaded.
    pub fn is_persisted(&self) -> bool {
        !self.meta.vclock.is_empty()
    }

    /// Number of values the last read or write returned; 0 for an entity never synced.
    pub fn sibling_count(&self) -> usize {
        match self.meta.siblings.len() {
            0 => usize::from(self.is_persisted()),
            n => n,
        }
    }

    /// Siblings held from the last multi-value read or write.
    pub fn siblings(&self) -> &Siblings {
        &self.meta.siblings
    }

    /// Decodes the held siblings into `into`, one per element.
    pub fn get_siblings(&self, into: &mut [T]) -> Result<(), Error> {
        self.meta.siblings.get_siblings(into)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Clears store-side state after a delete. The value is untouched.
    pub(crate) fn forget_remote(&mut self) {
        let bucket = std::mem::take(&mut self.meta.bucket);
        let key = std::mem::take(&mut self.meta.key);
        self.meta = EntityMeta::new(bucket, key);
    }
}

impl<T: Document> std::ops::Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Document> std::ops::DerefMut for Entity<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
