use indexmap::IndexMap;

use crate::client::Client;
use crate::codec::WireLink;
use crate::document::Document;
use crate::entity::Entity;
use crate::error::Error;
use crate::transport::Transport;

/// A directed, tagged edge to another entity.
///
/// An empty tag means "use the referencing field's tag" when the link is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LinkRef {
    pub bucket: String,
    pub key: String,
    pub tag: String,
}

impl LinkRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, tag: impl Into<String>) -> Self {
        LinkRef {
            bucket: bucket.into(),
            key: key.into(),
            tag: tag.into(),
        }
    }

    fn pointing_at<T: Document>(entity: &Entity<T>) -> Self {
        LinkRef::new(entity.bucket(), entity.key(), "")
    }
}

impl From<&LinkRef> for WireLink {
    fn from(link: &LinkRef) -> Self {
        WireLink {
            bucket: link.bucket.as_bytes().to_vec(),
            key: link.key.as_bytes().to_vec(),
            tag: link.tag.as_bytes().to_vec(),
        }
    }
}

impl From<WireLink> for LinkRef {
    fn from(link: WireLink) -> Self {
        LinkRef {
            bucket: String::from_utf8_lossy(&link.bucket).into_owned(),
            key: String::from_utf8_lossy(&link.key).into_owned(),
            tag: String::from_utf8_lossy(&link.tag).into_owned(),
        }
    }
}

/// Collects link records while a document is saved.
#[derive(Debug, Default)]
pub struct LinkWriter {
    links: Vec<LinkRef>,
}

impl LinkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits `link`, falling back to `field_tag` when the link carries no tag.
    pub fn push(&mut self, field_tag: &str, link: &LinkRef) {
        let tag = if link.tag.is_empty() { field_tag } else { &link.tag };
        self.links.push(LinkRef::new(&link.bucket, &link.key, tag));
    }

    pub fn finish(self) -> Vec<LinkRef> {
        self.links
    }
}

/// Incoming link records grouped by tag, in arrival order.
#[derive(Debug, Default)]
pub struct LinkReader {
    by_tag: IndexMap<String, Vec<LinkRef>>,
}

impl LinkReader {
    pub fn new(links: &[LinkRef]) -> Self {
        let mut by_tag: IndexMap<String, Vec<LinkRef>> = IndexMap::new();
        for link in links {
            by_tag.entry(link.tag.clone()).or_default().push(link.clone());
        }
        LinkReader { by_tag }
    }

    /// Records tagged with the field's wire tag or, failing that, its Rust name.
    pub fn matching(&self, wire_tag: &str, field_name: &str) -> Vec<LinkRef> {
        let mut out: Vec<LinkRef> = self.by_tag.get(wire_tag).cloned().unwrap_or_default();
        if field_name != wire_tag {
            if let Some(extra) = self.by_tag.get(field_name) {
                out.extend(extra.iter().cloned());
            }
        }
        out
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }
}

/// A document field stored in the link side channel.
pub trait LinkField {
    fn encode_links(&self, field_tag: &str, out: &mut LinkWriter);

    fn decode_links(&mut self, links: Vec<LinkRef>);
}

/// Zero or one link to a `T`, with an optional cached target.
///
/// The cache is filled only by [`One::set`] on a persisted target or by
/// [`One::get`]. Loading the referencing entity never fills it.
#[derive(Debug, Clone)]
pub struct One<T: Document> {
    link: Option<LinkRef>,
    cached: Option<Box<Entity<T>>>,
}

impl<T: Document> Default for One<T> {
    fn default() -> Self {
        One {
            link: None,
            cached: None,
        }
    }
}

impl<T: Document> One<T> {
    /// An unset link.
    pub fn new() -> Self {
        Self::default()
    }

    /// A link to a known identity, without a cached target.
    pub fn from_link(link: LinkRef) -> Self {
        One {
            link: Some(link),
            cached: None,
        }
    }

    /// Points this link at `target`.
    ///
    /// A target that has been saved or loaded is cached so that [`One::get`]
    /// returns it without a round trip.
    pub fn set(&mut self, target: &Entity<T>) {
        self.link = Some(LinkRef::pointing_at(target));
        self.cached = target.is_persisted().then(|| Box::new(target.clone()));
    }

    /// Returns the target, loading it through `client` unless cached.
    pub fn get<C: Transport>(&mut self, client: &mut Client<C>) -> Result<&Entity<T>, Error> {
        if self.cached.is_none() {
            let link = self.link.as_ref().ok_or(Error::UnsetLink)?;
            let target = client.load::<T>(&link.bucket, &link.key)?;
            self.cached = Some(Box::new(target));
        }
        self.cached.as_deref().ok_or(Error::UnsetLink)
    }

    pub fn link(&self) -> Option<&LinkRef> {
        self.link.as_ref()
    }

    pub fn cached(&self) -> Option<&Entity<T>> {
        self.cached.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.link.is_some()
    }

    /// Drops both the link and the cached target.
    pub fn clear(&mut self) {
        self.link = None;
        self.cached = None;
    }

    fn with_tag(target: &Entity<T>, tag: &str) -> Self {
        let mut one = One::new();
        one.set(target);
        if let Some(link) = one.link.as_mut() {
            link.tag = tag.to_string();
        }
        one
    }
}

impl<T: Document> LinkField for One<T> {
    fn encode_links(&self, field_tag: &str, out: &mut LinkWriter) {
        if let Some(link) = &self.link {
            out.push(field_tag, link);
        }
    }

    fn decode_links(&mut self, links: Vec<LinkRef>) {
        self.cached = None;
        self.link = links.into_iter().next();
    }
}

/// An ordered collection of links to `T`s.
///
/// Order is local only: after a round trip it is whatever the store returned.
/// Duplicate targets and tags are kept.
#[derive(Debug, Clone)]
pub struct Many<T: Document> {
    items: Vec<One<T>>,
}

impl<T: Document> Default for Many<T> {
    fn default() -> Self {
        Many { items: Vec::new() }
    }
}

impl<T: Document> Many<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a link to `target`, tagged with the field's tag on save.
    pub fn add(&mut self, target: &Entity<T>) {
        let mut one = One::new();
        one.set(target);
        self.items.push(one);
    }

    /// Appends a link to `target` with its own tag.
    pub fn add_tagged(&mut self, target: &Entity<T>, tag: &str) {
        self.items.push(One::with_tag(target, tag));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, One<T>> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, One<T>> {
        self.items.iter_mut()
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkRef> {
        self.items.iter().filter_map(One::link)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Document> LinkField for Many<T> {
    fn encode_links(&self, field_tag: &str, out: &mut LinkWriter) {
        for link in self.links() {
            out.push(field_tag, link);
        }
    }

    fn decode_links(&mut self, links: Vec<LinkRef>) {
        self.items = links.into_iter().map(One::from_link).collect();
    }
}

impl<'a, T: Document> IntoIterator for &'a Many<T> {
    type Item = &'a One<T>;
    type IntoIter = std::slice::Iter<'a, One<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T: Document> IntoIterator for &'a mut Many<T> {
    type Item = &'a mut One<T>;
    type IntoIter = std::slice::IterMut<'a, One<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_uses_field_tag_for_untagged_links() {
        let mut out = LinkWriter::new();
        out.push("parent", &LinkRef::new("b", "k", ""));
        out.push("parent", &LinkRef::new("b", "k2", "custom"));
        let links = out.finish();
        assert_eq!(links[0].tag, "parent");
        assert_eq!(links[1].tag, "custom");
    }

    #[test]
    fn reader_groups_by_tag() {
        let links = vec![
            LinkRef::new("b", "1", "friend"),
            LinkRef::new("b", "2", "other"),
            LinkRef::new("b", "3", "friend"),
            LinkRef::new("b", "4", "friends"),
        ];
        let reader = LinkReader::new(&links);
        let friends = reader.matching("friend", "friends");
        let keys: Vec<_> = friends.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "3", "4"]);
        assert_eq!(reader.tags().collect::<Vec<_>>(), vec!["friend", "other", "friends"]);
    }

    #[test]
    fn wire_link_conversion() {
        let link = LinkRef::new("bucket", "key", "tag");
        let wire = WireLink::from(&link);
        assert_eq!(wire.bucket, b"bucket");
        assert_eq!(LinkRef::from(wire), link);
    }

    #[test]
    fn one_decode_keeps_first_and_drops_cache() {
        let mut one: One<crate::tests_support::Note> = One::new();
        one.decode_links(vec![LinkRef::new("b", "k", "t"), LinkRef::new("b", "k2", "t")]);
        assert_eq!(one.link().unwrap().key, "k");
        assert!(one.cached().is_none());
    }

    #[test]
    fn set_caches_only_persisted_targets() {
        use crate::vclock::VClock;

        let fresh = Entity::new("notes", "n1", crate::tests_support::Note::default());
        let mut one = One::new();
        one.set(&fresh);
        assert!(one.is_set());
        assert!(one.cached().is_none());

        let mut stored = fresh.clone();
        stored.meta.vclock = VClock::from_bytes(vec![1]);
        one.set(&stored);
        assert_eq!(one.cached().unwrap().key(), "n1");

        one.clear();
        assert!(!one.is_set());
    }

    #[test]
    fn many_keeps_duplicates_and_order() {
        let a = Entity::new("notes", "a", crate::tests_support::Note::default());
        let b = Entity::new("notes", "b", crate::tests_support::Note::default());
        let mut many = Many::new();
        many.add(&a);
        many.add(&b);
        many.add(&a);
        many.add_tagged(&b, "special");
        assert_eq!(many.len(), 4);

        let mut out = LinkWriter::new();
        many.encode_links("notes", &mut out);
        let links = out.finish();
        let pairs: Vec<_> = links.iter().map(|l| (l.key.as_str(), l.tag.as_str())).collect();
        assert_eq!(
            pairs,
            vec![("a", "notes"), ("b", "notes"), ("a", "notes"), ("b", "special")]
        );
    }
}
