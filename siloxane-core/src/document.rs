use std::fmt::Debug;

use crate::content::{ContentReader, ContentWriter};
use crate::error::Error;
use crate::link::{LinkReader, LinkRef, LinkWriter};
use crate::resolve::Resolve;

/// How a mapped field travels to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Part of the content body.
    Content,
    /// A single link record in the link side channel.
    One,
    /// Zero or more link records in the link side channel.
    Many,
}

/// One row of a document's field-mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Rust field name.
    pub name: &'static str,
    /// Content key for content fields, default link tag for link fields.
    pub wire_name: &'static str,
    pub kind: FieldKind,
}

/// A value that can be bound to an identity and stored.
///
/// Usually derived with `#[derive(Document)]`, which builds the mapping table
/// from the struct declaration:
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Document)]
/// #[document(resolve)]
/// struct Profile {
///     #[document(rename = "display_name")]
///     name: String,
///     manager: One<Profile>,
///     #[document(skip)]
///     scratch: u32,
/// }
/// ```
///
/// Identity and vector clock are not fields of the value; they live in
/// [`crate::Entity`].
pub trait Document: Debug + Default + Clone + Send + Sync + 'static {
    /// The field-mapping table, in declaration order.
    fn fields() -> &'static [FieldSpec];

    /// Writes every content field.
    fn encode_content(&self, out: &mut ContentWriter) -> Result<(), Error>;

    /// Reads every content field present in the body. Absent fields are left as is.
    fn decode_content(&mut self, content: &ContentReader) -> Result<(), Error>;

    /// Emits the link records of every link field.
    fn encode_links(&self, out: &mut LinkWriter);

    /// Rebuilds link fields from incoming link records.
    fn decode_links(&mut self, links: &LinkReader);

    /// The resolution capability, for documents stored in multi-value buckets.
    fn as_resolver(&mut self) -> Option<&mut dyn Resolve> {
        None
    }

    /// Encodes the content body.
    fn to_content(&self) -> Result<Vec<u8>, Error> {
        let mut out = ContentWriter::new();
        self.encode_content(&mut out)?;
        out.finish()
    }

    /// Collects the link records.
    fn to_links(&self) -> Vec<LinkRef> {
        let mut out = LinkWriter::new();
        self.encode_links(&mut out);
        out.finish()
    }

    /// Decodes a stored value into a fresh document.
    fn from_stored(content: &[u8], links: &[LinkRef]) -> Result<Self, Error> {
        let mut value = Self::default();
        value.decode_content(&ContentReader::parse(content)?)?;
        value.decode_links(&LinkReader::new(links));
        Ok(value)
    }
}
