//! Siloxane is an object-mapping client for an eventually-consistent key-value store.
//!
//! Core concepts:
//! - **Document**: A value whose fields map to a content body and a link side channel
//! - **Entity**: A document bound to an identity, holding the vector clock last seen
//! - **One / Many**: Typed links to other entities (with an explicit, optional cache)
//! - **Resolve**: The merge hook run when a read returns concurrent values (siblings)
//! - **Client**: Issues one blocking round trip per operation over a [`Transport`]
//!
//! # Example
//!
//! ```
//! use siloxane_core::{Client, Document, Entity, MemoryCluster};
//!
//! #[derive(Debug, Clone, Default, Document)]
//! struct Note {
//!     #[document(rename = "body")]
//!     text: String,
//! }
//!
//! let cluster = MemoryCluster::new();
//! let mut client = Client::new(cluster.connect());
//!
//! let mut note = Entity::new("notes", "n1", Note { text: "hello".into() });
//! client.save(&mut note).unwrap();
//!
//! let loaded: Entity<Note> = client.load("notes", "n1").unwrap();
//! assert_eq!(loaded.text, "hello");
//! assert_eq!(loaded.content(), br#"{"body":"hello"}"#);
//! ```
//!
//! # Causality
//!
//! Every write carries the clock from the entity's last read or write. Reusing
//! one entity across saves chains them causally; two fresh entities saved
//! under one key in a multi-value bucket become siblings.

extern crate self as siloxane_core;

mod canonical;
mod client;
pub mod codec;
mod content;
mod counter;
mod document;
mod entity;
mod error;
mod link;
pub mod memory;
mod options;
mod resolve;
pub mod serde_helpers;
mod transport;
mod vclock;

pub use client::Client;
pub use codec::MessageCode;
pub use content::{CONTENT_TYPE, ContentReader, ContentWriter};
pub use document::{Document, FieldKind, FieldSpec};
pub use entity::{Entity, EntityMeta};
pub use error::Error;
pub use link::{LinkField, LinkReader, LinkRef, LinkWriter, Many, One};
pub use memory::{MemoryCluster, MemoryConnection};
pub use options::QuorumOptions;
pub use resolve::{Resolve, SiblingContent, Siblings};
pub use transport::Transport;
pub use vclock::VClock;

#[cfg(feature = "derive")]
pub use siloxane_derive::Document;

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::{ContentReader, ContentWriter, Document, Error, FieldKind, FieldSpec, LinkReader, LinkWriter};

    /// A hand-mapped document, independent of the derive.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Note {
        pub text: String,
    }

    impl Document for Note {
        fn fields() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] = &[FieldSpec {
                name: "text",
                wire_name: "text",
                kind: FieldKind::Content,
            }];
            FIELDS
        }

        fn encode_content(&self, out: &mut ContentWriter) -> Result<(), Error> {
            out.field("text", &self.text)
        }

        fn decode_content(&mut self, content: &ContentReader) -> Result<(), Error> {
            if let Some(text) = content.field("text")? {
                self.text = text;
            }
            Ok(())
        }

        fn encode_links(&self, _out: &mut LinkWriter) {}

        fn decode_links(&mut self, _links: &LinkReader) {}
    }
}
