use crate::codec::WireContent;
use crate::document::Document;
use crate::error::Error;
use crate::link::LinkRef;

/// Merge hook for documents stored in buckets that keep concurrent values.
///
/// When a read returns `count > 1` values, the first one is decoded into the
/// document and `resolve` is called on it before the read returns. The hook
/// materializes the alternates with [`Siblings::get_siblings`] and folds them
/// into `self`. The merged value is not written back; saving it is the
/// caller's job.
pub trait Resolve {
    fn resolve(&mut self, count: usize, siblings: &Siblings) -> Result<(), Error>;
}

/// One stored alternate: raw content plus its link records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiblingContent {
    pub value: Vec<u8>,
    pub links: Vec<LinkRef>,
}

impl From<WireContent> for SiblingContent {
    fn from(content: WireContent) -> Self {
        SiblingContent {
            value: content.value,
            links: content.links.into_iter().map(LinkRef::from).collect(),
        }
    }
}

/// The alternates returned by a multi-value read, in store order.
#[derive(Debug, Clone, Default)]
pub struct Siblings {
    contents: Vec<SiblingContent>,
}

impl Siblings {
    pub(crate) fn new(contents: Vec<SiblingContent>) -> Self {
        Siblings { contents }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contents(&self) -> &[SiblingContent] {
        &self.contents
    }

    /// Decodes sibling `i` into `into[i]` for every sibling.
    ///
    /// `into` must be sized to the reported sibling count. Each element is
    /// reset to its default first, so fields absent from a sibling read as zero.
    pub fn get_siblings<T: Document>(&self, into: &mut [T]) -> Result<(), Error> {
        if into.len() != self.contents.len() {
            return Err(Error::SiblingCountMismatch {
                expected: self.contents.len(),
                actual: into.len(),
            });
        }
        for (slot, content) in into.iter_mut().zip(&self.contents) {
            *slot = T::from_stored(&content.value, &content.links)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::Note;

    fn two_notes() -> Siblings {
        Siblings::new(vec![
            SiblingContent {
                value: br#"{"text":"left"}"#.to_vec(),
                links: vec![],
            },
            SiblingContent {
                value: br#"{"other":1}"#.to_vec(),
                links: vec![],
            },
        ])
    }

    #[test]
    fn get_siblings_decodes_in_order() {
        let siblings = two_notes();
        let mut out = vec![Note::default(); 2];
        out[1].text = "stale".into();
        siblings.get_siblings(&mut out).unwrap();
        assert_eq!(out[0].text, "left");
        // absent field reads as zero, not as the buffer's old value
        assert_eq!(out[1].text, "");
    }

    #[test]
    fn get_siblings_rejects_wrong_size() {
        let siblings = two_notes();
        let mut out = vec![Note::default(); 3];
        let err = siblings.get_siblings(&mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::SiblingCountMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn from_wire_content() {
        let content = SiblingContent::from(WireContent {
            value: b"{}".to_vec(),
            links: vec![(&LinkRef::new("b", "k", "t")).into()],
            ..Default::default()
        });
        assert_eq!(content.links, vec![LinkRef::new("b", "k", "t")]);
    }
}
