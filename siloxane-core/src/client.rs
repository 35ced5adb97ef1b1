use tracing::{debug, instrument, warn};

use crate::codec::{
    self, DelReq, ErrorResp, GetReq, GetResp, Message, MessageCode, PingReq, PutReq, Request,
    WireContent, WireLink,
};
use crate::content::CONTENT_TYPE;
use crate::document::Document;
use crate::entity::{Entity, EntityMeta};
use crate::error::Error;
use crate::options::QuorumOptions;
use crate::resolve::{SiblingContent, Siblings};
use crate::transport::Transport;

/// A client bound to one held connection.
///
/// Every operation is a single blocking round trip on that connection.
/// Operations take `&mut self`; a client is never shared between callers
/// without their own synchronization.
pub struct Client<T: Transport> {
    transport: T,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Client { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends `request` and decodes the matching response.
    pub(crate) fn round_trip<R: Request>(&mut self, request: &R) -> Result<R::Response, Error> {
        let payload = codec::encode(request)?;
        debug!(code = ?R::CODE, bytes = payload.len(), "sending request");

        let (code, body) = self
            .transport
            .send(R::CODE, &payload)
            .map_err(|e| Error::Transport(Box::new(e)))?;

        if code == MessageCode::ErrorResp.as_u8() {
            let err: ErrorResp = codec::decode(&body)?;
            return Err(Error::Server {
                code: err.code,
                message: err.message,
            });
        }

        let expected = <R::Response as Message>::CODE.as_u8();
        if code != expected {
            return Err(Error::Protocol {
                expected,
                actual: code,
            });
        }
        codec::decode(&body)
    }

    /// Checks that the store answers.
    #[instrument(level = "debug", skip(self))]
    pub fn ping(&mut self) -> Result<(), Error> {
        self.round_trip(&PingReq {})?;
        Ok(())
    }

    /// Writes the entity's fields and links with its held clock.
    ///
    /// On success the held clock and content are replaced with the store's
    /// response. An entity bound with an empty key adopts the key the store assigns.
    /// A response carrying concurrent values is kept as the entity's siblings.
    pub fn save<D: Document>(&mut self, entity: &mut Entity<D>) -> Result<(), Error> {
        self.save_with(entity, &QuorumOptions::default())
    }

    /// [`Client::save`] with write quorum overrides (`w`, `dw`, `pw`).
    #[instrument(level = "debug", skip_all, fields(bucket = %entity.bucket(), key = %entity.key()))]
    pub fn save_with<D: Document>(
        &mut self,
        entity: &mut Entity<D>,
        options: &QuorumOptions,
    ) -> Result<(), Error> {
        let content = entity.value.to_content()?;
        let links = entity.value.to_links();
        let quorum = options.write_quorum();

        let request = PutReq {
            bucket: entity.meta.bucket.as_bytes().to_vec(),
            key: (!entity.meta.key.is_empty()).then(|| entity.meta.key.as_bytes().to_vec()),
            vclock: entity.meta.vclock.to_request(),
            content: WireContent {
                value: content.clone(),
                content_type: Some(CONTENT_TYPE.to_string()),
                links: links.iter().map(WireLink::from).collect(),
                ..Default::default()
            },
            w: quorum.w,
            dw: quorum.dw,
            pw: quorum.pw,
            return_body: true,
        };
        let response = self.round_trip(&request)?;

        if let Some(key) = response.key {
            entity.meta.key = String::from_utf8_lossy(&key).into_owned();
            debug!(key = %entity.meta.key, "store assigned key");
        }
        let live: Vec<SiblingContent> = response
            .contents
            .into_iter()
            .filter(|c| !c.deleted)
            .map(SiblingContent::from)
            .collect();
        let siblings = if live.len() > 1 {
            warn!(siblings = live.len(), "write left concurrent values; reload to resolve");
            Siblings::new(live)
        } else {
            Siblings::default()
        };

        entity.meta.vclock = response.vclock.unwrap_or_default();
        entity.meta.content = content;
        entity.meta.links = links;
        entity.meta.siblings = siblings;
        Ok(())
    }

    /// Reads `bucket/key` into a new entity.
    pub fn load<D: Document>(&mut self, bucket: &str, key: &str) -> Result<Entity<D>, Error> {
        self.load_with(bucket, key, &QuorumOptions::default())
    }

    /// [`Client::load`] with read quorum overrides (`r`, `pr`).
    pub fn load_with<D: Document>(
        &mut self,
        bucket: &str,
        key: &str,
        options: &QuorumOptions,
    ) -> Result<Entity<D>, Error> {
        let mut entity = Entity::new(bucket, key, D::default());
        self.fetch(bucket, key, &mut entity, options)?;
        Ok(entity)
    }

    /// Reads `bucket/key` into an existing entity, rebinding it.
    pub fn load_into<D: Document>(
        &mut self,
        bucket: &str,
        key: &str,
        entity: &mut Entity<D>,
    ) -> Result<(), Error> {
        self.fetch(bucket, key, entity, &QuorumOptions::default())
    }

    /// Repeats the read for the entity's bound identity, replacing its state in place.
    pub fn reload<D: Document>(&mut self, entity: &mut Entity<D>) -> Result<(), Error> {
        let bucket = entity.meta.bucket.clone();
        let key = entity.meta.key.clone();
        self.fetch(&bucket, &key, entity, &QuorumOptions::default())
    }

    #[instrument(level = "debug", skip(self, entity, options))]
    fn fetch<D: Document>(
        &mut self,
        bucket: &str,
        key: &str,
        entity: &mut Entity<D>,
        options: &QuorumOptions,
    ) -> Result<(), Error> {
        let quorum = options.read_quorum();
        let request = GetReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            r: quorum.r,
            pr: quorum.pr,
        };
        let response = self.round_trip(&request)?;
        apply_read(entity, bucket, key, response)
    }

    /// Deletes the entity's store-side counterpart.
    ///
    /// The in-memory value survives; its held clock and content are cleared.
    pub fn delete<D: Document>(&mut self, entity: &mut Entity<D>) -> Result<(), Error> {
        let request = DelReq {
            bucket: entity.meta.bucket.as_bytes().to_vec(),
            key: entity.meta.key.as_bytes().to_vec(),
            vclock: entity.meta.vclock.to_request(),
            ..Default::default()
        };
        self.delete_request(&request)?;
        entity.forget_remote();
        Ok(())
    }

    /// Deletes `bucket/key` without a held clock. An absent key is not an error.
    pub fn delete_key(&mut self, bucket: &str, key: &str) -> Result<(), Error> {
        self.delete_key_with(bucket, key, &QuorumOptions::default())
    }

    pub fn delete_key_with(
        &mut self,
        bucket: &str,
        key: &str,
        options: &QuorumOptions,
    ) -> Result<(), Error> {
        let quorum = options.write_quorum();
        let request = DelReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            vclock: None,
            w: quorum.w,
            dw: quorum.dw,
            pw: quorum.pw,
        };
        self.delete_request(&request)
    }

    #[instrument(level = "debug", skip_all, fields(bucket = %String::from_utf8_lossy(&request.bucket), key = %String::from_utf8_lossy(&request.key)))]
    fn delete_request(&mut self, request: &DelReq) -> Result<(), Error> {
        self.round_trip(request)?;
        Ok(())
    }
}

fn apply_read<D: Document>(
    entity: &mut Entity<D>,
    bucket: &str,
    key: &str,
    response: GetResp,
) -> Result<(), Error> {
    let contents: Vec<SiblingContent> = response
        .contents
        .into_iter()
        .filter(|c| !c.deleted)
        .map(SiblingContent::from)
        .collect();
    let vclock = response.vclock.unwrap_or_default();

    match contents.len() {
        0 => Err(Error::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        1 => {
            let SiblingContent { value, links } = contents.into_iter().next().unwrap_or_default();
            entity.value = D::from_stored(&value, &links)?;
            entity.meta = EntityMeta {
                bucket: bucket.to_string(),
                key: key.to_string(),
                vclock,
                content: value,
                links,
                siblings: Siblings::default(),
            };
            Ok(())
        }
        count => {
            warn!(bucket, key, count, "read returned siblings");
            let siblings = Siblings::new(contents);
            let first = &siblings.contents()[0];
            let mut value = D::from_stored(&first.value, &first.links)?;

            let resolver = value
                .as_resolver()
                .ok_or(Error::MissingResolutionCapability {
                    type_name: std::any::type_name::<D>(),
                })?;
            resolver.resolve(count, &siblings)?;

            entity.meta = EntityMeta {
                bucket: bucket.to_string(),
                key: key.to_string(),
                vclock,
                content: value.to_content()?,
                links: value.to_links(),
                siblings,
            };
            entity.value = value;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PutResp;
    use crate::tests_support::Note;

    /// Answers every request with one fixed response.
    struct Fixed {
        code: u8,
        body: Vec<u8>,
    }

    impl Transport for Fixed {
        type Error = std::io::Error;

        fn send(&mut self, _code: MessageCode, _request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error> {
            Ok((self.code, self.body.clone()))
        }
    }

    #[test]
    fn mismatched_response_code_is_protocol_error() {
        let mut client = Client::new(Fixed {
            code: MessageCode::PutResp.as_u8(),
            body: codec::encode(&PutResp::default()).unwrap(),
        });
        let err = client.load::<Note>("notes", "n1").unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol {
                expected: 10,
                actual: 12
            }
        ));
    }

    #[test]
    fn error_response_is_server_error() {
        let mut client = Client::new(Fixed {
            code: MessageCode::ErrorResp.as_u8(),
            body: codec::encode(&ErrorResp {
                message: "overloaded".into(),
                code: 7,
            })
            .unwrap(),
        });
        let err = client.ping().unwrap_err();
        assert!(matches!(err, Error::Server { code: 7, ref message } if message == "overloaded"));
    }

    #[test]
    fn undecodable_response_is_codec_error() {
        let mut client = Client::new(Fixed {
            code: MessageCode::GetResp.as_u8(),
            body: vec![0xff],
        });
        let err = client.load::<Note>("notes", "n1").unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
