use crate::codec::MessageCode;

/// A held connection to the store.
///
/// Transports move raw payload bytes. Payload encoding lives in
/// [`crate::codec`]; transports have no knowledge of documents, links or
/// clocks.
///
/// One call is exactly one blocking request/response round trip. Timeouts and
/// cancellation belong to the implementation.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one request and returns the raw response code and payload.
    fn send(&mut self, code: MessageCode, request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn send(&mut self, code: MessageCode, request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error> {
        (**self).send(code, request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    type Error = T::Error;

    fn send(&mut self, code: MessageCode, request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error> {
        (**self).send(code, request)
    }
}
