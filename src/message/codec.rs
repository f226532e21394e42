use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::Message;
use crate::error::ProtocolError;

/// Frames are delimited by the sender half-closing its write side, so nothing
/// is decoded until end-of-stream and then the whole buffer is one message.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;

    type Error = ProtocolError;

    fn decode(&mut self, _src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Keep buffering until the peer half-closes
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let frame = src.split().freeze();
        Message::parse(frame).map(Some)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}
