use std::str;

/// Payload of a parsed inscription envelope. `body` is `Some` as soon as the
/// body separator was present, even when the reassembled bytes are empty.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Inscription {
    pub body: Option<Vec<u8>>,
    pub content_encoding: Option<Vec<u8>>,
    pub content_type: Option<Vec<u8>>,
    pub delegate: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
    pub metaprotocol: Option<Vec<u8>>,
    pub parent: Option<Vec<u8>>,
    pub pointer: Option<Vec<u8>>,
}

impl Inscription {
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        str::from_utf8(self.content_type.as_ref()?).ok()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        str::from_utf8(self.content_encoding.as_ref()?).ok()
    }

    pub fn metaprotocol(&self) -> Option<&str> {
        str::from_utf8(self.metaprotocol.as_ref()?).ok()
    }

    /// Inscription metadata is CBOR by convention.
    pub fn metadata(&self) -> Option<ciborium::Value> {
        ciborium::from_reader(self.metadata.as_ref()?.as_slice()).ok()
    }
}
