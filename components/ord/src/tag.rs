/// Field tags recognized inside an inscription envelope. Tag payloads are a
/// single byte; anything longer is ignored by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    ContentType,
    Pointer,
    Parent,
    Metadata,
    Metaprotocol,
    ContentEncoding,
    Delegate,
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Tag::ContentType),
            2 => Some(Tag::Pointer),
            3 => Some(Tag::Parent),
            5 => Some(Tag::Metadata),
            7 => Some(Tag::Metaprotocol),
            9 => Some(Tag::ContentEncoding),
            11 => Some(Tag::Delegate),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Tag::ContentType => 1,
            Tag::Pointer => 2,
            Tag::Parent => 3,
            Tag::Metadata => 5,
            Tag::Metaprotocol => 7,
            Tag::ContentEncoding => 9,
            Tag::Delegate => 11,
        }
    }

    /// Chunked tags accumulate the values of every occurrence; for all other
    /// tags the first occurrence wins.
    pub fn is_chunked(self) -> bool {
        matches!(self, Tag::Metadata)
    }
}
