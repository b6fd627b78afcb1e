//! Extraction of inscription envelopes from witness data.
//!
//! An envelope is the script fragment `OP_FALSE OP_IF "ord" ... OP_ENDIF`
//! carried in a taproot witness. The scanner works on raw script bytes
//! rather than decoded instructions: a witness item that fails strict script
//! decoding can still carry a recoverable envelope, and a push whose length
//! prefix overruns the script must terminate payload collection without
//! discarding what was already collected.

use crate::inscription::Inscription;
use crate::tag::Tag;
use crate::PROTOCOL_ID;

const OP_FALSE: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_PUSHNUM_NEG1: u8 = 0x4f;
const OP_PUSHNUM_1: u8 = 0x51;
const OP_PUSHNUM_16: u8 = 0x60;
const OP_IF: u8 = 0x63;
const OP_ENDIF: u8 = 0x68;

/// Scans every item of a witness stack in order and returns the first valid
/// envelope found, if any.
pub fn parse_witness(witness: &[Vec<u8>]) -> Option<Inscription> {
    witness.iter().find_map(|item| scan_script(item))
}

/// Scans a single script for `OP_FALSE OP_IF` followed by the `"ord"` marker
/// push. A mismatched marker resumes the scan at the next byte; a matched
/// envelope that fails validation resumes after its payloads.
fn scan_script(script: &[u8]) -> Option<Inscription> {
    let mut offset = 0;
    while offset + 1 < script.len() {
        if script[offset] != OP_FALSE || script[offset + 1] != OP_IF {
            offset += 1;
            continue;
        }
        match read_push(script, offset + 2) {
            Some((marker, payload_start)) if marker == PROTOCOL_ID => {
                let (payloads, resume) = collect_payloads(script, payload_start);
                if let Some(inscription) = inscription_from_payloads(&payloads) {
                    return Some(inscription);
                }
                offset = resume;
            }
            _ => offset += 1,
        }
    }
    None
}

/// Decodes one push at `offset`. Returns the pushed bytes and the offset of
/// the next opcode, or `None` when the byte is not a push or its claimed
/// length overruns the script.
fn read_push(script: &[u8], offset: usize) -> Option<(Vec<u8>, usize)> {
    let opcode = *script.get(offset)?;
    match opcode {
        OP_FALSE => Some((vec![], offset + 1)),
        len @ 0x01..=0x4b => take_bytes(script, offset + 1, len as usize),
        OP_PUSHDATA1 => {
            let len = *script.get(offset + 1)? as usize;
            take_bytes(script, offset + 2, len)
        }
        OP_PUSHDATA2 => {
            let bytes = script.get(offset + 1..offset + 3)?;
            let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
            take_bytes(script, offset + 3, len)
        }
        OP_PUSHDATA4 => {
            let bytes = script.get(offset + 1..offset + 5)?;
            let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
            take_bytes(script, offset + 5, len)
        }
        OP_PUSHNUM_NEG1 => Some((vec![0x81], offset + 1)),
        num @ OP_PUSHNUM_1..=OP_PUSHNUM_16 => Some((vec![num - 0x50], offset + 1)),
        _ => None,
    }
}

fn take_bytes(script: &[u8], start: usize, len: usize) -> Option<(Vec<u8>, usize)> {
    let data = script.get(start..start + len)?;
    Some((data.to_vec(), start + len))
}

/// Collects push payloads until `OP_ENDIF` or the first non-push byte.
/// Returns the payloads together with the offset at which scanning may
/// resume.
fn collect_payloads(script: &[u8], mut offset: usize) -> (Vec<Vec<u8>>, usize) {
    let mut payloads = vec![];
    while offset < script.len() {
        if script[offset] == OP_ENDIF {
            offset += 1;
            break;
        }
        match read_push(script, offset) {
            Some((data, next)) => {
                payloads.push(data);
                offset = next;
            }
            None => break,
        }
    }
    (payloads, offset)
}

/// Interprets collected payloads as tag/value pairs followed by an optional
/// body. Rejects the envelope only when neither a content type nor a body is
/// present.
fn inscription_from_payloads(payloads: &[Vec<u8>]) -> Option<Inscription> {
    let body_separator = payloads
        .iter()
        .enumerate()
        .position(|(index, payload)| index % 2 == 0 && payload.is_empty());

    let mut inscription = Inscription::default();
    let fields = &payloads[..body_separator.unwrap_or(payloads.len())];
    for pair in fields.chunks(2) {
        let [key, value] = pair else {
            // Trailing tag with no value: field parsing stops here.
            break;
        };
        let [tag_byte] = key.as_slice() else {
            // Multi-byte tag payloads skip the pair without aborting.
            continue;
        };
        let Some(tag) = Tag::from_byte(*tag_byte) else {
            continue;
        };
        let slot = match tag {
            Tag::ContentType => &mut inscription.content_type,
            Tag::Pointer => &mut inscription.pointer,
            Tag::Parent => &mut inscription.parent,
            Tag::Metadata => &mut inscription.metadata,
            Tag::Metaprotocol => &mut inscription.metaprotocol,
            Tag::ContentEncoding => &mut inscription.content_encoding,
            Tag::Delegate => &mut inscription.delegate,
        };
        if tag.is_chunked() {
            slot.get_or_insert_with(Vec::new).extend_from_slice(value);
        } else if slot.is_none() {
            *slot = Some(value.clone());
        }
    }

    inscription.body = body_separator.map(|index| payloads[index + 1..].concat());

    if inscription.content_type.is_none() && inscription.body.is_none() {
        return None;
    }
    Some(inscription)
}
