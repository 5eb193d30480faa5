/*!
Bundle fragmentation and reassembly (RFC 9171 Section 5.8 and 5.9).

Both operations are pure: the input is never modified, and a failure leaves
nothing half-built behind.
*/

use super::*;
use block::{Block, BlockData, Type};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bundle must not be fragmented")]
    MustNotFragment,

    #[error("Maximum fragment payload size must be greater than zero")]
    ZeroFragmentSize,

    #[error("Bundle has no payload")]
    MissingPayload,

    #[error("No fragments to reassemble")]
    NoFragments,

    #[error("Bundle is not a fragment")]
    NotFragment,

    #[error("Fragments belong to different bundles")]
    MismatchedFragments,

    #[error("Fragment at offset {offset} overlaps data up to {expected}")]
    OverlappingFragment { offset: u64, expected: u64 },

    #[error("Missing fragment data between {expected} and {offset}")]
    MissingFragment { offset: u64, expected: u64 },

    #[error("Reassembled payload length {0} does not match total length {1}")]
    LengthMismatch(u64, u64),

    #[error(transparent)]
    InvalidBundle(#[from] crate::Error),
}

/// Splits `bundle` into fragments carrying at most `max_payload` payload bytes each.
///
/// A bundle whose payload already fits is returned unchanged as the only element.
/// Blocks that are not flagged to be replicated appear in the first fragment only.
pub fn fragment(bundle: &Bundle, max_payload: usize) -> Result<Vec<Bundle>, Error> {
    if bundle.primary.flags.do_not_fragment {
        return Err(Error::MustNotFragment);
    }
    if max_payload == 0 {
        return Err(Error::ZeroFragmentSize);
    }

    let payload_block = bundle
        .blocks_of_type(Type::Payload)
        .next()
        .ok_or(Error::MissingPayload)?;
    let BlockData::Raw(payload) = &payload_block.data else {
        return Err(Error::MissingPayload);
    };
    if payload.len() <= max_payload {
        return Ok(vec![bundle.clone()]);
    }

    // A fragment keeps the offset and total length of the original bundle
    let (base_offset, total_len) = if bundle.is_fragment() {
        (
            bundle.primary.fragment_offset,
            bundle.primary.total_data_length,
        )
    } else {
        (0, payload.len() as u64)
    };

    let mut fragments = Vec::with_capacity(payload.len().div_ceil(max_payload));
    for (idx, chunk) in payload.chunks(max_payload).enumerate() {
        let mut primary = bundle.primary.clone();
        primary.flags.is_fragment = true;
        primary.fragment_offset = base_offset + (idx * max_payload) as u64;
        primary.total_data_length = total_len;
        primary.received_crc = None;

        let mut blocks = bundle
            .blocks
            .iter()
            .filter(|b| b.block_type != Type::Payload && (idx == 0 || b.flags.must_replicate))
            .cloned()
            .collect::<Vec<_>>();
        blocks.push(Block {
            data: BlockData::Raw(chunk.into()),
            received_crc: None,
            ..payload_block.clone()
        });

        let fragment = Bundle { primary, blocks };
        validate(&fragment)?;
        fragments.push(fragment);
    }
    Ok(fragments)
}

/// Rebuilds the original bundle from all of its fragments, in any order.
///
/// A single bundle that is not a fragment is returned as is.
pub fn reassemble(mut fragments: Vec<Bundle>) -> Result<Bundle, Error> {
    if fragments.len() == 1 && !fragments[0].is_fragment() {
        return fragments.pop().ok_or(Error::NoFragments);
    }

    let Some(first) = fragments.first() else {
        return Err(Error::NoFragments);
    };
    let id = first.fragment_id();
    let total_len = first.primary.total_data_length;
    for f in &fragments {
        if !f.is_fragment() {
            return Err(Error::NotFragment);
        }
        if f.primary.total_data_length != total_len || f.fragment_id() != id {
            return Err(Error::MismatchedFragments);
        }
    }

    fragments.sort_by_key(|f| f.primary.fragment_offset);

    let mut payload = Vec::with_capacity(total_len.min(usize::MAX as u64) as usize);
    for f in &fragments {
        let offset = f.primary.fragment_offset;
        let expected = payload.len() as u64;
        if offset < expected {
            return Err(Error::OverlappingFragment { offset, expected });
        }
        if offset > expected {
            return Err(Error::MissingFragment { offset, expected });
        }
        payload.extend_from_slice(f.payload().ok_or(Error::MissingPayload)?);
    }
    if payload.len() as u64 != total_len {
        return Err(Error::LengthMismatch(payload.len() as u64, total_len));
    }

    let mut bundle = fragments.swap_remove(0);
    bundle.primary.flags.is_fragment = false;
    bundle.primary.fragment_offset = 0;
    bundle.primary.total_data_length = 0;
    bundle.primary.received_crc = None;

    for block in bundle.blocks.iter_mut() {
        if block.block_type == Type::Payload {
            block.data = BlockData::Raw(payload.into());
            block.received_crc = None;
            break;
        }
    }

    validate(&bundle)?;
    Ok(bundle)
}
