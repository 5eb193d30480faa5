/*!
Structural and cryptographic validation of a decoded or constructed bundle.
*/

use super::*;
use block::{BlockData, Type};
use hashbrown::HashSet;

/// Validates `bundle` with the built-in block types and security contexts.
pub fn validate(bundle: &Bundle) -> Result<(), Error> {
    validate_with(bundle, block::registry(), bpsec::contexts())
}

pub fn validate_with(
    bundle: &Bundle,
    registry: &block::Registry,
    contexts: &bpsec::ContextRegistry,
) -> Result<(), Error> {
    // Whole bundle
    let mut numbers = HashSet::with_capacity(bundle.blocks.len());
    for block in &bundle.blocks {
        if !numbers.insert(block.number) {
            return Err(Error::DuplicateBlockNumber(block.number));
        }
    }
    match bundle.blocks.last() {
        None => return Err(Error::MissingPayload),
        Some(block) if block.block_type != Type::Payload => {
            return Err(if bundle.payload().is_none() {
                Error::MissingPayload
            } else {
                Error::PayloadNotFinal
            });
        }
        _ => {}
    }

    let primary = &bundle.primary;
    crc::check_crc_value(primary.crc_type, primary.received_crc, &primary.encode())?;
    if primary.flags.is_fragment && primary.fragment_offset >= primary.total_data_length {
        return Err(Error::InvalidFragmentInfo(
            primary.fragment_offset,
            primary.total_data_length,
        ));
    }

    // Per block
    let mut seen = HashSet::new();
    for block in &bundle.blocks {
        match (block.number, block.block_type) {
            (1, Type::Payload) => {}
            (0, _) | (1, _) | (_, Type::Payload) => {
                return Err(Error::InvalidBlockNumber(block.number, block.block_type));
            }
            _ => {}
        }
        if !block.data.matches(block.block_type) {
            return Err(Error::BlockDataMismatch(block.block_type));
        }
        if let Type::Payload | Type::PreviousNode | Type::BundleAge | Type::HopCount =
            block.block_type
        {
            if !seen.insert(block.block_type) {
                return Err(Error::DuplicateBlocks(block.block_type));
            }
        }
        crc::check_crc_value(
            block.crc_type,
            block.received_crc,
            &block.encode_with(registry)?,
        )?;
    }

    if primary.timestamp.creation_time.is_none() && bundle.bundle_age().is_none() {
        return Err(Error::MissingBundleAge);
    }

    // Security blocks, once everything they can target is known to be sound
    for block in &bundle.blocks {
        if let BlockData::Security(asb) = &block.data {
            bpsec::check(bundle, block.number, asb, contexts, registry)?;
        }
    }
    Ok(())
}
