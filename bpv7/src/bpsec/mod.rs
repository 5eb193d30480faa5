/*!
Bundle Protocol Security (RFC 9172) block integrity.

Security blocks are carried as [`BlockData::Security`](crate::block::BlockData)
holding an [`AbstractSecurityBlock`]. The cryptography is delegated to a
[`Context`] looked up by the ASB's context id, so new contexts can be added to a
[`ContextRegistry`] without changing the ASB model.
*/

use super::*;
use block::BlockData;

mod asb;
mod context;
mod error;

pub mod ed25519;

use error::CaptureFieldErr;

pub use asb::{AbstractSecurityBlock, IdValue};
pub use context::{Context, ContextRegistry, Key, Targets, contexts};
pub use error::Error;

/// Streams the target blocks of `bundle` out of their current encoding.
struct BundleTargets<'a> {
    bundle: &'a bundle::Bundle,
    registry: &'a block::Registry,
}

impl Targets for BundleTargets<'_> {
    fn feed(&self, target: u64, sink: &mut dyn FnMut(&[u8])) -> Result<(), crate::Error> {
        if target == 0 {
            sink(&self.bundle.primary.encode());
            return Ok(());
        }
        self.bundle
            .block(target)
            .ok_or(Error::MissingSecurityTarget(target))?
            .encode_into(self.registry, sink)
    }
}

/// Signs `targets` of `bundle` with `key`, adding a new Block Integrity Block
/// authored by `source`. Returns the block number of the new block.
///
/// The security context is chosen by the type of `key`.
pub fn sign(
    bundle: &mut bundle::Bundle,
    targets: &[u64],
    key: &Key,
    source: &Eid,
) -> Result<u64, crate::Error> {
    let context_id = match key {
        Key::Ed25519(_) => ed25519::CONTEXT_ID,
    };
    sign_with(bundle, targets, key, source, context_id, contexts(), block::registry())
}

pub fn sign_with(
    bundle: &mut bundle::Bundle,
    targets: &[u64],
    key: &Key,
    source: &Eid,
    context_id: u64,
    contexts: &ContextRegistry,
    registry: &block::Registry,
) -> Result<u64, crate::Error> {
    let context = contexts
        .get(context_id)
        .ok_or(Error::UnrecognisedContext(context_id))?;

    if targets.is_empty() {
        return Err(Error::NoTargets.into());
    }

    for (idx, target) in targets.iter().enumerate() {
        if targets[..idx].contains(target) {
            return Err(Error::DuplicateTarget(*target).into());
        }
        if *target == 0 {
            continue;
        }
        match bundle.block(*target) {
            None => return Err(Error::MissingSecurityTarget(*target).into()),
            Some(block) if matches!(block.data, BlockData::Security(_)) => {
                return Err(Error::InvalidTarget(*target).into());
            }
            Some(_) => {}
        }
    }

    let asb = context.sign(
        targets,
        &BundleTargets {
            bundle: &*bundle,
            registry,
        },
        key,
        source,
    )?;
    Ok(bundle.add_block(block::Block::new(
        block::Type::BlockIntegrity,
        BlockData::Security(asb),
    )))
}

/// Checks the security block numbered `number` against the rest of `bundle`.
///
/// The structure of the ASB is always checked. Cryptographic verification is
/// skipped for fragments, whose payload and primary block differ from the ones
/// that were signed, and is done again once the bundle is reassembled.
pub(crate) fn check(
    bundle: &bundle::Bundle,
    number: u64,
    asb: &AbstractSecurityBlock,
    contexts: &ContextRegistry,
    registry: &block::Registry,
) -> Result<(), crate::Error> {
    if asb.targets.is_empty() {
        return Err(Error::NoTargets.into());
    }
    if asb.targets.len() != asb.results.len() {
        return Err(Error::MismatchedTargetResult.into());
    }
    for (idx, target) in asb.targets.iter().enumerate() {
        if *target == number {
            return Err(Error::SelfTarget(number).into());
        }
        if asb.targets[..idx].contains(target) {
            return Err(Error::DuplicateTarget(*target).into());
        }
        if *target != 0 && bundle.block(*target).is_none() {
            return Err(Error::MissingSecurityTarget(*target).into());
        }
    }

    let context = contexts
        .get(asb.context_id)
        .ok_or(Error::UnrecognisedContext(asb.context_id))?;

    if bundle.is_fragment() {
        return Ok(());
    }

    context.verify(asb, &BundleTargets { bundle, registry })
}
