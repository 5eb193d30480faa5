use super::*;
use hashbrown::HashMap;
use std::sync::LazyLock;

/// Key material for creating security blocks.
#[derive(Clone)]
#[non_exhaustive]
pub enum Key {
    Ed25519(ed25519_dalek::SigningKey),
}

impl core::fmt::Debug for Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ed25519(key) => f
                .debug_tuple("Ed25519")
                .field(&key.verifying_key())
                .finish(),
        }
    }
}

/// The encoded bytes of the blocks a security operation covers.
pub trait Targets {
    /// Feeds the encoding of block `target`, 0 being the primary block, to `sink`
    /// in one or more parts.
    fn feed(&self, target: u64, sink: &mut dyn FnMut(&[u8])) -> Result<(), crate::Error>;
}

/// A security context (RFC 9172 Section 3.10).
///
/// The bundle is not passed in: a context only sees the encoded bytes of each
/// target, streamed from `data`.
pub trait Context: Send + Sync {
    fn id(&self) -> u64;

    /// Produces a complete ASB over `targets`.
    fn sign(
        &self,
        targets: &[u64],
        data: &dyn Targets,
        key: &Key,
        source: &Eid,
    ) -> Result<AbstractSecurityBlock, crate::Error>;

    /// Checks an ASB of this context against the current encoding of its targets.
    fn verify(&self, asb: &AbstractSecurityBlock, data: &dyn Targets) -> Result<(), crate::Error>;
}

/// Maps security context ids to their implementation.
pub struct ContextRegistry {
    contexts: HashMap<u64, Box<dyn Context>>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ed25519::Ed25519));
        registry
    }
}

impl ContextRegistry {
    pub fn empty() -> Self {
        Self {
            contexts: HashMap::new(),
        }
    }

    pub fn register(&mut self, context: Box<dyn Context>) {
        self.contexts.insert(context.id(), context);
    }

    pub fn get(&self, id: u64) -> Option<&dyn Context> {
        self.contexts.get(&id).map(|c| c.as_ref())
    }
}

/// The registry of the built-in security contexts.
pub fn contexts() -> &'static ContextRegistry {
    static DEFAULT: LazyLock<ContextRegistry> = LazyLock::new(ContextRegistry::default);
    &DEFAULT
}
