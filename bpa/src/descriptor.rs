use super::*;
use bpv7::bundle::Bundle;
use hashbrown::HashSet;

/// Conditions that hold a bundle back from reaching a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Constraint {
    DispatchPending,
    ForwardPending,
    ReassemblyPending,
    Contraindicated,
}

/// Facts about a bundle's origin and what has happened to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Tag {
    OriginCla,
    OriginLocal,
    OriginStorage,
    Delivered,
    Forwarded,
    Deleted,
}

/// A bundle as it moves through the agent.
///
/// A fresh descriptor is created each time a bundle enters the agent, and is only
/// ever mutated by the agent itself.
#[derive(Debug, Clone)]
pub struct BundleDescriptor {
    pub bundle: Bundle,
    pub received_at: time::OffsetDateTime,
    constraints: HashSet<Constraint>,
    tags: HashSet<Tag>,
}

impl BundleDescriptor {
    pub fn new(bundle: Bundle, origin: Tag) -> Self {
        Self {
            bundle,
            received_at: time::OffsetDateTime::now_utc(),
            constraints: HashSet::new(),
            tags: HashSet::from_iter([origin]),
        }
    }

    pub fn id(&self) -> bpv7::bundle_id::BundleId {
        self.bundle.id()
    }

    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.insert(constraint);
    }

    pub fn remove_constraint(&mut self, constraint: Constraint) -> bool {
        self.constraints.remove(&constraint)
    }

    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.constraints.iter().copied()
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.insert(tag);
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tags.iter().copied()
    }

    /// Milliseconds the bundle has existed, from its creation time or, without a
    /// source clock, from its Bundle Age block plus the time spent on this node.
    pub fn age(&self, now: time::OffsetDateTime) -> u64 {
        match self.bundle.primary.timestamp.creation_time {
            Some(creation_time) => clamp_millis(now - time::OffsetDateTime::from(creation_time)),
            None => self
                .bundle
                .bundle_age()
                .unwrap_or_default()
                .saturating_add(clamp_millis(now - self.received_at)),
        }
    }

    pub fn expiry(&self) -> time::OffsetDateTime {
        let remaining = self.bundle.primary.lifetime.saturating_sub(self.age(self.received_at));
        self.received_at
            .saturating_add(time::Duration::milliseconds(remaining.min(i64::MAX as u64) as i64))
    }

    pub fn has_expired(&self, now: time::OffsetDateTime) -> bool {
        self.expiry() <= now
    }
}

fn clamp_millis(duration: time::Duration) -> u64 {
    duration.whole_milliseconds().clamp(0, u64::MAX as i128) as u64
}
