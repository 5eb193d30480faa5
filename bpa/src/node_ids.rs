use super::*;
use bpv7::eid::Eid;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Node Ids must not be the Null Endpoint")]
    NullEndpoint,

    #[error("Administrative endpoints must not have a dtn demux part")]
    DtnWithDemux,

    #[error("ipn Node Ids must have service number 0, not {0}")]
    IpnServiceNumber(u64),

    #[error("Multiple ipn scheme Node Ids")]
    MultipleIpnNodeIds,

    #[error("Multiple dtn scheme Node Ids")]
    MultipleDtnNodeIds,

    #[error("At least one Node Id is required")]
    NoNodeIds,

    #[error(transparent)]
    InvalidEid(#[from] bpv7::eid::Error),
}

/// The administrative endpoints of this node, at most one per scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIds {
    pub(crate) ipn: Option<u64>,
    pub(crate) dtn: Option<Box<str>>,
}

impl NodeIds {
    /// The administrative endpoint to use as the source of bundles sent to
    /// `destination`, preferring the destination's own scheme.
    pub fn admin_endpoint(&self, destination: &Eid) -> Eid {
        match (destination, &self.ipn, &self.dtn) {
            (Eid::Dtn { .. }, _, Some(node_name)) | (_, None, Some(node_name)) => Eid::Dtn {
                node_name: node_name.clone(),
                demux: "".into(),
            },
            (_, Some(node_number), _) => Eid::Ipn {
                node_number: *node_number,
                service_number: 0,
            },
            // Construction guarantees at least one scheme
            (_, None, None) => Eid::Null,
        }
    }

    /// Returns `true` if `eid` is one of this node's administrative endpoints.
    pub fn contains(&self, eid: &Eid) -> bool {
        eid.is_admin_endpoint() && self.is_local(eid)
    }

    /// Returns `true` if `eid` is any endpoint hosted on this node.
    pub fn is_local(&self, eid: &Eid) -> bool {
        match (eid, &self.ipn, &self.dtn) {
            (Eid::Ipn { node_number, .. }, Some(n), _) => node_number == n,
            (Eid::Dtn { node_name, .. }, _, Some(n)) => node_name == n,
            _ => false,
        }
    }
}

impl Default for NodeIds {
    fn default() -> Self {
        Self {
            ipn: Some(rand::thread_rng().gen_range(0x4000_0000..0x8000_0000)),
            dtn: None,
        }
    }
}

impl From<&NodeIds> for Vec<Eid> {
    fn from(value: &NodeIds) -> Self {
        let mut v = Vec::new();
        if let Some(node_number) = value.ipn {
            v.push(Eid::Ipn {
                node_number,
                service_number: 0,
            });
        }
        if let Some(node_name) = &value.dtn {
            v.push(Eid::Dtn {
                node_name: node_name.clone(),
                demux: "".into(),
            });
        }
        v
    }
}

impl TryFrom<&[Eid]> for NodeIds {
    type Error = Error;

    fn try_from(eids: &[Eid]) -> Result<Self, Self::Error> {
        let mut ipn = None;
        let mut dtn = None;
        for eid in eids {
            match eid {
                Eid::Ipn {
                    node_number,
                    service_number: 0,
                } if *node_number != 0 => {
                    if ipn.is_some_and(|n| n != *node_number) {
                        return Err(Error::MultipleIpnNodeIds);
                    }
                    ipn = Some(*node_number);
                }
                Eid::Dtn { node_name, demux } if demux.is_empty() => {
                    if dtn.as_ref().is_some_and(|n| n != node_name) {
                        return Err(Error::MultipleDtnNodeIds);
                    }
                    dtn = Some(node_name.clone());
                }
                Eid::Ipn {
                    node_number: 0,
                    service_number: 0,
                } => return Err(Error::NullEndpoint),
                Eid::Ipn { service_number, .. } => {
                    return Err(Error::IpnServiceNumber(*service_number));
                }
                Eid::Dtn { .. } => return Err(Error::DtnWithDemux),
                Eid::Null => return Err(Error::NullEndpoint),
            }
        }
        if ipn.is_none() && dtn.is_none() {
            return Err(Error::NoNodeIds);
        }
        Ok(Self { ipn, dtn })
    }
}

impl TryFrom<Eid> for NodeIds {
    type Error = Error;

    fn try_from(eid: Eid) -> Result<Self, Self::Error> {
        core::slice::from_ref(&eid).try_into()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for NodeIds {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let eids = Vec::<Eid>::from(self);
            match eids.as_slice() {
                [eid] => serializer.serialize_str(&eid.to_string()),
                eids => serializer.collect_seq(eids.iter().map(|e| e.to_string())),
            }
        }
    }

    impl<'de> Deserialize<'de> for NodeIds {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct NodeIdsVisitor;

            impl<'de> Visitor<'de> for NodeIdsVisitor {
                type Value = NodeIds;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a single EID or a sequence of EIDs")
                }

                fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    value
                        .parse::<Eid>()
                        .map_err(E::custom)?
                        .try_into()
                        .map_err(E::custom)
                }

                fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                where
                    A: de::SeqAccess<'de>,
                {
                    let mut endpoints = Vec::new();
                    while let Some(eid) = seq.next_element::<String>()? {
                        endpoints.push(eid.parse::<Eid>().map_err(de::Error::custom)?);
                    }
                    endpoints.as_slice().try_into().map_err(de::Error::custom)
                }

                fn visit_none<E>(self) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(NodeIds::default())
                }

                fn visit_unit<E>(self) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Ok(NodeIds::default())
                }
            }

            deserializer.deserialize_any(NodeIdsVisitor)
        }
    }
}
