use super::*;

/// An (id, value) pair of a security context parameter or result. The value is
/// kept as its CBOR encoding, only the security context knows its type.
pub type IdValue = (u64, Box<[u8]>);

/// The Abstract Security Block (RFC 9172 Section 3.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractSecurityBlock {
    pub targets: Vec<u64>,
    pub context_id: u64,
    pub source: Eid,
    /// `Some` iff the context parameters present flag is set.
    pub parameters: Option<Vec<IdValue>>,
    /// One result list per target, in target order.
    pub results: Vec<Vec<IdValue>>,
}

impl AbstractSecurityBlock {
    /// The encoded value of context parameter `id`, if present exactly once.
    pub fn parameter(&self, id: u64) -> Option<&[u8]> {
        unique(self.parameters.as_deref().unwrap_or_default(), id)
    }

    /// The encoded value of result `id` for the target at `idx`, if present exactly once.
    pub fn result(&self, idx: usize, id: u64) -> Option<&[u8]> {
        unique(self.results.get(idx)?, id)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = cbor::encode::Encoder::new();
        encoder.emit_slice(&self.targets);
        encoder.emit(&self.context_id);
        encoder.emit(&(self.parameters.is_some() as u64));
        encoder.emit(&self.source);
        if let Some(parameters) = &self.parameters {
            emit_id_values(&mut encoder, parameters);
        }
        encoder.emit_array(Some(self.results.len()), |a| {
            for results in &self.results {
                a.emit_array(Some(results.len()), |a| {
                    for (id, value) in results {
                        a.emit_array(Some(2), |a| {
                            a.emit(id);
                            a.emit(&cbor::encode::Raw(value));
                        });
                    }
                });
            }
        });
        encoder.build()
    }

    /// Decodes the block-type-specific data of a security block, an RFC 8742 CBOR sequence.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        cbor::decode::parse_sequence(data, |seq| {
            let targets = seq
                .parse_array(|a, _| {
                    let mut targets = Vec::new();
                    while let Some(target) = a.try_parse::<u64>()? {
                        targets.push(target);
                    }
                    Ok::<_, Error>(targets)
                })
                .map_field_err("security targets")?;

            let context_id = seq.parse::<u64>().map_field_err("security context id")?;
            let flags = seq
                .parse::<u64>()
                .map_field_err("security context flags")?;
            let source = seq.parse::<Eid>().map_field_err("security source")?;

            let parameters = if flags & 1 != 0 {
                Some(
                    seq.parse_array(|a, _| parse_id_values(a))
                        .map_field_err("security context parameters")?,
                )
            } else {
                None
            };

            let results = seq
                .parse_array(|a, _| {
                    let mut results = Vec::new();
                    while let Some(r) = a.try_parse_array(|a, _| parse_id_values(a))? {
                        results.push(r);
                    }
                    Ok::<_, Error>(results)
                })
                .map_field_err("security results")?;

            Ok(Self {
                targets,
                context_id,
                source,
                parameters,
                results,
            })
        })
    }
}

fn unique(values: &[IdValue], id: u64) -> Option<&[u8]> {
    let mut found = values.iter().filter(|(i, _)| *i == id);
    match (found.next(), found.next()) {
        (Some((_, value)), None) => Some(value),
        _ => None,
    }
}

fn emit_id_values(encoder: &mut cbor::encode::Encoder, values: &[IdValue]) {
    encoder.emit_array(Some(values.len()), |a| {
        for (id, value) in values {
            a.emit_array(Some(2), |a| {
                a.emit(id);
                a.emit(&cbor::encode::Raw(value));
            });
        }
    })
}

fn parse_id_values(a: &mut cbor::decode::Array) -> Result<Vec<IdValue>, Error> {
    let mut values = Vec::new();
    while let Some(value) = a.try_parse_array(|a, _| {
        let id = a.parse::<u64>().map_field_err("id")?;
        let value = a.parse_raw(16).map_field_err("value")?;
        Ok::<_, Error>((id, value.into()))
    })? {
        values.push(value);
    }
    Ok(values)
}
