use super::*;
use error::CaptureFieldErr;
use winnow::{
    ModalResult, Parser,
    ascii::dec_uint,
    combinator::{alt, preceded, terminated},
    token::take_while,
};

fn parse_ipn(input: &mut &str) -> ModalResult<Eid> {
    (dec_uint, preceded(".", dec_uint))
        .map(|(node_number, service_number)| Eid::Ipn {
            node_number,
            service_number,
        })
        .parse_next(input)
}

fn is_regname_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~!$&'()*+,;=%".contains(c)
}

fn parse_regname(input: &mut &str) -> ModalResult<Box<str>> {
    take_while(1.., is_regname_char)
        .try_map(|v| {
            percent_encoding::percent_decode_str(v)
                .decode_utf8()
                .map(|s| s.into_owned().into())
        })
        .parse_next(input)
}

fn parse_dtn_parts(input: &mut &str) -> ModalResult<Eid> {
    (
        terminated(parse_regname, "/"),
        take_while(0.., '\x21'..='\x7e'),
    )
        .map(|(node_name, demux): (Box<str>, &str)| Eid::Dtn {
            node_name,
            demux: demux.into(),
        })
        .parse_next(input)
}

fn parse_dtn(input: &mut &str) -> ModalResult<Eid> {
    alt(("none".map(|_| Eid::Null), preceded("//", parse_dtn_parts))).parse_next(input)
}

fn parse_eid(input: &mut &str) -> ModalResult<Eid> {
    alt((preceded("dtn:", parse_dtn), preceded("ipn:", parse_ipn))).parse_next(input)
}

impl core::str::FromStr for Eid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_eid
            .parse(s)
            .map_err(|e| Error::ParseError(e.to_string()))
    }
}

impl TryFrom<&str> for Eid {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Eid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn ipn_from_cbor(a: &mut cbor::decode::Array) -> Result<Eid, Error> {
    match a.count() {
        Some(count) if count != 2 => return Err(Error::InvalidIpnComponents(count)),
        _ => {}
    }
    let node_number = a.parse().map_field_err("'ipn' node number")?;
    let service_number = a.parse().map_field_err("'ipn' service number")?;
    if !a.at_end()? {
        return Err(Error::InvalidIpnComponents(a.parsed() + 1));
    }
    Ok(Eid::Ipn {
        node_number,
        service_number,
    })
}

impl cbor::decode::FromCbor for Eid {
    type Error = error::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, tags| {
            if !tags.is_empty() {
                return Err(Error::InvalidCBOR(cbor::decode::Error::IncorrectType(
                    "Untagged Array".to_string(),
                    "Tagged Array".to_string(),
                )));
            }
            match a.parse::<u64>().map_field_err("EID scheme")? {
                1 => a
                    .parse_value(|value, tags| match value {
                        cbor::decode::Value::UnsignedInteger(0) if tags.is_empty() => Ok(Eid::Null),
                        cbor::decode::Value::Text(s) if tags.is_empty() => preceded("//", parse_dtn_parts)
                            .parse(s)
                            .map_err(|_| Error::InvalidDtnSsp),
                        value => Err(cbor::decode::Error::IncorrectType(
                            "Untagged Text String or 0".to_string(),
                            value.type_name(!tags.is_empty()),
                        )
                        .into()),
                    })
                    .map_field_err("'dtn' scheme-specific part"),
                2 => a
                    .parse_array(|a, tags| {
                        if tags.is_empty() {
                            ipn_from_cbor(a)
                        } else {
                            Err(cbor::decode::Error::IncorrectType(
                                "Untagged Array".to_string(),
                                "Tagged Array".to_string(),
                            )
                            .into())
                        }
                    })
                    .map_field_err("'ipn' scheme-specific part"),
                scheme => Err(Error::UnsupportedScheme(scheme)),
            }
        })
    }
}
