/*!
Administrative records (RFC 9171 Section 6.1), of which the bundle status report
is the only type defined.
*/

use super::*;
use bundle_id::{BundleId, FragmentInfo};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown administrative record type {0}")]
    UnknownAdminRecordType(u64),

    #[error("Reserved Status Report Reason Code (255)")]
    ReservedStatusReportReason,

    #[error("Bundle is not an administrative record")]
    NotAdminRecord,

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] cbor::decode::Error),
}

trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error>;
}

impl<T, E: Into<Box<dyn core::error::Error + Send + Sync>>> CaptureFieldErr<T>
    for core::result::Result<T, E>
{
    fn map_field_err(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::InvalidField {
            field,
            source: e.into(),
        })
    }
}

/// Bundle status report reason codes (RFC 9171 Section 6.1.1).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReasonCode {
    #[default]
    NoAdditionalInformation,
    LifetimeExpired,
    ForwardedOverUnidirectionalLink,
    TransmissionCanceled,
    DepletedStorage,
    DestinationEndpointIDUnavailable,
    NoKnownRouteToDestinationFromHere,
    NoTimelyContactWithNextNodeOnRoute,
    BlockUnintelligible,
    HopLimitExceeded,
    TrafficPared,
    BlockUnsupported,
    MissingSecurityOperation,
    UnknownSecurityOperation,
    UnexpectedSecurityOperation,
    FailedSecurityOperation,
    ConflictingSecurityOperation,
    Unassigned(u64),
}

impl From<ReasonCode> for u64 {
    fn from(value: ReasonCode) -> Self {
        match value {
            ReasonCode::NoAdditionalInformation => 0,
            ReasonCode::LifetimeExpired => 1,
            ReasonCode::ForwardedOverUnidirectionalLink => 2,
            ReasonCode::TransmissionCanceled => 3,
            ReasonCode::DepletedStorage => 4,
            ReasonCode::DestinationEndpointIDUnavailable => 5,
            ReasonCode::NoKnownRouteToDestinationFromHere => 6,
            ReasonCode::NoTimelyContactWithNextNodeOnRoute => 7,
            ReasonCode::BlockUnintelligible => 8,
            ReasonCode::HopLimitExceeded => 9,
            ReasonCode::TrafficPared => 10,
            ReasonCode::BlockUnsupported => 11,
            ReasonCode::MissingSecurityOperation => 12,
            ReasonCode::UnknownSecurityOperation => 13,
            ReasonCode::UnexpectedSecurityOperation => 14,
            ReasonCode::FailedSecurityOperation => 15,
            ReasonCode::ConflictingSecurityOperation => 16,
            ReasonCode::Unassigned(v) => v,
        }
    }
}

impl TryFrom<u64> for ReasonCode {
    type Error = self::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReasonCode::NoAdditionalInformation),
            1 => Ok(ReasonCode::LifetimeExpired),
            2 => Ok(ReasonCode::ForwardedOverUnidirectionalLink),
            3 => Ok(ReasonCode::TransmissionCanceled),
            4 => Ok(ReasonCode::DepletedStorage),
            5 => Ok(ReasonCode::DestinationEndpointIDUnavailable),
            6 => Ok(ReasonCode::NoKnownRouteToDestinationFromHere),
            7 => Ok(ReasonCode::NoTimelyContactWithNextNodeOnRoute),
            8 => Ok(ReasonCode::BlockUnintelligible),
            9 => Ok(ReasonCode::HopLimitExceeded),
            10 => Ok(ReasonCode::TrafficPared),
            11 => Ok(ReasonCode::BlockUnsupported),
            12 => Ok(ReasonCode::MissingSecurityOperation),
            13 => Ok(ReasonCode::UnknownSecurityOperation),
            14 => Ok(ReasonCode::UnexpectedSecurityOperation),
            15 => Ok(ReasonCode::FailedSecurityOperation),
            16 => Ok(ReasonCode::ConflictingSecurityOperation),
            255 => Err(Error::ReservedStatusReportReason),
            v => Ok(ReasonCode::Unassigned(v)),
        }
    }
}

impl cbor::encode::ToCbor for ReasonCode {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for ReasonCode {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        match cbor::decode::try_parse::<u64>(data)? {
            Some((v, len)) => Ok(Some((v.try_into()?, len))),
            None => Ok(None),
        }
    }
}

/// An asserted status, with the time it happened. Reports from other agents may
/// assert a status without a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAssertion(pub Option<DtnTime>);

/// Which status a report asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Received,
    Forwarded,
    Delivered,
    Deleted,
}

fn emit_status_assertion(a: &mut cbor::encode::Array, sa: &Option<StatusAssertion>) {
    match sa {
        None => a.emit_array(Some(1), |a| {
            a.emit(&false);
        }),
        Some(StatusAssertion(None)) => a.emit_array(Some(1), |a| {
            a.emit(&true);
        }),
        Some(StatusAssertion(Some(timestamp))) => a.emit_array(Some(2), |a| {
            a.emit(&true);
            a.emit(timestamp);
        }),
    }
}

fn parse_status_assertion(a: &mut cbor::decode::Array) -> Result<Option<StatusAssertion>, Error> {
    a.parse_array(|a, _| {
        if !a.parse::<bool>().map_field_err("status")? {
            return Ok(None);
        }
        Ok(Some(StatusAssertion(
            a.try_parse::<DtnTime>().map_field_err("timestamp")?,
        )))
    })
}

/// A bundle status report (RFC 9171 Section 6.1.1).
///
/// The subject's destination is not carried, so `bundle_id.destination` is
/// always [`Eid::Null`] in a decoded report.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BundleStatusReport {
    pub bundle_id: BundleId,
    pub received: Option<StatusAssertion>,
    pub forwarded: Option<StatusAssertion>,
    pub delivered: Option<StatusAssertion>,
    pub deleted: Option<StatusAssertion>,
    pub reason: ReasonCode,
}

impl BundleStatusReport {
    /// A report asserting exactly one status of `bundle`, which happened at `at`.
    pub fn new(bundle: &Bundle, kind: StatusKind, reason: ReasonCode, at: DtnTime) -> Self {
        let assertion = Some(StatusAssertion(Some(at)));
        let mut report = Self {
            bundle_id: BundleId {
                destination: Eid::Null,
                ..bundle.id()
            },
            reason,
            ..Default::default()
        };
        match kind {
            StatusKind::Received => report.received = assertion,
            StatusKind::Forwarded => report.forwarded = assertion,
            StatusKind::Delivered => report.delivered = assertion,
            StatusKind::Deleted => report.deleted = assertion,
        }
        report
    }
}

impl cbor::encode::ToCbor for BundleStatusReport {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(
            Some(self.bundle_id.fragment_info.as_ref().map_or(4, |_| 6)),
            |a| {
                // Statuses
                a.emit_array(Some(4), |a| {
                    emit_status_assertion(a, &self.received);
                    emit_status_assertion(a, &self.forwarded);
                    emit_status_assertion(a, &self.delivered);
                    emit_status_assertion(a, &self.deleted);
                });

                a.emit(&self.reason);
                a.emit(&self.bundle_id.source);
                a.emit(&self.bundle_id.timestamp);

                if let Some(fragment_info) = &self.bundle_id.fragment_info {
                    a.emit(&fragment_info.offset);
                    a.emit(&fragment_info.total_len);
                }
            },
        )
    }
}

impl cbor::decode::FromCbor for BundleStatusReport {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, _| {
            let mut report = Self::default();
            a.parse_array(|a, _| {
                report.received = parse_status_assertion(a).map_field_err("received status")?;
                report.forwarded = parse_status_assertion(a).map_field_err("forwarded status")?;
                report.delivered = parse_status_assertion(a).map_field_err("delivered status")?;
                report.deleted = parse_status_assertion(a).map_field_err("deleted status")?;
                Ok::<_, Error>(())
            })
            .map_field_err("bundle status information")?;

            report.reason = a.parse().map_field_err("reason code")?;
            report.bundle_id.source = a.parse().map_field_err("source EID")?;
            report.bundle_id.timestamp = a.parse().map_field_err("creation timestamp")?;

            if let Some(offset) = a.try_parse().map_field_err("fragment offset")? {
                report.bundle_id.fragment_info = Some(FragmentInfo {
                    offset,
                    total_len: a.parse().map_field_err("fragment length")?,
                });
            }
            Ok(report)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdministrativeRecord {
    BundleStatusReport(BundleStatusReport),
}

impl AdministrativeRecord {
    /// Reads the administrative record carried as the payload of `bundle`.
    pub fn from_bundle(bundle: &Bundle) -> Result<Self, Error> {
        if !bundle.is_admin_record() {
            return Err(Error::NotAdminRecord);
        }
        cbor::decode::parse_exact(bundle.payload().unwrap_or_default())
    }
}

impl cbor::encode::ToCbor for AdministrativeRecord {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| match self {
            AdministrativeRecord::BundleStatusReport(report) => {
                a.emit(&1);
                a.emit(report);
            }
        })
    }
}

impl cbor::decode::FromCbor for AdministrativeRecord {
    type Error = self::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, _| {
            match a.parse::<u64>().map_field_err("record type code")? {
                1 => Ok(Self::BundleStatusReport(
                    a.parse().map_field_err("bundle status report")?,
                )),
                v => Err(Error::UnknownAdminRecordType(v)),
            }
        })
    }
}
