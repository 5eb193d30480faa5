use super::*;
use block::{Block, BlockData, Type};
use ed25519_dalek::SigningKey;

const CRC_TYPES: [CrcType; 3] = [
    CrcType::None,
    CrcType::CRC16_X25,
    CrcType::CRC32_CASTAGNOLI,
];

fn timestamp() -> CreationTimestamp {
    CreationTimestamp::new(Some(DtnTime::new(700_000_000_000)), 42)
}

fn simple(crc_type: CrcType) -> Bundle {
    let mut b = builder::Builder::new();
    b.source("ipn:1.1".parse().unwrap())
        .destination("dtn://remote/app".parse().unwrap())
        .report_to("ipn:1.0".parse().unwrap())
        .crc_type(crc_type)
        .payload(*b"Hello world!");
    b.build(timestamp())
}

fn full(crc_type: CrcType) -> Bundle {
    let mut bundle = simple(crc_type);
    bundle.add_block(
        Block::new(
            Type::HopCount,
            BlockData::HopCount(HopInfo {
                limit: 30,
                count: 2,
            }),
        )
        .with_crc_type(crc_type),
    );
    bundle.add_block(
        Block::new(Type::BundleAge, BlockData::BundleAge(1234))
            .with_crc_type(crc_type)
            .with_flags(block::Flags {
                must_replicate: true,
                ..Default::default()
            }),
    );
    bundle.add_block(
        Block::new(
            Type::PreviousNode,
            BlockData::PreviousNode("ipn:3.0".parse().unwrap()),
        )
        .with_crc_type(crc_type),
    );
    bundle
}

fn round_trip(bundle: &Bundle) -> Bundle {
    let data = bundle.encode().unwrap();
    let decoded = Bundle::decode(&data).unwrap();
    assert_eq!(&decoded, bundle);
    validate(&decoded).unwrap();

    // Deterministic re-encoding
    assert_eq!(decoded.encode().unwrap(), data);
    decoded
}

#[test]
fn round_trips() {
    for crc_type in CRC_TYPES {
        round_trip(&simple(crc_type));

        let decoded = round_trip(&full(crc_type));
        assert_eq!(
            decoded.hop_count(),
            Some(HopInfo {
                limit: 30,
                count: 2
            })
        );
        assert_eq!(decoded.bundle_age(), Some(1234));
        assert_eq!(
            decoded.previous_node(),
            Some(&"ipn:3.0".parse::<Eid>().unwrap())
        );
        if crc_type != CrcType::None {
            assert!(decoded.primary.received_crc().is_some());
            assert!(decoded.blocks.iter().all(|b| b.received_crc().is_some()));
        }

        let mut fragment = full(crc_type);
        fragment.primary.flags.is_fragment = true;
        fragment.primary.fragment_offset = 5;
        fragment.primary.total_data_length = 100;
        let decoded = round_trip(&fragment);
        assert_eq!(
            decoded.id().fragment_info,
            Some(bundle_id::FragmentInfo {
                offset: 5,
                total_len: 100
            })
        );
    }
}

#[test]
fn round_trip_no_clock() {
    let mut b = builder::Builder::new();
    b.source("dtn://node/src".parse().unwrap())
        .destination("ipn:9.1".parse().unwrap())
        .payload(Vec::new());
    round_trip(&b.build(CreationTimestamp::new(None, 0)));
}

#[test]
fn block_order() {
    let bundle = full(CrcType::None);
    assert_eq!(
        bundle.blocks.iter().map(|b| b.number).collect::<Vec<_>>(),
        [4, 3, 2, 1]
    );
    assert_eq!(bundle.blocks_of_type(Type::BundleAge).count(), 1);

    let mut bundle = bundle;
    assert!(bundle.remove_block(3).is_some());
    assert!(bundle.remove_block(3).is_none());
    assert_eq!(
        bundle.add_block(Block::new(Type::BundleAge, BlockData::BundleAge(0))),
        5
    );
    assert_eq!(bundle.blocks[0].number, 5);
    validate(&bundle).unwrap();
}

#[test]
fn decode_errors() {
    let data = simple(CrcType::CRC16_X25).encode().unwrap();

    let mut extra = data.clone();
    extra.push(0);
    assert!(matches!(Bundle::decode(&extra), Err(Error::AdditionalData)));

    assert!(Bundle::decode(&data[..data.len() - 1]).is_err());
    assert!(Bundle::decode(&[]).is_err());

    // Definite-length outer array
    let mut definite = data.clone();
    definite[0] = 0x82;
    definite.pop();
    assert!(Bundle::decode(&definite).is_err());
}

#[test]
fn crc_mismatch() {
    for crc_type in [CrcType::CRC16_X25, CrcType::CRC32_CASTAGNOLI] {
        let data = simple(crc_type).encode().unwrap();

        // Flip a bit in the payload, which precedes the CRC of the final block
        let mut corrupt = data.clone();
        let idx = data.len() - 2 - crc_type.value_len() - 1;
        corrupt[idx] ^= 0x01;
        let bundle = Bundle::decode(&corrupt).unwrap();
        assert!(matches!(
            validate(&bundle),
            Err(Error::InvalidCrc(crc::Error::IncorrectCrc))
        ));
    }
}

#[test]
fn structural_failures() {
    let mut bundle = full(CrcType::None);
    bundle.blocks[0].number = 2;
    assert!(matches!(
        validate(&bundle),
        Err(Error::DuplicateBlockNumber(2))
    ));

    let mut bundle = full(CrcType::None);
    bundle.blocks.pop();
    assert!(matches!(validate(&bundle), Err(Error::MissingPayload)));

    let mut bundle = full(CrcType::None);
    bundle.blocks.rotate_right(1);
    assert!(matches!(validate(&bundle), Err(Error::PayloadNotFinal)));

    let mut bundle = full(CrcType::None);
    bundle.blocks[0].data = BlockData::BundleAge(1);
    assert!(matches!(
        validate(&bundle),
        Err(Error::BlockDataMismatch(Type::PreviousNode))
    ));

    let mut bundle = full(CrcType::None);
    bundle.blocks[0].number = 0;
    assert!(matches!(
        validate(&bundle),
        Err(Error::InvalidBlockNumber(0, Type::PreviousNode))
    ));

    let mut bundle = full(CrcType::None);
    bundle.add_block(Block::new(Type::BundleAge, BlockData::BundleAge(5)));
    assert!(matches!(
        validate(&bundle),
        Err(Error::DuplicateBlocks(Type::BundleAge))
    ));

    let mut bundle = simple(CrcType::None);
    bundle.primary.timestamp.creation_time = None;
    assert!(matches!(validate(&bundle), Err(Error::MissingBundleAge)));

    let mut bundle = simple(CrcType::None);
    bundle.primary.flags.is_fragment = true;
    bundle.primary.fragment_offset = 10;
    bundle.primary.total_data_length = 10;
    assert!(matches!(
        validate(&bundle),
        Err(Error::InvalidFragmentInfo(10, 10))
    ));
}

#[test]
fn expiry() {
    let bundle = simple(CrcType::None);
    let created = timestamp().creation_time.unwrap();
    assert_eq!(bundle.expiry(), Some(created.saturating_add(24 * 60 * 60 * 1000)));
    assert!(!bundle.is_expired(created));
    assert!(bundle.is_expired(created.saturating_add(24 * 60 * 60 * 1000)));

    let mut b = builder::Builder::new();
    b.source("ipn:1.1".parse().unwrap()).lifetime(1000);
    let mut bundle = b.build(CreationTimestamp::new(None, 0));
    assert!(!bundle.is_expired(DtnTime::now()));
    if let Some(block) = bundle.blocks.iter_mut().find(|b| b.block_type == Type::BundleAge) {
        block.data = BlockData::BundleAge(1000);
    }
    assert!(bundle.is_expired(DtnTime::now()));
}

#[test]
fn ids() {
    let a = simple(CrcType::None);
    let b = simple(CrcType::CRC32_CASTAGNOLI);
    assert_eq!(a.id(), b.id());
    assert_eq!(a.id().to_key(), b.id().to_key());

    let mut c = simple(CrcType::None);
    c.primary.timestamp.sequence_number += 1;
    assert_ne!(a.id().to_key(), c.id().to_key());

    let fragments = fragment::fragment(&a, 4).unwrap();
    assert_eq!(fragments.len(), 3);
    assert!(fragments.iter().all(|f| f.fragment_id() == a.id()));
    assert_ne!(fragments[0].id(), fragments[1].id());
}

fn key(seed: u8) -> bpsec::Key {
    bpsec::Key::Ed25519(SigningKey::from_bytes(&[seed; 32]))
}

#[test]
fn signed_bundle() {
    for crc_type in CRC_TYPES {
        let mut bundle = full(crc_type);
        let number = bpsec::sign(&mut bundle, &[0, 1, 2], &key(1), &"ipn:1.0".parse().unwrap())
            .unwrap();
        assert_eq!(number, 5);
        validate(&bundle).unwrap();

        // The signature survives the wire
        let decoded = round_trip(&bundle);
        let Some(BlockData::Security(asb)) = decoded.block(number).map(|b| &b.data) else {
            panic!("No security block");
        };
        assert_eq!(asb.targets, [0, 1, 2]);
        assert_eq!(asb.context_id, bpsec::ed25519::CONTEXT_ID);
    }
}

#[test]
fn tampered_signed_bundle() {
    let mut bundle = full(CrcType::None);
    bpsec::sign(&mut bundle, &[1], &key(1), &Eid::Null).unwrap();

    let mut tampered = bundle.clone();
    if let Some(block) = tampered.block_mut(1) {
        block.data = BlockData::Raw(Box::new(*b"Hello world?"));
    }
    assert!(matches!(
        validate(&tampered),
        Err(Error::InvalidBPSec(bpsec::Error::IntegrityCheckFailed(1)))
    ));

    // Tampering with an untargeted block is fine
    let mut tampered = bundle.clone();
    if let Some(block) = tampered.block_mut(2) {
        block.data = BlockData::HopCount(HopInfo {
            limit: 30,
            count: 3,
        });
    }
    validate(&tampered).unwrap();

    // A fragment cannot be verified, the reassembled bundle is
    let fragments = fragment::fragment(&bundle, 5).unwrap();
    assert_eq!(fragment::reassemble(fragments).unwrap(), bundle);
}

#[test]
fn signed_large_payload() {
    let mut b = builder::Builder::new();
    b.source("ipn:1.1".parse().unwrap())
        .destination("ipn:2.1".parse().unwrap())
        .crc_type(CrcType::CRC32_CASTAGNOLI)
        .payload(vec![0x5A; 4 * 1024 * 1024]);
    let mut bundle = b.build(timestamp());
    bpsec::sign(&mut bundle, &[0, 1], &key(1), &Eid::Null).unwrap();
    validate(&bundle).unwrap();

    if let Some(BlockData::Raw(payload)) = bundle.block_mut(1).map(|b| &mut b.data) {
        let last = payload.len() - 1;
        payload[last] ^= 1;
    }
    assert!(matches!(
        validate(&bundle),
        Err(Error::InvalidBPSec(bpsec::Error::IntegrityCheckFailed(1)))
    ));
}

#[test]
fn bad_security_blocks() {
    let mut bundle = full(CrcType::None);
    let number = bpsec::sign(&mut bundle, &[1], &key(1), &Eid::Null).unwrap();

    // Self-targeting
    let mut b = bundle.clone();
    if let Some(BlockData::Security(asb)) = b.block_mut(number).map(|b| &mut b.data) {
        asb.targets[0] = number;
    }
    assert!(matches!(
        validate(&b),
        Err(Error::InvalidBPSec(bpsec::Error::SelfTarget(_)))
    ));

    // Missing target
    let mut b = bundle.clone();
    if let Some(BlockData::Security(asb)) = b.block_mut(number).map(|b| &mut b.data) {
        asb.targets[0] = 99;
    }
    assert!(matches!(
        validate(&b),
        Err(Error::InvalidBPSec(bpsec::Error::MissingSecurityTarget(99)))
    ));

    // Results do not match targets
    let mut b = bundle.clone();
    if let Some(BlockData::Security(asb)) = b.block_mut(number).map(|b| &mut b.data) {
        asb.targets.push(2);
    }
    assert!(matches!(
        validate(&b),
        Err(Error::InvalidBPSec(bpsec::Error::MismatchedTargetResult))
    ));

    // Unknown context
    let mut b = bundle.clone();
    if let Some(BlockData::Security(asb)) = b.block_mut(number).map(|b| &mut b.data) {
        asb.context_id = 200;
    }
    assert!(matches!(
        validate(&b),
        Err(Error::InvalidBPSec(bpsec::Error::UnrecognisedContext(200)))
    ));

    // Signed with one key, claiming another
    let mut other = full(CrcType::None);
    bpsec::sign(&mut other, &[1], &key(2), &Eid::Null).unwrap();
    let mut b = bundle.clone();
    let other_params = match other.block(number).map(|b| &b.data) {
        Some(BlockData::Security(asb)) => asb.parameters.clone(),
        _ => None,
    };
    if let Some(BlockData::Security(asb)) = b.block_mut(number).map(|b| &mut b.data) {
        asb.parameters = other_params;
    }
    assert!(matches!(
        validate(&b),
        Err(Error::InvalidBPSec(bpsec::Error::IntegrityCheckFailed(1)))
    ));
}

#[test]
fn signing_refusals() {
    let mut bundle = full(CrcType::None);
    let number = bpsec::sign(&mut bundle, &[1], &key(1), &Eid::Null).unwrap();

    assert!(matches!(
        bpsec::sign(&mut bundle, &[number], &key(1), &Eid::Null),
        Err(Error::InvalidBPSec(bpsec::Error::InvalidTarget(_)))
    ));
    assert!(matches!(
        bpsec::sign(&mut bundle, &[42], &key(1), &Eid::Null),
        Err(Error::InvalidBPSec(bpsec::Error::MissingSecurityTarget(42)))
    ));
    assert!(matches!(
        bpsec::sign(&mut bundle, &[], &key(1), &Eid::Null),
        Err(Error::InvalidBPSec(bpsec::Error::NoTargets))
    ));
    assert!(matches!(
        bpsec::sign(&mut bundle, &[1, 1], &key(1), &Eid::Null),
        Err(Error::InvalidBPSec(bpsec::Error::DuplicateTarget(1)))
    ));
}

#[cfg(feature = "serde")]
#[test]
fn serde_ids() {
    let id = simple(CrcType::None).id();
    let json = serde_json::to_string(&id).unwrap();
    assert!(json.contains("\"ipn:1.1\""));
    assert_eq!(serde_json::from_str::<bundle_id::BundleId>(&json).unwrap(), id);
}
