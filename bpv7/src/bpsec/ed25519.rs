/*!
A block signature context using Ed25519ph (RFC 8032 Section 5.1).

Each target is hashed with SHA-512 as its encoding is streamed in, then the
digest is signed. A target payload is never copied into a signing buffer.

Parameters: public key (1, byte string of 32 bytes) and signing time (2, DTN time).
Results: one signature (1, byte string of 64 bytes) per target.
*/

use super::*;
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha512};

pub const CONTEXT_ID: u64 = 64;

pub const PARAM_PUBLIC_KEY: u64 = 1;
pub const PARAM_TIMESTAMP: u64 = 2;
pub const RESULT_SIGNATURE: u64 = 1;

pub struct Ed25519;

fn prehash(data: &dyn Targets, target: u64) -> Result<Sha512, crate::Error> {
    let mut digest = Sha512::new();
    data.feed(target, &mut |part: &[u8]| digest.update(part))?;
    Ok(digest)
}

fn parse_bytes<const N: usize>(value: &[u8]) -> Option<[u8; N]> {
    cbor::decode::parse_exact::<Box<[u8]>>(value)
        .ok()
        .and_then(|v| <[u8; N]>::try_from(v.as_ref()).ok())
}

impl Context for Ed25519 {
    fn id(&self) -> u64 {
        CONTEXT_ID
    }

    fn sign(
        &self,
        targets: &[u64],
        data: &dyn Targets,
        key: &Key,
        source: &Eid,
    ) -> Result<AbstractSecurityBlock, crate::Error> {
        #[allow(unreachable_patterns)]
        let signing_key = match key {
            Key::Ed25519(signing_key) => signing_key,
            _ => return Err(Error::InvalidKey(CONTEXT_ID).into()),
        };

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let signature = signing_key
                .sign_prehashed(prehash(data, *target)?, None)
                .map_err(|_| Error::IntegrityCheckFailed(*target))?;
            results.push(vec![(
                RESULT_SIGNATURE,
                cbor::encode::emit(&signature.to_bytes()).into(),
            )]);
        }

        Ok(AbstractSecurityBlock {
            targets: targets.to_vec(),
            context_id: CONTEXT_ID,
            source: source.clone(),
            parameters: Some(vec![
                (
                    PARAM_PUBLIC_KEY,
                    cbor::encode::emit(&signing_key.verifying_key().to_bytes()).into(),
                ),
                (PARAM_TIMESTAMP, cbor::encode::emit(&DtnTime::now()).into()),
            ]),
            results,
        })
    }

    fn verify(&self, asb: &AbstractSecurityBlock, data: &dyn Targets) -> Result<(), crate::Error> {
        let public_key = asb
            .parameter(PARAM_PUBLIC_KEY)
            .ok_or(Error::MissingContextParameter(PARAM_PUBLIC_KEY))?;
        let public_key = parse_bytes::<32>(public_key)
            .and_then(|k| VerifyingKey::from_bytes(&k).ok())
            .ok_or(Error::InvalidContextParameter(PARAM_PUBLIC_KEY))?;

        for (idx, target) in asb.targets.iter().enumerate() {
            let signature = asb
                .result(idx, RESULT_SIGNATURE)
                .ok_or(Error::MissingContextResult(RESULT_SIGNATURE))?;
            let signature = parse_bytes::<64>(signature)
                .ok_or(Error::InvalidContextResult(RESULT_SIGNATURE))?;

            public_key
                .verify_prehashed(
                    prehash(data, *target)?,
                    None,
                    &Signature::from_bytes(&signature),
                )
                .map_err(|_| Error::IntegrityCheckFailed(*target))?;
        }
        Ok(())
    }
}
