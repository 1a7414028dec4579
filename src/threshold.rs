use std::{collections::HashSet, sync::Arc};

use crate::{
    context::Context,
    dsse::Envelope,
    error::{Error, Result, ThresholdFailure, VerificationAttempt, VerificationError},
    verifier::Verifier,
};

/// Accepts an envelope once at least `threshold` distinct verifiers are
/// satisfied by distinct signatures.
///
/// Each verifier is credited at most once and each signature credits at most
/// one verifier. Credit is assigned by maximum matching between signatures
/// and the verifiers that accept them, so the outcome does not depend on the
/// order of either list.
pub struct ThresholdVerifier {
    verifiers: Vec<Arc<dyn Verifier>>,
    keyids: Vec<String>,
    threshold: usize,
}

impl ThresholdVerifier {
    /// Validates the verifier set and threshold.
    ///
    /// Called before any envelope is read; a zero threshold, an empty
    /// verifier list, or the same verifier given twice are configuration
    /// errors.
    pub fn new(verifiers: Vec<Arc<dyn Verifier>>, threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::config("threshold must be at least 1"));
        }
        if verifiers.is_empty() {
            return Err(Error::config("at least one verifier is required"));
        }
        if threshold > verifiers.len() {
            log::warn!(
                "Threshold {threshold} exceeds the {} verifiers provided, verification cannot succeed",
                verifiers.len()
            );
        }

        let keyids: Vec<String> = verifiers.iter().map(|v| v.key_id()).collect();
        let mut seen = HashSet::new();
        for (verifier, keyid) in verifiers.iter().zip(&keyids) {
            if keyid.is_empty() {
                continue;
            }
            let identity = verifier.identity();
            if !seen.insert(identity.clone()) {
                return Err(Error::config(format!(
                    "verifier '{identity}' was provided more than once"
                )));
            }
        }

        Ok(Self {
            verifiers,
            keyids,
            threshold,
        })
    }

    /// Parses a persisted envelope and verifies it.
    pub async fn verify_json(&self, ctx: &Context, bytes: &[u8]) -> Result<Vec<String>> {
        let envelope = Envelope::try_from_json_slice(bytes)?;
        self.verify(ctx, &envelope).await
    }

    /// Verifies `envelope`, returning the key IDs of the credited verifiers.
    ///
    /// Key IDs are ordered by the first signature each credited verifier
    /// validated, ties broken by verifier order.
    pub async fn verify(&self, ctx: &Context, envelope: &Envelope) -> Result<Vec<String>> {
        let pae = envelope.pae();

        // accepted_by[s] lists the verifiers that accept signature s
        let mut accepted_by: Vec<Vec<usize>> = vec![Vec::new(); envelope.signatures.len()];
        let mut attempts = Vec::new();

        for (si, signature) in envelope.signatures.iter().enumerate() {
            for (vi, verifier) in self.verifiers.iter().enumerate() {
                let verifier_keyid = &self.keyids[vi];
                if signature.is_identified()
                    && !verifier_keyid.is_empty()
                    && &signature.keyid != verifier_keyid
                {
                    continue;
                }

                let outcome = verifier
                    .verify(
                        ctx,
                        &signature.keyid,
                        &pae,
                        &signature.sig,
                        signature.extension.as_ref(),
                    )
                    .await;

                let error = match outcome {
                    Ok(()) => {
                        log::debug!("Signature #{si} accepted by {verifier_keyid}");
                        accepted_by[si].push(vi);
                        None
                    }
                    Err(e) if e.is_interrupted() => {
                        return Err(VerificationError::Interrupted(e).into());
                    }
                    Err(e) => {
                        log::debug!("Signature #{si} rejected by {verifier_keyid}: {e}");
                        Some(e.to_string())
                    }
                };

                attempts.push(VerificationAttempt {
                    signature_index: si,
                    signature_keyid: signature.keyid.clone(),
                    verifier_keyid: verifier_keyid.clone(),
                    error,
                });
            }
        }

        let credited = max_matching(&accepted_by, self.verifiers.len());

        let mut first_success: Vec<(usize, usize)> = credited
            .iter()
            .enumerate()
            .filter(|(_, sig)| sig.is_some())
            .filter_map(|(vi, _)| {
                accepted_by
                    .iter()
                    .position(|vs| vs.contains(&vi))
                    .map(|si| (si, vi))
            })
            .collect();
        first_success.sort_unstable();

        let accepted: Vec<String> = first_success
            .into_iter()
            .map(|(_, vi)| self.keyids[vi].clone())
            .collect();

        if accepted.len() < self.threshold {
            return Err(VerificationError::ThresholdNotMet(ThresholdFailure {
                needed: self.threshold,
                obtained: accepted.len(),
                accepted,
                attempts,
            })
            .into());
        }

        log::info!(
            "Envelope verified by {} of {} required verifiers",
            accepted.len(),
            self.threshold
        );
        Ok(accepted)
    }
}

/// Maximum bipartite matching of signatures to verifiers.
///
/// Returns, per verifier, the signature credited to it.
fn max_matching(accepted_by: &[Vec<usize>], verifier_count: usize) -> Vec<Option<usize>> {
    fn augment(
        si: usize,
        accepted_by: &[Vec<usize>],
        credited: &mut [Option<usize>],
        visited: &mut [bool],
    ) -> bool {
        for &vi in &accepted_by[si] {
            if visited[vi] {
                continue;
            }
            visited[vi] = true;
            let free = match credited[vi] {
                None => true,
                Some(other) => augment(other, accepted_by, credited, visited),
            };
            if free {
                credited[vi] = Some(si);
                return true;
            }
        }
        false
    }

    let mut credited = vec![None; verifier_count];
    for si in 0..accepted_by.len() {
        let mut visited = vec![false; verifier_count];
        augment(si, accepted_by, &mut credited, &mut visited);
    }
    credited
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::{
        dsse::{Extension, PayloadType, Signature},
        error::CapabilityError,
        signer::{KeyType, Signer, SignerType},
        verifier::{DidKeyVerifier, FulcioVerifier},
    };

    async fn signed_envelope(signers: &[SignerType]) -> Envelope {
        let mut envelope = Envelope::new(
            PayloadType::from("application/vnd.example+json"),
            br#"{"hello":"world"}"#.to_vec(),
        );
        let pae = envelope.pae();
        for signer in signers {
            let sig = signer.sign(&Context::new(), &pae).await.unwrap();
            envelope.push_signature(Signature::new(signer.key_id().unwrap(), sig));
        }
        envelope
    }

    fn verifiers_for(signers: &[SignerType]) -> Vec<Arc<dyn Verifier>> {
        signers
            .iter()
            .map(|s| Arc::new(DidKeyVerifier::new(s.did()).unwrap()) as Arc<dyn Verifier>)
            .collect()
    }

    fn signers(n: usize) -> Vec<SignerType> {
        (0..n)
            .map(|i| {
                let key_type = if i % 2 == 0 {
                    KeyType::ED25519
                } else {
                    KeyType::SECP256R1
                };
                SignerType::create(key_type).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn round_trip_with_threshold_one() {
        let _ = env_logger::builder().is_test(true).try_init();
        let signers = signers(1);
        let envelope = signed_envelope(&signers).await;
        let verifier = ThresholdVerifier::new(verifiers_for(&signers), 1).unwrap();

        let accepted = verifier.verify(&Context::new(), &envelope).await.unwrap();
        assert_eq!(accepted, vec![signers[0].did().to_owned()]);

        let bytes = envelope.to_json_vec().unwrap();
        let accepted = verifier.verify_json(&Context::new(), &bytes).await.unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn flipped_payload_or_signature_byte_fails() {
        let signers = signers(1);
        let envelope = signed_envelope(&signers).await;
        let verifier = ThresholdVerifier::new(verifiers_for(&signers), 1).unwrap();
        let ctx = Context::new();

        for i in 0..envelope.payload.len() {
            let mut tampered = envelope.clone();
            tampered.payload[i] ^= 0x01;
            assert!(verifier.verify(&ctx, &tampered).await.is_err());
        }

        for i in [0, 31, 63] {
            let mut tampered = envelope.clone();
            tampered.signatures[0].sig[i] ^= 0x80;
            assert!(verifier.verify(&ctx, &tampered).await.is_err());
        }

        let mut retyped = envelope.clone();
        retyped.payload_type = PayloadType::from("application/vnd.other+json");
        assert!(verifier.verify(&ctx, &retyped).await.is_err());
    }

    #[tokio::test]
    async fn two_of_three_reports_accepted_in_signature_order() {
        let signers = signers(3);
        let envelope = signed_envelope(&signers).await;
        let mut verifiers = verifiers_for(&signers);
        verifiers.reverse();
        let verifier = ThresholdVerifier::new(verifiers, 2).unwrap();

        let accepted = verifier.verify(&Context::new(), &envelope).await.unwrap();
        let expected: Vec<String> = signers.iter().map(|s| s.did().to_owned()).collect();
        assert_eq!(accepted, expected);
    }

    #[tokio::test]
    async fn threshold_unmet_reports_counts() {
        let signers = signers(3);
        let envelope = signed_envelope(&signers[..2]).await;
        let verifier = ThresholdVerifier::new(verifiers_for(&signers), 3).unwrap();

        let err = verifier
            .verify(&Context::new(), &envelope)
            .await
            .unwrap_err();
        match &err {
            Error::Verification(VerificationError::ThresholdNotMet(failure)) => {
                assert_eq!(failure.needed, 3);
                assert_eq!(failure.obtained, 2);
                assert_eq!(failure.attempts.len(), 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("2 of 3"), "{err}");
    }

    #[tokio::test]
    async fn duplicated_signature_counts_once() {
        let signers = signers(1);
        let mut envelope = signed_envelope(&signers).await;
        let dup = envelope.signatures[0].clone();
        envelope.push_signature(dup);

        let other = SignerType::create(KeyType::ED25519).unwrap();
        let mut verifiers = verifiers_for(&signers);
        verifiers.extend(verifiers_for(std::slice::from_ref(&other)));
        let verifier = ThresholdVerifier::new(verifiers, 2).unwrap();

        let err = verifier
            .verify(&Context::new(), &envelope)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 2"), "{err}");
    }

    #[tokio::test]
    async fn unidentified_signature_is_tried_against_all_verifiers() {
        let signers = signers(2);
        let mut envelope = signed_envelope(&signers).await;
        envelope.signatures[1].keyid.clear();

        let verifier = ThresholdVerifier::new(verifiers_for(&signers), 2).unwrap();
        let accepted = verifier.verify(&Context::new(), &envelope).await.unwrap();
        assert_eq!(accepted.len(), 2);
    }

    #[tokio::test]
    async fn malformed_unidentified_signature_does_not_stop_p256_verifier() {
        let signer = SignerType::create(KeyType::SECP256R1).unwrap();
        let mut envelope = Envelope::new(PayloadType::from("t"), b"p".to_vec());
        envelope.push_signature(Signature::new(String::new(), vec![1, 2, 3]));
        envelope.push_signature(Signature::new(String::new(), vec![0x30; 72]));
        let sig = signer.sign(&Context::new(), &envelope.pae()).await.unwrap();
        envelope.push_signature(Signature::new(String::new(), sig));

        let verifier = ThresholdVerifier::new(verifiers_for(&[signer.clone()]), 1).unwrap();
        let accepted = verifier.verify(&Context::new(), &envelope).await.unwrap();
        assert_eq!(accepted, vec![signer.did().to_owned()]);

        envelope.signatures.pop();
        let err = verifier
            .verify(&Context::new(), &envelope)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("0 of 1"), "{err}");
    }

    #[test]
    fn same_identity_with_different_issuers_is_allowed() {
        let verifier = |issuer: &str| {
            Arc::new(FulcioVerifier::new("alice@example.com", issuer)) as Arc<dyn Verifier>
        };

        ThresholdVerifier::new(
            vec![
                verifier("https://issuer-a.example.com"),
                verifier("https://issuer-b.example.com"),
            ],
            2,
        )
        .unwrap();

        assert!(matches!(
            ThresholdVerifier::new(
                vec![
                    verifier("https://issuer-a.example.com"),
                    verifier("https://issuer-a.example.com"),
                ],
                1,
            ),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn non_positive_threshold_or_no_verifiers_is_config_error() {
        let signers = signers(1);
        assert!(matches!(
            ThresholdVerifier::new(verifiers_for(&signers), 0),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ThresholdVerifier::new(Vec::new(), 1),
            Err(Error::Config(_))
        ));

        let mut twice = verifiers_for(&signers);
        twice.extend(verifiers_for(&signers));
        assert!(matches!(
            ThresholdVerifier::new(twice, 1),
            Err(Error::Config(_))
        ));
    }

    /// Accepts a fixed set of signature blobs.
    struct ListVerifier {
        keyid: String,
        accepts: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl Verifier for ListVerifier {
        async fn verify(
            &self,
            ctx: &Context,
            _keyid: &str,
            _data: &[u8],
            sig: &[u8],
            _extension: Option<&Extension>,
        ) -> Result<(), CapabilityError> {
            ctx.check()?;
            if self.accepts.iter().any(|a| a == sig) {
                Ok(())
            } else {
                Err(anyhow!("not accepted").into())
            }
        }

        fn key_id(&self) -> String {
            self.keyid.clone()
        }
    }

    #[tokio::test]
    async fn credit_does_not_depend_on_order() {
        // sig "a" satisfies both verifiers, sig "b" only the first.
        let mut envelope = Envelope::new(PayloadType::from("t"), b"p".to_vec());
        envelope.push_signature(Signature::new(String::new(), b"a".to_vec()));
        envelope.push_signature(Signature::new(String::new(), b"b".to_vec()));

        let wide: Arc<dyn Verifier> = Arc::new(ListVerifier {
            keyid: "wide".to_owned(),
            accepts: vec![b"a".to_vec(), b"b".to_vec()],
        });
        let narrow: Arc<dyn Verifier> = Arc::new(ListVerifier {
            keyid: "narrow".to_owned(),
            accepts: vec![b"a".to_vec()],
        });

        for verifiers in [
            vec![wide.clone(), narrow.clone()],
            vec![narrow.clone(), wide.clone()],
        ] {
            let verifier = ThresholdVerifier::new(verifiers, 2).unwrap();
            let accepted = verifier.verify(&Context::new(), &envelope).await.unwrap();
            assert_eq!(accepted.len(), 2);
        }

        let mut reversed = envelope.clone();
        reversed.signatures.reverse();
        let verifier = ThresholdVerifier::new(vec![wide, narrow], 2).unwrap();
        let accepted = verifier.verify(&Context::new(), &reversed).await.unwrap();
        assert_eq!(accepted.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_is_not_reported_as_threshold_failure() {
        let signers = signers(1);
        let envelope = signed_envelope(&signers).await;
        let verifier = ThresholdVerifier::new(verifiers_for(&signers), 1).unwrap();
        let ctx = Context::new();
        ctx.cancel();

        let err = verifier.verify(&ctx, &envelope).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::Interrupted(CapabilityError::Cancelled))
        ));
    }
}
