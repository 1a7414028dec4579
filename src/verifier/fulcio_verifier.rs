use anyhow::{anyhow, bail, Context as _, Result};
use async_trait::async_trait;
use p256::ecdsa::{signature::Verifier as _, Signature as EcdsaSignature, VerifyingKey};
use x509_cert::{
    der::{asn1::ObjectIdentifier, Decode},
    ext::pkix::{name::GeneralName, SubjectAltName},
    Certificate,
};

use crate::{
    context::Context,
    dsse::Extension,
    error::CapabilityError,
    sigstore_bundle::{leaf_certificate, SIGSTORE_EXTENSION_KIND},
    verifier::Verifier,
};

const SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
/// Fulcio OIDC issuer, raw string value (deprecated form).
const OIDC_ISSUER_V1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");
/// Fulcio OIDC issuer, DER-encoded UTF8String.
const OIDC_ISSUER_V2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.8");

/// Verifies signatures whose Sigstore verification material names an
/// expected identity and OIDC issuer.
///
/// Only the leaf certificate is checked. Chain building to a Fulcio root and
/// transparency log inclusion are left to whoever manages trust roots.
#[derive(Debug, Clone, PartialEq)]
pub struct FulcioVerifier {
    identity: String,
    issuer: String,
}

impl FulcioVerifier {
    pub fn new(identity: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            issuer: issuer.into(),
        }
    }

    fn verify_with_material(&self, data: &[u8], sig: &[u8], extension: &Extension) -> Result<()> {
        if extension.kind != SIGSTORE_EXTENSION_KIND {
            bail!(
                "signature extension kind '{}' is not Sigstore verification material",
                extension.kind
            );
        }

        let der = leaf_certificate(&extension.ext)?;
        let cert = Certificate::from_der(&der).context("malformed signing certificate")?;
        let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or(&[]);

        let names = subject_alt_names(extensions)?;
        if !names.iter().any(|n| n == &self.identity) {
            bail!(
                "certificate identities {names:?} do not include '{}'",
                self.identity
            );
        }

        let issuer = oidc_issuer(extensions)?;
        if issuer != self.issuer {
            bail!(
                "certificate issuer '{issuer}' does not match '{}'",
                self.issuer
            );
        }

        let point = cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| anyhow!("certificate public key is not byte-aligned"))?;
        let key = VerifyingKey::from_sec1_bytes(point)
            .map_err(|e| anyhow!("certificate does not carry a P-256 key: {e}"))?;

        let signature = EcdsaSignature::from_der(sig)
            .or_else(|_| EcdsaSignature::from_slice(sig))
            .map_err(|e| anyhow!("malformed ECDSA signature: {e}"))?;

        key.verify(data, &signature)
            .map_err(|_| anyhow!("signature does not verify against certificate for '{}'", self.identity))
    }
}

fn subject_alt_names(extensions: &[x509_cert::ext::Extension]) -> Result<Vec<String>> {
    let Some(ext) = extensions.iter().find(|e| e.extn_id == SUBJECT_ALT_NAME) else {
        bail!("certificate has no subject alternative name");
    };

    let san = SubjectAltName::from_der(ext.extn_value.as_bytes())
        .context("malformed subject alternative name")?;

    let names = san
        .0
        .iter()
        .filter_map(|name| match name {
            GeneralName::Rfc822Name(s)
            | GeneralName::UniformResourceIdentifier(s)
            | GeneralName::DnsName(s) => Some(s.to_string()),
            _ => None,
        })
        .collect();
    Ok(names)
}

fn oidc_issuer(extensions: &[x509_cert::ext::Extension]) -> Result<String> {
    if let Some(ext) = extensions.iter().find(|e| e.extn_id == OIDC_ISSUER_V2) {
        return String::from_der(ext.extn_value.as_bytes()).context("malformed OIDC issuer");
    }
    if let Some(ext) = extensions.iter().find(|e| e.extn_id == OIDC_ISSUER_V1) {
        return String::from_utf8(ext.extn_value.as_bytes().to_vec())
            .context("malformed OIDC issuer");
    }
    bail!("certificate has no OIDC issuer extension")
}

#[async_trait]
impl Verifier for FulcioVerifier {
    async fn verify(
        &self,
        ctx: &Context,
        _keyid: &str,
        data: &[u8],
        sig: &[u8],
        extension: Option<&Extension>,
    ) -> Result<(), CapabilityError> {
        ctx.check()?;

        let extension = extension
            .ok_or_else(|| anyhow!("signature carries no Sigstore verification material"))?;
        self.verify_with_material(data, sig, extension)?;

        log::warn!(
            "Accepted certificate for {} without checking its chain or transparency log entry",
            self.identity
        );
        Ok(())
    }

    fn key_id(&self) -> String {
        self.identity.clone()
    }

    fn identity(&self) -> String {
        format!("fulcio:{}::{}", self.identity, self.issuer)
    }
}
