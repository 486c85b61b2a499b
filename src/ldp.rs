//! Linked data proofs: signature suites, proof creation and verification.
use std::fmt;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use derive_builder::Builder;
use serde_json::Value;

use crate::error::Error;
use crate::fetcher::{resolve_jwk, split_verification_method, PublicKeyFetcher};
use crate::hash::sha256;
use crate::jsonld::{
    Canonicalizer, DocumentLoader, JcsCanonicalizer, AT_CONTEXT, ED25519_2020_V1_CONTEXT,
    JWS_2020_V1_CONTEXT,
};
use crate::jwk::{Algorithm, JWK};
use crate::jws;
use crate::proof::Proof;
use crate::signer::Signer;
use crate::vc::{Contexts, VCDateTime};

pub const DEFAULT_PROOF_PURPOSE: &str = "assertionMethod";

/// Document that linked data proofs can be attached to.
pub trait LinkedDataDocument {
    fn contexts(&self) -> &Contexts;

    /// JSON form of the document with its `proof` property removed.
    fn to_value_for_signing(&self) -> Result<Value, Error>;

    fn add_proof(&mut self, proof: Proof);
}

/// How the signature is written into the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureRepresentation {
    /// Detached JWS with unencoded payload in `jws`.
    JWS,
    /// Multibase (base58btc) signature in `proofValue`.
    ProofValue,
}

/// Signature suite for one proof type.
pub trait SignatureSuite: Send + Sync {
    fn proof_type(&self) -> &'static str;

    fn default_representation(&self) -> SignatureRepresentation;

    /// Context the proof must declare when the document does not.
    fn context(&self) -> Option<&'static str> {
        None
    }

    fn check_algorithm(&self, algorithm: Algorithm) -> Result<(), Error>;

    fn sign(&self, data: &[u8], signer: &dyn Signer) -> Result<Vec<u8>, Error> {
        self.check_algorithm(signer.algorithm())?;
        signer.sign(data)
    }

    fn verify(
        &self,
        algorithm: Algorithm,
        data: &[u8],
        signature: &[u8],
        key: &JWK,
    ) -> Result<(), Error> {
        self.check_algorithm(algorithm)?;
        jws::verify_bytes(algorithm, data, key, signature)
    }
}

fn only_eddsa(algorithm: Algorithm) -> Result<(), Error> {
    match algorithm {
        Algorithm::EdDSA => Ok(()),
        _ => Err(Error::UnsupportedAlgorithm(algorithm.to_string())),
    }
}

/// <https://w3c-ccg.github.io/lds-ed25519-2018/>
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signature2018;

impl SignatureSuite for Ed25519Signature2018 {
    fn proof_type(&self) -> &'static str {
        "Ed25519Signature2018"
    }

    fn default_representation(&self) -> SignatureRepresentation {
        SignatureRepresentation::JWS
    }

    fn check_algorithm(&self, algorithm: Algorithm) -> Result<(), Error> {
        only_eddsa(algorithm)
    }
}

/// <https://w3c-ccg.github.io/lds-ed25519-2020/>
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signature2020;

impl SignatureSuite for Ed25519Signature2020 {
    fn proof_type(&self) -> &'static str {
        "Ed25519Signature2020"
    }

    fn default_representation(&self) -> SignatureRepresentation {
        SignatureRepresentation::ProofValue
    }

    fn context(&self) -> Option<&'static str> {
        Some(ED25519_2020_V1_CONTEXT)
    }

    fn check_algorithm(&self, algorithm: Algorithm) -> Result<(), Error> {
        only_eddsa(algorithm)
    }
}

/// <https://w3c-ccg.github.io/lds-jws2020/>
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebSignature2020;

impl SignatureSuite for JsonWebSignature2020 {
    fn proof_type(&self) -> &'static str {
        "JsonWebSignature2020"
    }

    fn default_representation(&self) -> SignatureRepresentation {
        SignatureRepresentation::JWS
    }

    fn context(&self) -> Option<&'static str> {
        Some(JWS_2020_V1_CONTEXT)
    }

    fn check_algorithm(&self, algorithm: Algorithm) -> Result<(), Error> {
        match algorithm {
            Algorithm::EdDSA | Algorithm::ES256 | Algorithm::ES256K => Ok(()),
            _ => Err(Error::UnsupportedAlgorithm(algorithm.to_string())),
        }
    }
}

/// Signature suites usable for verification, looked up by proof type.
#[derive(Clone)]
pub struct SuiteSet(Vec<Arc<dyn SignatureSuite>>);

impl SuiteSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn with<S: SignatureSuite + 'static>(mut self, suite: S) -> Self {
        self.0.push(Arc::new(suite));
        self
    }

    pub fn get(&self, proof_type: &str) -> Option<&dyn SignatureSuite> {
        self.0
            .iter()
            .find(|suite| suite.proof_type() == proof_type)
            .map(|suite| suite.as_ref())
    }

    pub fn proof_types(&self) -> Vec<&'static str> {
        self.0.iter().map(|suite| suite.proof_type()).collect()
    }
}

/// All shipped suites.
impl Default for SuiteSet {
    fn default() -> Self {
        Self::empty()
            .with(Ed25519Signature2018)
            .with(Ed25519Signature2020)
            .with(JsonWebSignature2020)
    }
}

impl fmt::Debug for SuiteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SuiteSet").field(&self.proof_types()).finish()
    }
}

/// Parameters for creating a linked data proof.
#[derive(Builder, Clone)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct LinkedDataProofContext {
    #[builder(setter(custom))]
    pub suite: Arc<dyn SignatureSuite>,
    #[builder(setter(custom))]
    pub signer: Arc<dyn Signer>,
    /// Defaults to the suite's representation.
    #[builder(default)]
    pub signature_representation: Option<SignatureRepresentation>,
    pub verification_method: String,
    /// Defaults to the current time, at second precision.
    #[builder(default)]
    pub created: Option<VCDateTime>,
    /// Defaults to `assertionMethod`.
    #[builder(default)]
    pub purpose: Option<String>,
    #[builder(default)]
    pub challenge: Option<String>,
    #[builder(default)]
    pub domain: Option<String>,
    #[builder(default)]
    pub nonce: Option<String>,
    #[builder(setter(custom), default)]
    pub document_loader: Option<Arc<dyn DocumentLoader>>,
    #[builder(setter(custom), default = "default_canonicalizer()")]
    pub canonicalizer: Arc<dyn Canonicalizer>,
}

fn default_canonicalizer() -> Arc<dyn Canonicalizer> {
    Arc::new(JcsCanonicalizer)
}

impl LinkedDataProofContextBuilder {
    pub fn suite<S: SignatureSuite + 'static>(&mut self, suite: S) -> &mut Self {
        self.suite = Some(Arc::new(suite));
        self
    }

    pub fn signer<S: Signer + 'static>(&mut self, signer: S) -> &mut Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    pub fn document_loader<L: DocumentLoader + 'static>(&mut self, loader: L) -> &mut Self {
        self.document_loader = Some(Some(Arc::new(loader)));
        self
    }

    pub fn canonicalizer<C: Canonicalizer + 'static>(&mut self, canonicalizer: C) -> &mut Self {
        self.canonicalizer = Some(Arc::new(canonicalizer));
        self
    }

    fn validate(&self) -> Result<(), Error> {
        // validate is called before defaults are assigned.
        match &self.verification_method {
            Some(vm) if !vm.is_empty() => {}
            _ => return Err(Error::MissingVerificationMethod),
        }
        if let (Some(suite), Some(signer)) = (&self.suite, &self.signer) {
            suite.check_algorithm(signer.algorithm())?;
        }
        Ok(())
    }
}

impl fmt::Debug for LinkedDataProofContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedDataProofContext")
            .field("suite", &self.suite.proof_type())
            .field("algorithm", &self.signer.algorithm())
            .field("signature_representation", &self.signature_representation)
            .field("verification_method", &self.verification_method)
            .field("created", &self.created)
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

/// Bytes signed by a linked data proof:
/// `sha256(canonical proof options) || sha256(canonical document)`.
///
/// Proof options are the proof without its signature, carrying the
/// document's `@context` unless the proof declares its own.
pub fn signing_input(
    document: &dyn LinkedDataDocument,
    proof: &Proof,
    loader: Option<&dyn DocumentLoader>,
    canonicalizer: &dyn Canonicalizer,
) -> Result<Vec<u8>, Error> {
    let mut options = serde_json::to_value(proof.without_signature())?;
    if proof.context.is_none() {
        if let Value::Object(ref mut object) = options {
            object.insert(
                AT_CONTEXT.to_string(),
                serde_json::to_value(document.contexts())?,
            );
        }
    }
    let options_normalized = canonicalizer.canonicalize(&options, loader)?;
    let doc_normalized = canonicalizer.canonicalize(&document.to_value_for_signing()?, loader)?;
    Ok([sha256(&options_normalized), sha256(&doc_normalized)].concat())
}

// https://w3c-ccg.github.io/ld-proofs/#proof-algorithm
pub fn add_linked_data_proof(
    document: &mut dyn LinkedDataDocument,
    context: &LinkedDataProofContext,
) -> Result<(), Error> {
    let suite = context.suite.as_ref();
    suite.check_algorithm(context.signer.algorithm())?;
    let created = context
        .created
        .unwrap_or_else(|| VCDateTime::from(Utc::now().trunc_subsecs(0)));
    let needs_context = suite
        .context()
        .filter(|uri| !document.contexts().contains_uri(uri));
    let mut proof = Proof {
        context: needs_context.map(|uri| Value::String(uri.to_string())),
        created: Some(created),
        proof_purpose: Some(
            context
                .purpose
                .clone()
                .unwrap_or_else(|| DEFAULT_PROOF_PURPOSE.to_string()),
        ),
        verification_method: Some(context.verification_method.clone()),
        challenge: context.challenge.clone(),
        domain: context.domain.clone(),
        nonce: context.nonce.clone(),
        ..Proof::new(suite.proof_type())
    };
    let data = signing_input(
        &*document,
        &proof,
        context.document_loader.as_deref(),
        context.canonicalizer.as_ref(),
    )?;
    let representation = context
        .signature_representation
        .unwrap_or_else(|| suite.default_representation());
    match representation {
        SignatureRepresentation::JWS => {
            let jws = jws::detached_sign_unencoded_payload(&data, context.signer.as_ref())?;
            proof.jws = Some(jws);
        }
        SignatureRepresentation::ProofValue => {
            let signature = suite.sign(&data, context.signer.as_ref())?;
            proof.proof_value = Some(multibase::encode(multibase::Base::Base58Btc, signature));
        }
    }
    log::debug!(
        "added {} proof for {}",
        proof.type_,
        context.verification_method
    );
    document.add_proof(proof);
    Ok(())
}

/// Capabilities used to check linked data proofs.
#[derive(Clone, Copy)]
pub struct ProofVerifier<'a> {
    pub suites: &'a SuiteSet,
    pub fetcher: Option<&'a dyn PublicKeyFetcher>,
    pub loader: Option<&'a dyn DocumentLoader>,
    pub canonicalizer: &'a dyn Canonicalizer,
}

impl<'a> ProofVerifier<'a> {
    // https://w3c-ccg.github.io/ld-proofs/#proof-verification-algorithm
    pub fn verify(&self, document: &dyn LinkedDataDocument, proof: &Proof) -> Result<(), Error> {
        let suite = self
            .suites
            .get(&proof.type_)
            .ok_or_else(|| Error::UnsupportedProofType(proof.type_.clone()))?;
        let verification_method = proof
            .verification_method
            .as_deref()
            .ok_or(Error::MissingVerificationMethod)?;
        let (issuer_id, key_id) = split_verification_method(verification_method);
        let data = signing_input(document, proof, self.loader, self.canonicalizer)?;
        log::debug!("verifying {} proof by {}", proof.type_, verification_method);
        match (&proof.jws, &proof.proof_value) {
            (Some(jws), _) => {
                let (header_b64, signature_b64) = jws::split_detached_jws(jws)?;
                let jws::DecodedJWS {
                    header,
                    signing_input,
                    payload: _,
                    signature,
                } = jws::decode_jws_parts(header_b64, &data, signature_b64)?;
                if header.base64urlencode_payload != Some(false) {
                    return Err(Error::ExpectedUnencodedHeader);
                }
                // Reject before the key lookup.
                suite.check_algorithm(header.algorithm)?;
                let key = resolve_jwk(self.fetcher, issuer_id, key_id)?;
                suite.verify(header.algorithm, &signing_input, &signature, &key)
            }
            (None, Some(proof_value)) => {
                let (_base, signature) = multibase::decode(proof_value)?;
                let key = resolve_jwk(self.fetcher, issuer_id, key_id)?;
                let algorithm = key
                    .get_algorithm()
                    .ok_or_else(|| Error::UnsupportedAlgorithm("unknown key type".to_string()))?;
                suite.verify(algorithm, &data, &signature, &key)
            }
            (None, None) => Err(Error::MissingProofSignature),
        }
    }

    /// Verify every proof; the first failure is returned.
    pub fn verify_all<'p>(
        &self,
        document: &dyn LinkedDataDocument,
        proofs: impl IntoIterator<Item = &'p Proof>,
    ) -> Result<(), Error> {
        for proof in proofs {
            self.verify(document, proof)?;
        }
        Ok(())
    }
}
