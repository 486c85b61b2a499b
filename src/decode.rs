//! Format detection and decoding of credentials and presentations.
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::fetcher::PublicKeyFetcher;
use crate::jsonld::{Canonicalizer, DocumentLoader, JcsCanonicalizer};
use crate::jws;
use crate::jwt::{self, normalize_numbers};
use crate::ldp::{LinkedDataDocument, ProofVerifier, SuiteSet};
use crate::presentation::{Presentation, VERIFIABLE_PRESENTATION_TYPE};
use crate::proof::{JwsEnvelope, Proof, ProofEnvelope};
use crate::vc::Credential;
use crate::verify::{verify, verify_credentials};

/// Options for [`decode`] and [`verify`].
#[derive(Clone)]
pub struct DecodeOptions {
    /// Skip every signature check. Unsecured documents are then accepted.
    pub disable_proof_check: bool,
    /// Apply strict structural validation after decoding.
    pub strict: bool,
    pub document_loader: Option<Arc<dyn DocumentLoader>>,
    pub canonicalizer: Arc<dyn Canonicalizer>,
    pub suites: SuiteSet,
    pub public_key_fetcher: Option<Arc<dyn PublicKeyFetcher>>,
    /// Options for credentials embedded in a presentation. When unset, the
    /// presentation's own options are used.
    pub credential_options: Option<Box<DecodeOptions>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            disable_proof_check: false,
            strict: false,
            document_loader: None,
            canonicalizer: Arc::new(JcsCanonicalizer),
            suites: SuiteSet::default(),
            public_key_fetcher: None,
            credential_options: None,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("disable_proof_check", &self.disable_proof_check)
            .field("strict", &self.strict)
            .field("document_loader", &self.document_loader.is_some())
            .field("suites", &self.suites)
            .field("public_key_fetcher", &self.public_key_fetcher.is_some())
            .field("credential_options", &self.credential_options)
            .finish()
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disabled_proof_check(mut self) -> Self {
        self.disable_proof_check = true;
        self
    }

    pub fn with_strict_validation(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_document_loader<L: DocumentLoader + 'static>(mut self, loader: L) -> Self {
        self.document_loader = Some(Arc::new(loader));
        self
    }

    pub fn with_canonicalizer<C: Canonicalizer + 'static>(mut self, canonicalizer: C) -> Self {
        self.canonicalizer = Arc::new(canonicalizer);
        self
    }

    pub fn with_suites(mut self, suites: SuiteSet) -> Self {
        self.suites = suites;
        self
    }

    pub fn with_public_key_fetcher<F: PublicKeyFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.public_key_fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Use `options` for credentials embedded in a presentation. Their proof
    /// check follows `options` even when the presentation's own check is
    /// disabled.
    pub fn with_credential_options(mut self, options: DecodeOptions) -> Self {
        self.credential_options = Some(Box::new(options));
        self
    }

    /// Options applying to credentials embedded in a presentation.
    pub fn for_credentials(&self) -> &DecodeOptions {
        self.credential_options.as_deref().unwrap_or(self)
    }

    pub(crate) fn proof_verifier(&self) -> ProofVerifier<'_> {
        ProofVerifier {
            suites: &self.suites,
            fetcher: self.public_key_fetcher.as_deref(),
            loader: self.document_loader.as_deref(),
            canonicalizer: self.canonicalizer.as_ref(),
        }
    }
}

/// Encoding a document was received in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Plain JSON-LD, with or without embedded proofs.
    JsonLd,
    /// Compact JWT.
    Jwt,
    /// Compact JWT whose embedded document carries its own proofs.
    JwtWithLinkedDataProof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Credential(Credential),
    Presentation(Presentation),
}

impl Document {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::Presentation(_) => "presentation",
        }
    }

    /// Issuer of a credential, holder of a presentation.
    pub fn signer_id(&self) -> Option<&str> {
        match self {
            Self::Credential(vc) => vc.issuer_id(),
            Self::Presentation(vp) => vp.holder.as_deref(),
        }
    }

    pub fn proofs(&self) -> Vec<&Proof> {
        match self {
            Self::Credential(vc) => vc.proofs().collect(),
            Self::Presentation(vp) => vp.proofs().collect(),
        }
    }

    pub fn as_linked_data(&self) -> &dyn LinkedDataDocument {
        match self {
            Self::Credential(vc) => vc as &dyn LinkedDataDocument,
            Self::Presentation(vp) => vp,
        }
    }

    pub fn validate(&self, strict: bool) -> Result<(), Error> {
        match self {
            Self::Credential(vc) => vc.validate(strict),
            Self::Presentation(vp) => vp.validate(strict),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDocument {
    pub document: Document,
    pub format: Format,
    pub envelope: ProofEnvelope,
}

impl DecodedDocument {
    /// Neither a signed JWT nor any embedded proof.
    pub fn is_unsecured(&self) -> bool {
        match &self.envelope {
            ProofEnvelope::None => true,
            ProofEnvelope::JWS(jws) => jws.is_unsecured() && self.document.proofs().is_empty(),
            ProofEnvelope::LinkedData(proofs) => proofs.is_empty(),
        }
    }
}

/// Classify `data` without decoding it.
pub fn detect_format(data: &[u8]) -> Result<Format, Error> {
    let text = std::str::from_utf8(data)?.trim();
    if jws::is_compact_jws(text) {
        Ok(Format::Jwt)
    } else {
        Ok(Format::JsonLd)
    }
}

/// Decode a credential or presentation in any supported encoding and verify
/// every signature on it, unless `options` disable proof checking.
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<DecodedDocument, Error> {
    let text = std::str::from_utf8(data)?.trim();
    let decoded = if jws::is_compact_jws(text) {
        decode_jwt(text)?
    } else {
        decode_json(text)?
    };
    log::debug!(
        "decoded {} as {:?}",
        decoded.document.kind(),
        decoded.format
    );
    if options.strict {
        decoded.document.validate(true)?;
    }
    if options.disable_proof_check {
        if decoded.is_unsecured() {
            log::warn!(
                "accepting unsecured {}: proof check disabled",
                decoded.document.kind()
            );
        }
        if let Document::Presentation(vp) = &decoded.document {
            let credential_options = options.for_credentials();
            if !credential_options.disable_proof_check {
                verify_credentials(vp, credential_options)?;
            }
        }
    } else {
        verify(&decoded.document, &decoded.envelope, options)?;
    }
    Ok(decoded)
}

fn decode_jwt(jwt: &str) -> Result<DecodedDocument, Error> {
    let jwt::DecodedJWT { jws, claims } = jwt::decode_unverified(jwt)?;
    let document = if claims.verifiable_presentation.is_some() {
        Document::Presentation(Presentation::from_jwt_claims(claims.clone())?)
    } else if claims.verifiable_credential.is_some() {
        Document::Credential(Credential::from_jwt_claims(claims.clone())?)
    } else {
        return Err(Error::MissingField("vc"));
    };
    let format = if document.proofs().is_empty() {
        Format::Jwt
    } else {
        Format::JwtWithLinkedDataProof
    };
    let envelope = ProofEnvelope::JWS(Box::new(JwsEnvelope {
        header: jws.header,
        claims,
        signing_input: jws.signing_input,
        signature: jws.signature,
    }));
    Ok(DecodedDocument {
        document,
        format,
        envelope,
    })
}

fn is_presentation(object: &serde_json::Map<String, Value>) -> bool {
    if object.contains_key("verifiableCredential") {
        return true;
    }
    match object.get("type") {
        Some(Value::String(type_)) => type_ == VERIFIABLE_PRESENTATION_TYPE,
        Some(Value::Array(types)) => types
            .iter()
            .any(|type_| type_.as_str() == Some(VERIFIABLE_PRESENTATION_TYPE)),
        _ => false,
    }
}

fn decode_json(text: &str) -> Result<DecodedDocument, Error> {
    let mut value: Value = serde_json::from_str(text)?;
    normalize_numbers(&mut value);
    let object = value.as_object().ok_or(Error::ExpectedObject)?;
    let document = if is_presentation(object) {
        Document::Presentation(Presentation::from_json_value(value)?)
    } else {
        Document::Credential(Credential::from_json_value(value)?)
    };
    let proofs: Vec<Proof> = document.proofs().into_iter().cloned().collect();
    let envelope = if proofs.is_empty() {
        ProofEnvelope::None
    } else {
        ProofEnvelope::LinkedData(proofs)
    };
    Ok(DecodedDocument {
        document,
        format: Format::JsonLd,
        envelope,
    })
}

/// Decode and verify a credential.
pub fn parse_credential(data: &[u8], options: &DecodeOptions) -> Result<Credential, Error> {
    match decode(data, options)?.document {
        Document::Credential(vc) => Ok(vc),
        Document::Presentation(_) => Err(Error::UnexpectedDocument {
            expected: "credential",
            found: "presentation",
        }),
    }
}

/// Decode and verify a presentation, including its embedded credentials.
pub fn parse_presentation(data: &[u8], options: &DecodeOptions) -> Result<Presentation, Error> {
    match decode(data, options)?.document {
        Document::Presentation(vp) => Ok(vp),
        Document::Credential(_) => Err(Error::UnexpectedDocument {
            expected: "presentation",
            found: "credential",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::jwt::JWTClaims;
    use serde_json::json;

    fn credential_json() -> Value {
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": "http://example.edu/credentials/1872",
            "type": ["VerifiableCredential"],
            "issuer": "did:example:76e12ec712ebc6f1c221ebfeb1f",
            "issuanceDate": "2010-01-01T19:23:24Z",
            "credentialSubject": {"id": "did:example:ebfeb1f712ebc6f1c276e12ec21"},
            "referenceNumber": 8.3294847e+07
        })
    }

    #[test]
    fn credential_options_checked_under_unchecked_presentation() {
        let vc_jwt = Credential::from_json_value(credential_json())
            .unwrap()
            .jwt_claims(false)
            .unwrap()
            .marshal_unsecured_jwt()
            .unwrap();
        let vp = Presentation::new()
            .with_jwt_credential(vc_jwt)
            .to_json_bytes()
            .unwrap();

        let unchecked = DecodeOptions::new().with_disabled_proof_check();
        parse_presentation(&vp, &unchecked).unwrap();

        let checked = unchecked.with_credential_options(DecodeOptions::new());
        let err = parse_presentation(&vp, &checked).unwrap_err();
        assert!(matches!(err, Error::MissingProof));
    }

    #[test]
    fn detect() {
        assert_eq!(
            detect_format(b"  eyJhbGciOiJub25lIn0.eyJ2YyI6e319.\n").unwrap(),
            Format::Jwt
        );
        assert_eq!(detect_format(b"{\"a\": \"b.c.d\"}").unwrap(), Format::JsonLd);
        detect_format(&[0xff, 0xfe]).unwrap_err();
    }

    #[test]
    fn unsecured_json_requires_disabled_check() {
        let data = serde_json::to_vec(&credential_json()).unwrap();
        let err = decode(&data, &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

        let decoded = decode(&data, &DecodeOptions::new().with_disabled_proof_check()).unwrap();
        assert_eq!(decoded.format, Format::JsonLd);
        assert_eq!(decoded.envelope, ProofEnvelope::None);
        match decoded.document {
            Document::Credential(vc) => {
                assert_eq!(vc.extension_fields["referenceNumber"], json!(83294847))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unsecured_jwt() {
        let vc = Credential::from_json(&credential_json().to_string()).unwrap();
        let jwt = vc.jwt_claims(true).unwrap().marshal_unsecured_jwt().unwrap();
        assert!(jwt.ends_with('.'));
        let err = parse_credential(jwt.as_bytes(), &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingProof));

        let options = DecodeOptions::new().with_disabled_proof_check();
        let decoded = decode(jwt.as_bytes(), &options).unwrap();
        assert_eq!(decoded.format, Format::Jwt);
        assert!(decoded.is_unsecured());
        assert_eq!(decoded.document, Document::Credential(vc));
    }

    #[test]
    fn wrong_document_kind() {
        let data = serde_json::to_vec(&credential_json()).unwrap();
        let options = DecodeOptions::new().with_disabled_proof_check();
        let err = parse_presentation(&data, &options).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedDocument {
                expected: "presentation",
                found: "credential"
            }
        ));
    }

    #[test]
    fn presentation_detected_by_type() {
        let data = br#"{
            "@context": "https://www.w3.org/2018/credentials/v1",
            "type": ["VerifiablePresentation", "CredentialManagerPresentation"],
            "holder": "did:example:ebfeb1f712ebc6f1c276e12ec21"
        }"#;
        let options = DecodeOptions::new().with_disabled_proof_check();
        let vp = parse_presentation(data, &options).unwrap();
        assert!(vp.verifiable_credential.is_empty());
    }

    #[test]
    fn strict_validation() {
        let mut value = credential_json();
        value.as_object_mut().unwrap().remove("issuanceDate");
        let data = serde_json::to_vec(&value).unwrap();
        let options = DecodeOptions::new().with_disabled_proof_check();
        decode(&data, &options).unwrap();
        let err = decode(&data, &options.with_strict_validation()).unwrap_err();
        assert!(matches!(err, Error::MissingField("issuanceDate")));
    }

    #[test]
    fn jwt_without_document() {
        let claims = JWTClaims {
            issuer: Some("did:example:issuer".to_string()),
            ..Default::default()
        };
        let jwt = claims.marshal_unsecured_jwt().unwrap();
        let options = DecodeOptions::new().with_disabled_proof_check();
        let err = decode(jwt.as_bytes(), &options).unwrap_err();
        assert!(matches!(err, Error::MissingField("vc")));
    }

    #[test]
    fn malformed_input() {
        let options = DecodeOptions::new().with_disabled_proof_check();
        for data in [
            &b"{"[..],
            &b"[]"[..],
            &b"eyJhbGciOiJ.eyJ2YyI6e319.sig"[..],
        ] {
            let err = decode(data, &options).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{:?}", err);
        }
    }
}
