use std::collections::BTreeMap as Map;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jws::Header;
use crate::jwt::JWTClaims;
use crate::vc::VCDateTime;

/// Linked data proof embedded in a credential or presentation.
///
/// <https://w3c-ccg.github.io/ld-proofs/>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "@context")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<VCDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl Proof {
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            ..Default::default()
        }
    }

    /// Proof options: the proof with its signature value removed.
    pub fn without_signature(&self) -> Self {
        Self {
            jws: None,
            proof_value: None,
            ..self.clone()
        }
    }
}

/// Compact JWS wrapping a document, split into the parts needed to verify
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct JwsEnvelope {
    pub header: Header,
    pub claims: JWTClaims,
    /// `base64url(header) "." base64url(payload)` as received.
    pub signing_input: Vec<u8>,
    pub signature: Vec<u8>,
}

impl JwsEnvelope {
    pub fn key_id(&self) -> &str {
        self.header.key_id.as_deref().unwrap_or("")
    }

    pub fn is_unsecured(&self) -> bool {
        self.header.algorithm == crate::jwk::Algorithm::None
    }
}

/// Outer security layer a document was received with.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofEnvelope {
    /// Plain JSON without proofs.
    None,
    /// Compact JWT. The document may still carry its own linked data proofs.
    JWS(Box<JwsEnvelope>),
    /// JSON-LD with one or more embedded proofs.
    LinkedData(Vec<Proof>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proof_keeps_unknown_properties() {
        let value = json!({
            "type": "Ed25519Signature2018",
            "created": "2010-01-01T19:23:24Z",
            "proofPurpose": "assertionMethod",
            "verificationMethod": "did:example:123456#key1",
            "jws": "eyJhbGciOiJFZERTQSIsImI2NCI6ZmFsc2UsImNyaXQiOlsiYjY0Il19..c2ln",
            "expires": "2030-01-01T00:00:00Z"
        });
        let proof: Proof = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(proof.property_set.len(), 1);
        assert_eq!(serde_json::to_value(&proof).unwrap(), value);
        let options = proof.without_signature();
        assert!(options.jws.is_none());
        assert_eq!(options.verification_method, proof.verification_method);
    }

    #[test]
    fn type_only_proof() {
        let proof: Proof = serde_json::from_str(r#"{"type": "RsaSignature2018"}"#).unwrap();
        assert_eq!(proof, Proof::new("RsaSignature2018"));
    }
}
