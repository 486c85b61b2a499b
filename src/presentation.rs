use std::collections::BTreeMap as Map;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::decode::{parse_credential, DecodeOptions};
use crate::error::Error;
use crate::jwk::Algorithm;
use crate::jwt::{normalize_numbers, JWTClaims};
use crate::ldp::LinkedDataDocument;
use crate::one_or_many::OneOrMany;
use crate::proof::Proof;
use crate::signer::Signer;
use crate::vc::{
    check_extension_fields, check_mandatory_fields, reconcile, Contexts, Credential,
};

// ********************************************
// * Data Structures for Verifiable Presentations
// * https://www.w3.org/TR/vc-data-model/#presentations-0
// ********************************************

pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

const PRESENTATION_FIELDS: &[&str] = &[
    "@context",
    "id",
    "type",
    "verifiableCredential",
    "holder",
    "proof",
];

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(rename = "@context")]
    pub context: Contexts,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: OneOrMany<String>,
    /// Credentials in the encoding they were added or received in. A single
    /// credential object read from JSON stays a single object.
    #[serde(default)]
    pub verifiable_credential: OneOrMany<CredentialOrJWT>,
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default)]
    pub proof: Option<OneOrMany<Proof>>,
    #[serde(flatten)]
    pub extension_fields: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresentationView<'a> {
    #[serde(rename = "@context")]
    context: &'a Contexts,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: &'a Option<String>,
    #[serde(rename = "type")]
    type_: &'a OneOrMany<String>,
    #[serde(skip_serializing_if = "OneOrMany::is_empty")]
    verifiable_credential: &'a OneOrMany<CredentialOrJWT>,
    #[serde(skip_serializing_if = "Option::is_none")]
    holder: &'a Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proof: &'a Option<OneOrMany<Proof>>,
    #[serde(flatten)]
    extension_fields: &'a Map<String, Value>,
}

impl Serialize for Presentation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        check_extension_fields(&self.extension_fields, PRESENTATION_FIELDS)
            .map_err(serde::ser::Error::custom)?;
        PresentationView {
            context: &self.context,
            id: &self.id,
            type_: &self.type_,
            verifiable_credential: &self.verifiable_credential,
            holder: &self.holder,
            proof: &self.proof,
            extension_fields: &self.extension_fields,
        }
        .serialize(serializer)
    }
}

/// A credential held by a presentation: either an inline JSON-LD
/// credential or a compact JWT kept as received.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum CredentialOrJWT {
    Credential(Box<Credential>),
    JWT(String),
}

impl CredentialOrJWT {
    pub fn from_json_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(jwt) => Ok(Self::JWT(jwt)),
            value @ Value::Object(_) => Ok(Self::Credential(Box::new(
                Credential::from_json_value(value)?,
            ))),
            _ => Err(Error::InvalidField {
                field: "verifiableCredential",
                reason: "expected a credential object or a JWT string".to_string(),
            }),
        }
    }

    /// Decode the credential. A JWT is parsed, and verified unless `options`
    /// disable proof checking, on every call.
    pub fn materialize(&self, options: &DecodeOptions) -> Result<Credential, Error> {
        match self {
            Self::Credential(vc) => Ok((**vc).clone()),
            Self::JWT(jwt) => parse_credential(jwt.as_bytes(), options),
        }
    }

    pub fn is_jwt(&self) -> bool {
        matches!(self, Self::JWT(_))
    }
}

impl<'de> Deserialize<'de> for CredentialOrJWT {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<Credential> for CredentialOrJWT {
    fn from(vc: Credential) -> Self {
        Self::Credential(Box::new(vc))
    }
}

/// How [`Presentation::jwt_claims_with`] carries inline credentials.
#[derive(Clone, Copy)]
pub enum CredentialProjection<'a> {
    /// Inline credentials stay JSON-LD objects.
    Keep,
    /// Each inline credential becomes an unsecured JWT of its own claims.
    Unsecured,
    /// Each inline credential becomes a JWT of its own claims signed by
    /// `signer`.
    Signed {
        algorithm: Algorithm,
        signer: &'a dyn Signer,
        key_id: &'a str,
    },
}

impl CredentialProjection<'_> {
    fn project(&self, credential: &CredentialOrJWT, minimal: bool) -> Result<CredentialOrJWT, Error> {
        let vc = match (self, credential) {
            (Self::Keep, _) | (_, CredentialOrJWT::JWT(_)) => return Ok(credential.clone()),
            (_, CredentialOrJWT::Credential(vc)) => vc,
        };
        let claims = vc.jwt_claims(minimal)?;
        let jwt = match *self {
            Self::Signed {
                algorithm,
                signer,
                key_id,
            } => claims.marshal_jws(algorithm, signer, key_id)?,
            _ => claims.marshal_unsecured_jwt()?,
        };
        Ok(CredentialOrJWT::JWT(jwt))
    }
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            context: Contexts::default(),
            id: None,
            type_: OneOrMany::One(VERIFIABLE_PRESENTATION_TYPE.to_string()),
            verifiable_credential: OneOrMany::default(),
            holder: None,
            proof: None,
            extension_fields: Map::new(),
        }
    }
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, vc: Credential) -> Self {
        self.add_credential(vc);
        self
    }

    pub fn with_jwt_credential(mut self, jwt: impl Into<String>) -> Self {
        self.add_jwt_credential(jwt);
        self
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    pub fn add_credential(&mut self, vc: Credential) {
        self.verifiable_credential.push(vc.into());
    }

    pub fn add_jwt_credential(&mut self, jwt: impl Into<String>) {
        self.verifiable_credential
            .push(CredentialOrJWT::JWT(jwt.into()));
    }

    /// Parse an unsecured JSON presentation. Proofs, if any, are not checked.
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let mut value: Value = serde_json::from_str(s)?;
        normalize_numbers(&mut value);
        Self::from_json_value(value)
    }

    pub fn from_json_value(mut value: Value) -> Result<Self, Error> {
        check_mandatory_fields(&value)?;
        // Embedded credentials are parsed separately to keep their errors.
        let credentials = value
            .as_object_mut()
            .and_then(|object| object.remove("verifiableCredential"));
        let mut vp: Self = serde_json::from_value(value)?;
        vp.verifiable_credential = match credentials {
            None => OneOrMany::default(),
            Some(Value::Array(credentials)) => OneOrMany::Many(
                credentials
                    .into_iter()
                    .map(CredentialOrJWT::from_json_value)
                    .collect::<Result<_, _>>()?,
            ),
            Some(credential) => OneOrMany::One(CredentialOrJWT::from_json_value(credential)?),
        };
        vp.validate(false)?;
        Ok(vp)
    }

    pub fn to_json_value(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }

    /// JSON encoding with object keys in sorted order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.to_json_value()?)?)
    }

    /// The base type is always required; `strict` also checks every inline
    /// credential strictly.
    pub fn validate(&self, strict: bool) -> Result<(), Error> {
        if !self
            .type_
            .contains(&VERIFIABLE_PRESENTATION_TYPE.to_string())
        {
            return Err(Error::MissingType(VERIFIABLE_PRESENTATION_TYPE));
        }
        check_extension_fields(&self.extension_fields, PRESENTATION_FIELDS)?;
        if strict {
            for credential in &self.verifiable_credential {
                if let CredentialOrJWT::Credential(vc) = credential {
                    vc.validate(true)?;
                }
            }
        }
        Ok(())
    }

    /// Decode every held credential with `options`.
    pub fn credentials(&self, options: &DecodeOptions) -> Result<Vec<Credential>, Error> {
        self.verifiable_credential
            .iter()
            .map(|credential| credential.materialize(options))
            .collect()
    }

    /// Held credentials as bytes: JSON for inline credentials, the raw token
    /// for JWTs.
    pub fn marshalled_credentials(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.verifiable_credential
            .iter()
            .map(|credential| match credential {
                CredentialOrJWT::Credential(vc) => vc.to_json_bytes(),
                CredentialOrJWT::JWT(jwt) => Ok(jwt.as_bytes().to_vec()),
            })
            .collect()
    }

    pub fn proofs(&self) -> impl Iterator<Item = &Proof> {
        self.proof.iter().flat_map(|proofs| proofs.iter())
    }

    pub fn add_proof(&mut self, proof: Proof) {
        self.proof = match self.proof.take() {
            None => Some(OneOrMany::One(proof)),
            Some(mut proofs) => {
                proofs.push(proof);
                Some(proofs)
            }
        }
    }

    /// Project the presentation into JWT claims addressed to `audience`.
    ///
    /// With `minimal`, `id` and `holder` are carried only by `jti` and `iss`,
    /// and a type list holding only the base type becomes a string. The
    /// context is always written as an array. Credentials keep their
    /// current encoding.
    pub fn jwt_claims(&self, audience: &[String], minimal: bool) -> Result<JWTClaims, Error> {
        self.jwt_claims_with(audience, minimal, CredentialProjection::Keep)
    }

    /// Like [`Presentation::jwt_claims`], with inline credentials first
    /// projected to their own JWT claims form as `projection` says. Held
    /// JWTs are carried unchanged.
    pub fn jwt_claims_with(
        &self,
        audience: &[String],
        minimal: bool,
        projection: CredentialProjection<'_>,
    ) -> Result<JWTClaims, Error> {
        let mut vp = self.clone();
        vp.context = Contexts::Many(self.context.iter().cloned().collect());
        vp.verifiable_credential = match &self.verifiable_credential {
            OneOrMany::One(credential) => OneOrMany::One(projection.project(credential, minimal)?),
            OneOrMany::Many(credentials) => OneOrMany::Many(
                credentials
                    .iter()
                    .map(|credential| projection.project(credential, minimal))
                    .collect::<Result<_, _>>()?,
            ),
        };
        if minimal {
            vp.id = None;
            vp.holder = None;
            if let OneOrMany::Many(types) = &vp.type_ {
                if let [only] = types.as_slice() {
                    if only == VERIFIABLE_PRESENTATION_TYPE {
                        vp.type_ = OneOrMany::One(only.clone());
                    }
                }
            }
        }
        let audience = match audience {
            [] => None,
            [one] => Some(OneOrMany::One(one.clone())),
            many => Some(OneOrMany::Many(many.to_vec())),
        };
        Ok(JWTClaims {
            issuer: self.holder.clone(),
            jwt_id: self.id.clone(),
            audience,
            verifiable_presentation: Some(vp.to_json_value()?),
            ..Default::default()
        })
    }

    /// Rebuild a presentation from JWT claims, reconciling `jti` with `id`
    /// and `iss` with `holder`.
    pub fn from_jwt_claims(claims: JWTClaims) -> Result<Self, Error> {
        let vp = claims
            .verifiable_presentation
            .ok_or(Error::MissingField("vp"))?;
        let mut vp = Self::from_json_value(vp)?;
        if let Some(jti) = claims.jwt_id {
            reconcile("jti", "id", &jti, vp.id.as_deref())?;
            vp.id = Some(jti);
        }
        if let Some(iss) = claims.issuer {
            reconcile("iss", "holder", &iss, vp.holder.as_deref())?;
            vp.holder = Some(iss);
        }
        Ok(vp)
    }
}

impl LinkedDataDocument for Presentation {
    fn contexts(&self) -> &Contexts {
        &self.context
    }

    fn to_value_for_signing(&self) -> Result<Value, Error> {
        let mut value = self.to_json_value()?;
        if let Value::Object(ref mut object) = value {
            object.remove("proof");
        }
        Ok(value)
    }

    fn add_proof(&mut self, proof: Proof) {
        Presentation::add_proof(self, proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const JWT_CREDENTIAL: &str = "eyJhbGciOiJub25lIn0.eyJ2YyI6e319.";

    fn credential() -> Credential {
        Credential::from_json_value(json!({
            "@context": "https://www.w3.org/2018/credentials/v1",
            "id": "http://example.edu/credentials/58473",
            "type": "VerifiableCredential",
            "issuer": "https://example.edu/issuers/14",
            "issuanceDate": "2010-01-01T19:23:24Z",
            "credentialSubject": {"id": "did:example:ebfeb1f712ebc6f1c276e12ec21"}
        }))
        .unwrap()
    }

    #[test]
    fn composition_keeps_order_and_encoding() {
        let vp = Presentation::new()
            .with_credential(credential())
            .with_jwt_credential(JWT_CREDENTIAL)
            .with_holder("did:example:ebfeb1f712ebc6f1c276e12ec21");
        let value = vp.to_json_value().unwrap();
        assert_eq!(value["type"], json!("VerifiablePresentation"));
        assert_eq!(value["verifiableCredential"][0]["id"], json!("http://example.edu/credentials/58473"));
        assert_eq!(value["verifiableCredential"][1], json!(JWT_CREDENTIAL));

        let parsed = Presentation::from_json_value(value).unwrap();
        assert_eq!(parsed, vp);
        assert!(parsed.verifiable_credential.iter().nth(1).unwrap().is_jwt());

        let marshalled = vp.marshalled_credentials().unwrap();
        assert_eq!(marshalled[1], JWT_CREDENTIAL.as_bytes());
        assert_eq!(marshalled[0], credential().to_json_bytes().unwrap());
    }

    #[test]
    fn single_credential_object() {
        let vp = Presentation::from_json_value(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": "VerifiablePresentation",
            "verifiableCredential": credential().to_json_value().unwrap()
        }))
        .unwrap();
        assert!(matches!(vp.verifiable_credential, OneOrMany::One(_)));
        assert!(vp.to_json_value().unwrap()["verifiableCredential"].is_object());

        let vp = Presentation::new().with_credential(credential());
        assert!(vp.to_json_value().unwrap()["verifiableCredential"].is_array());
    }

    #[test]
    fn credentials_projected_to_jwt() {
        let vp = Presentation::new()
            .with_credential(credential())
            .with_jwt_credential(JWT_CREDENTIAL)
            .with_holder("did:example:ebfeb1f712ebc6f1c276e12ec21");

        let kept = vp.jwt_claims(&[], true).unwrap();
        assert!(kept.verifiable_presentation.unwrap()["verifiableCredential"][0].is_object());

        let claims = vp
            .jwt_claims_with(&[], true, CredentialProjection::Unsecured)
            .unwrap();
        let embedded = claims.verifiable_presentation.clone().unwrap();
        assert!(embedded["verifiableCredential"][0].is_string());
        assert_eq!(embedded["verifiableCredential"][1], json!(JWT_CREDENTIAL));

        let parsed = Presentation::from_jwt_claims(claims).unwrap();
        let options = DecodeOptions::new().with_disabled_proof_check();
        let first = parsed.verifiable_credential.first().unwrap();
        assert!(first.is_jwt());
        assert_eq!(first.materialize(&options).unwrap(), credential());
    }

    #[test]
    fn embedded_credential_error_kind() {
        let err = Presentation::from_json_value(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": "VerifiablePresentation",
            "verifiableCredential": [{
                "@context": ["https://www.w3.org/2018/credentials/examples/v1"],
                "type": "VerifiableCredential",
                "credentialSubject": {}
            }]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn missing_presentation_type() {
        let err = Presentation::from_json_value(json!({
            "@context": "https://www.w3.org/2018/credentials/v1",
            "type": "VerifiableCredential"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MissingType(VERIFIABLE_PRESENTATION_TYPE)));
    }

    #[test]
    fn minimal_jwt_claims() {
        let mut vp = Presentation::new().with_holder("did:example:holder");
        vp.id = Some("urn:uuid:1".to_string());
        vp.type_ = OneOrMany::Many(vec![VERIFIABLE_PRESENTATION_TYPE.to_string()]);
        vp.context = Contexts::One(crate::vc::Context::URI(
            crate::vc::DEFAULT_CONTEXT.to_string(),
        ));
        let claims = vp
            .jwt_claims(&["did:example:verifier".to_string()], true)
            .unwrap();
        assert_eq!(claims.issuer.as_deref(), Some("did:example:holder"));
        assert_eq!(claims.jwt_id.as_deref(), Some("urn:uuid:1"));
        assert_eq!(
            claims.audience,
            Some(OneOrMany::One("did:example:verifier".to_string()))
        );
        assert_eq!(
            claims.verifiable_presentation,
            Some(json!({
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": "VerifiablePresentation"
            }))
        );

        let full = vp.jwt_claims(&[], false).unwrap();
        assert!(full.audience.is_none());
        let embedded = full.verifiable_presentation.clone().unwrap();
        assert_eq!(embedded["holder"], json!("did:example:holder"));

        let again = Presentation::from_jwt_claims(claims).unwrap();
        assert_eq!(again.holder, vp.holder);
        assert_eq!(again.id, vp.id);
    }

    #[test]
    fn holder_mismatch() {
        let vp = Presentation::new().with_holder("did:example:holder");
        let mut claims = vp.jwt_claims(&[], false).unwrap();
        claims.issuer = Some("did:example:someone-else".to_string());
        let err = Presentation::from_jwt_claims(claims).unwrap_err();
        assert!(matches!(
            err,
            Error::ClaimMismatch {
                claim: "iss",
                field: "holder",
                ..
            }
        ));
    }

    #[test]
    fn extension_field_collision() {
        let mut vp = Presentation::new();
        vp.extension_fields
            .insert("holder".to_string(), json!("did:example:shadow"));
        assert_eq!(
            vp.to_json_value().unwrap_err().to_string(),
            "Extension field `holder` collides with a named field"
        );
    }
}
