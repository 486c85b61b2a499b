use std::collections::BTreeMap as Map;
use std::convert::{TryFrom, TryInto};
use std::fmt;
use std::str::FromStr;

use chrono::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::Error;
use crate::ldp::LinkedDataDocument;
use crate::jwt::{normalize_numbers, JWTClaims, NumericDate};
use crate::one_or_many::OneOrMany;
use crate::proof::Proof;

// ********************************************
// * Data Structures for Verifiable Credentials
// * W3C Verifiable Credentials Data Model v1.1
// * https://www.w3.org/TR/vc-data-model/
// ********************************************

pub const DEFAULT_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// Keys of a credential object that map to named fields.
const CREDENTIAL_FIELDS: &[&str] = &[
    "@context",
    "id",
    "type",
    "credentialSubject",
    "issuer",
    "issuanceDate",
    "expirationDate",
    "credentialStatus",
    "termsOfUse",
    "evidence",
    "credentialSchema",
    "refreshService",
    "proof",
];

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "@context")]
    pub context: Contexts,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: OneOrMany<String>,
    pub credential_subject: OneOrMany<CredentialSubject>,
    #[serde(default)]
    pub issuer: Option<Issuer>,
    #[serde(default)]
    pub issuance_date: Option<VCDateTime>,
    #[serde(default)]
    pub expiration_date: Option<VCDateTime>,
    #[serde(default)]
    pub credential_status: Option<TypedId>,
    #[serde(default)]
    pub terms_of_use: Option<OneOrMany<TermsOfUse>>,
    #[serde(default)]
    pub evidence: Option<OneOrMany<Evidence>>,
    /// Always emitted as an array once set, even when empty.
    #[serde(default, deserialize_with = "deserialize_schemas")]
    pub credential_schema: Option<Vec<TypedId>>,
    #[serde(default)]
    pub refresh_service: Option<OneOrMany<TypedId>>,
    // This field is populated only when using
    // embedded proofs such as LD-PROOF
    //   https://w3c-ccg.github.io/ld-proofs/
    #[serde(default)]
    pub proof: Option<OneOrMany<Proof>>,
    /// Issuer-defined properties outside the data model.
    #[serde(flatten)]
    pub extension_fields: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialView<'a> {
    #[serde(rename = "@context")]
    context: &'a Contexts,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: &'a Option<String>,
    #[serde(rename = "type")]
    type_: &'a OneOrMany<String>,
    credential_subject: &'a OneOrMany<CredentialSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: &'a Option<Issuer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuance_date: &'a Option<VCDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_date: &'a Option<VCDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_status: &'a Option<TypedId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terms_of_use: &'a Option<OneOrMany<TermsOfUse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidence: &'a Option<OneOrMany<Evidence>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_schema: &'a Option<Vec<TypedId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_service: &'a Option<OneOrMany<TypedId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proof: &'a Option<OneOrMany<Proof>>,
    #[serde(flatten)]
    extension_fields: &'a Map<String, Value>,
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        check_extension_fields(&self.extension_fields, CREDENTIAL_FIELDS)
            .map_err(serde::ser::Error::custom)?;
        CredentialView {
            context: &self.context,
            id: &self.id,
            type_: &self.type_,
            credential_subject: &self.credential_subject,
            issuer: &self.issuer,
            issuance_date: &self.issuance_date,
            expiration_date: &self.expiration_date,
            credential_status: &self.credential_status,
            terms_of_use: &self.terms_of_use,
            evidence: &self.evidence,
            credential_schema: &self.credential_schema,
            refresh_service: &self.refresh_service,
            proof: &self.proof,
            extension_fields: &self.extension_fields,
        }
        .serialize(serializer)
    }
}

/// Extension fields must never shadow a named field.
pub(crate) fn check_extension_fields(
    extension_fields: &Map<String, Value>,
    named: &[&str],
) -> Result<(), Error> {
    match extension_fields.keys().find(|key| named.contains(&key.as_str())) {
        Some(key) => Err(Error::ExtensionFieldCollision(key.clone())),
        None => Ok(()),
    }
}

/// `@context` and `type` must be present, and the first context must be the
/// base context.
pub(crate) fn check_mandatory_fields(value: &Value) -> Result<(), Error> {
    let object = value.as_object().ok_or(Error::ExpectedObject)?;
    let context = object
        .get("@context")
        .ok_or(Error::MissingField("@context"))?;
    let context: OneOrMany<Context> =
        serde_json::from_value(context.clone()).map_err(|_| Error::InvalidContext)?;
    Contexts::try_from(context)?;
    if !object.contains_key("type") {
        return Err(Error::MissingField("type"));
    }
    Ok(())
}

fn deserialize_schemas<'de, D>(deserializer: D) -> Result<Option<Vec<TypedId>>, D::Error>
where
    D: Deserializer<'de>,
{
    let schemas: Option<OneOrMany<TypedId>> = Option::deserialize(deserializer)?;
    Ok(schemas.map(OneOrMany::into_vec))
}

/// RFC3339 date-time as used in VC Data Model, always written in UTC with a
/// `Z` suffix.
/// <https://www.w3.org/TR/vc-data-model/#issuance-date>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct VCDateTime(DateTime<Utc>);

impl VCDateTime {
    pub fn date_time(&self) -> DateTime<Utc> {
        self.0
    }
}

impl FromStr for VCDateTime {
    type Err = Error;
    fn from_str(date_time: &str) -> Result<Self, Self::Err> {
        let date_time = DateTime::parse_from_rfc3339(date_time)
            .map_err(|e| Error::InvalidDate(date_time.to_string(), e))?;
        Ok(VCDateTime(date_time.with_timezone(&Utc)))
    }
}

impl TryFrom<String> for VCDateTime {
    type Error = Error;
    fn try_from(date_time: String) -> Result<Self, Self::Error> {
        Self::from_str(&date_time)
    }
}

impl From<VCDateTime> for String {
    fn from(date_time: VCDateTime) -> String {
        date_time.to_string()
    }
}

impl fmt::Display for VCDateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for VCDateTime {
    fn from(date_time: DateTime<Tz>) -> Self {
        Self(date_time.with_timezone(&Utc))
    }
}

impl TryFrom<VCDateTime> for NumericDate {
    type Error = Error;
    fn try_from(date_time: VCDateTime) -> Result<Self, Self::Error> {
        NumericDate::try_from(date_time.0)
    }
}

impl TryFrom<NumericDate> for VCDateTime {
    type Error = Error;
    fn try_from(date: NumericDate) -> Result<Self, Self::Error> {
        Ok(Self(DateTime::<Utc>::try_from(date)?))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Context {
    URI(String),
    Object(Map<String, Value>),
}

/// JSON-LD contexts of a document. The first entry is always the base
/// credentials context.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
#[serde(try_from = "OneOrMany<Context>")]
pub enum Contexts {
    One(Context),
    Many(Vec<Context>),
}

impl TryFrom<OneOrMany<Context>> for Contexts {
    type Error = Error;
    fn try_from(context: OneOrMany<Context>) -> Result<Self, Self::Error> {
        match context.first() {
            None => return Err(Error::MissingField("@context")),
            Some(Context::URI(uri)) if uri == DEFAULT_CONTEXT => {}
            Some(_) => return Err(Error::InvalidContext),
        }
        Ok(match context {
            OneOrMany::One(context) => Contexts::One(context),
            OneOrMany::Many(contexts) => Contexts::Many(contexts),
        })
    }
}

impl From<Contexts> for OneOrMany<Context> {
    fn from(contexts: Contexts) -> OneOrMany<Context> {
        match contexts {
            Contexts::One(context) => OneOrMany::One(context),
            Contexts::Many(contexts) => OneOrMany::Many(contexts),
        }
    }
}

impl Default for Contexts {
    fn default() -> Self {
        Self::Many(vec![Context::URI(DEFAULT_CONTEXT.to_string())])
    }
}

impl Contexts {
    /// Check if the contexts contains the given URI.
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.iter()
            .any(|context| matches!(context, Context::URI(context_uri) if context_uri == uri))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Context> {
        match self {
            Self::One(context) => std::slice::from_ref(context).iter(),
            Self::Many(contexts) => contexts.iter(),
        }
    }

    /// Append a context unless it is already present.
    pub fn push(&mut self, context: Context) {
        if self.iter().any(|existing| existing == &context) {
            return;
        }
        let contexts = match std::mem::take(self) {
            Self::One(first) => vec![first, context],
            Self::Many(mut contexts) => {
                contexts.push(context);
                contexts
            }
        };
        *self = Self::Many(contexts);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CredentialSubject {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl CredentialSubject {
    /// An empty credential subject (no properties, not even an id) is not a
    /// valid claim set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.property_set.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Issuer {
    URI(String),
    Object(ObjectWithId),
}

impl Issuer {
    /// Return this issuer's id URI
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::URI(uri) => Some(uri.as_str()),
            Self::Object(object_with_id) => object_with_id.id.as_deref(),
        }
    }
}

/// Object with an id and arbitrary other properties. The id may be carried
/// by the `iss` claim instead when the object is embedded in a JWT.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ObjectWithId {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

/// Reference with a mandatory id and type, such as a credential schema or
/// status entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TypedId {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl TypedId {
    pub fn new(id: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.into(),
            property_set: Map::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TermsOfUse {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: OneOrMany<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl Credential {
    /// Parse an unsecured JSON credential. Proofs, if any, are not checked.
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let mut value: Value = serde_json::from_str(s)?;
        normalize_numbers(&mut value);
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, Error> {
        check_mandatory_fields(&value)?;
        let vc: Self = serde_json::from_value(value)?;
        vc.validate(false)?;
        Ok(vc)
    }

    pub fn to_json_value(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }

    /// JSON encoding with object keys in sorted order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.to_json_value()?)?)
    }

    pub fn issuer_id(&self) -> Option<&str> {
        self.issuer.as_ref().and_then(Issuer::id)
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

    /// Check structural constraints. The base type is always required (the
    /// base context is enforced when parsing); `strict` additionally requires
    /// issuer, issuance date, non-empty subjects and complete typed references.
    pub fn validate(&self, strict: bool) -> Result<(), Error> {
        if !self.type_.contains(&VERIFIABLE_CREDENTIAL_TYPE.to_string()) {
            return Err(Error::MissingType(VERIFIABLE_CREDENTIAL_TYPE));
        }
        check_extension_fields(&self.extension_fields, CREDENTIAL_FIELDS)?;
        if !strict {
            return Ok(());
        }
        if self.issuer_id().map_or(true, str::is_empty) {
            return Err(Error::MissingField("issuer"));
        }
        if self.issuance_date.is_none() {
            return Err(Error::MissingField("issuanceDate"));
        }
        if self.credential_subject.is_empty()
            || self.credential_subject.iter().any(CredentialSubject::is_empty)
        {
            return Err(Error::InvalidField {
                field: "credentialSubject",
                reason: "at least one non-empty subject is required".to_string(),
            });
        }
        let typed_refs = self
            .credential_schema
            .iter()
            .flatten()
            .map(|schema| ("credentialSchema", schema))
            .chain(self.credential_status.iter().map(|status| ("credentialStatus", status)))
            .chain(
                self.refresh_service
                    .iter()
                    .flat_map(|services| services.iter())
                    .map(|service| ("refreshService", service)),
            );
        for (field, typed_id) in typed_refs {
            if typed_id.id.is_empty() || typed_id.type_.is_empty() {
                return Err(Error::InvalidField {
                    field,
                    reason: "id and type must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Project the credential into JWT claims.
    ///
    /// With `minimal`, values carried by registered claims (`jti`, `iss`,
    /// `nbf`, `exp`) are removed from the embedded `vc` object.
    pub fn jwt_claims(&self, minimal: bool) -> Result<JWTClaims, Error> {
        let subject = self
            .credential_subject
            .to_single()
            .and_then(|subject| subject.id.clone());
        let not_before: Option<NumericDate> =
            self.issuance_date.map(TryInto::try_into).transpose()?;
        let expiration_time: Option<NumericDate> =
            self.expiration_date.map(TryInto::try_into).transpose()?;
        let mut vc = self.clone();
        if minimal {
            vc.id = None;
            vc.issuance_date = None;
            vc.expiration_date = None;
            vc.issuer = match vc.issuer.take() {
                Some(Issuer::Object(mut object)) => {
                    object.id = None;
                    if object.property_set.is_empty() {
                        None
                    } else {
                        Some(Issuer::Object(object))
                    }
                }
                _ => None,
            };
        }
        Ok(JWTClaims {
            expiration_time,
            issuance_date: not_before,
            not_before,
            issuer: self.issuer_id().map(str::to_string),
            jwt_id: self.id.clone(),
            subject,
            verifiable_credential: Some(vc.to_json_value()?),
            ..Default::default()
        })
    }

    /// Rebuild a credential from JWT claims, reconciling registered claims
    /// with the embedded `vc` object.
    pub fn from_jwt_claims(claims: JWTClaims) -> Result<Self, Error> {
        let vc = claims
            .verifiable_credential
            .ok_or(Error::MissingField("vc"))?;
        let mut vc = Self::from_json_value(vc)?;
        if let Some(jti) = claims.jwt_id {
            reconcile("jti", "id", &jti, vc.id.as_deref())?;
            vc.id = Some(jti);
        }
        if let Some(iss) = claims.issuer {
            reconcile("iss", "issuer", &iss, vc.issuer_id())?;
            match vc.issuer {
                Some(Issuer::Object(ref mut object)) => object.id = Some(iss),
                _ => vc.issuer = Some(Issuer::URI(iss)),
            }
        }
        let (claim, issued) = match (claims.not_before, claims.issuance_date) {
            (Some(nbf), _) => ("nbf", Some(nbf)),
            (None, iat) => ("iat", iat),
        };
        if let Some(date) = issued {
            let date = VCDateTime::try_from(date)?;
            reconcile_date(claim, "issuanceDate", date, vc.issuance_date)?;
            vc.issuance_date = Some(date);
        }
        if let Some(exp) = claims.expiration_time {
            let date = VCDateTime::try_from(exp)?;
            reconcile_date("exp", "expirationDate", date, vc.expiration_date)?;
            vc.expiration_date = Some(date);
        }
        if let Some(sub) = claims.subject {
            let subject =
                vc.credential_subject
                    .to_single_mut()
                    .ok_or_else(|| Error::InvalidField {
                        field: "credentialSubject",
                        reason: "sub claim requires exactly one subject".to_string(),
                    })?;
            reconcile("sub", "credentialSubject.id", &sub, subject.id.as_deref())?;
            subject.id = Some(sub);
        }
        Ok(vc)
    }
}

impl LinkedDataDocument for Credential {
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
        Credential::add_proof(self, proof)
    }
}

pub(crate) fn reconcile(
    claim: &'static str,
    field: &'static str,
    registered: &str,
    embedded: Option<&str>,
) -> Result<(), Error> {
    match embedded {
        Some(embedded) if embedded != registered => Err(Error::ClaimMismatch {
            claim,
            field,
            registered: registered.to_string(),
            embedded: embedded.to_string(),
        }),
        _ => Ok(()),
    }
}

fn reconcile_date(
    claim: &'static str,
    field: &'static str,
    registered: VCDateTime,
    embedded: Option<VCDateTime>,
) -> Result<(), Error> {
    match embedded {
        // NumericDate keeps microseconds only.
        Some(embedded)
            if (embedded.0 - registered.0).num_microseconds().map_or(true, |d| d.abs() >= 1) =>
        {
            Err(Error::ClaimMismatch {
                claim,
                field,
                registered: registered.to_string(),
                embedded: embedded.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn degree_credential() -> Value {
        json!({
          "@context": [
            "https://www.w3.org/2018/credentials/v1",
            "https://www.w3.org/2018/credentials/examples/v1"
          ],
          "credentialSubject": {
            "degree": {"type": "BachelorDegree", "university": "MIT"},
            "id": "did:example:ebfeb1f712ebc6f1c276e12ec21",
            "name": "Jayden Doe",
            "spouse": "did:example:c276e12ec21ebfeb1f712ebc6f1"
          },
          "expirationDate": "2020-01-01T19:23:24Z",
          "id": "http://example.edu/credentials/1872",
          "issuanceDate": "2010-01-01T19:23:24Z",
          "issuer": {
            "id": "did:example:76e12ec712ebc6f1c221ebfeb1f",
            "name": "Example University"
          },
          "referenceNumber": 83294847,
          "type": ["VerifiableCredential", "UniversityDegreeCredential"]
        })
    }

    #[test]
    fn credential_from_json() {
        let doc_str = r#"{
            "@context": "https://www.w3.org/2018/credentials/v1",
            "id": "http://example.org/credentials/3731",
            "type": ["VerifiableCredential"],
            "issuer": "did:example:30e07a529f32d234f6181736bd3",
            "issuanceDate": "2020-08-19T21:41:50Z",
            "credentialSubject": {
                "id": "did:example:d23dd687a7dc6787646f2eb98d0"
            }
        }"#;
        let vc = Credential::from_json(doc_str).unwrap();
        assert_eq!(vc.id.as_deref(), Some("http://example.org/credentials/3731"));
        assert_eq!(vc.issuer_id(), Some("did:example:30e07a529f32d234f6181736bd3"));
        assert!(matches!(vc.context, Contexts::One(_)));
        vc.validate(true).unwrap();
    }

    #[test]
    #[should_panic(expected = "Invalid context")]
    fn credential_invalid_context() {
        let doc_str = r#"{
            "@context": "https://example.org/invalid-context",
            "id": "http://example.org/credentials/3731",
            "type": ["VerifiableCredential"],
            "issuer": "did:example:30e07a529f32d234f6181736bd3",
            "issuanceDate": "2020-08-19T21:41:50Z",
            "credentialSubject": {
                "id": "did:example:d23dd687a7dc6787646f2eb98d0"
            }
        }"#;
        Credential::from_json(doc_str).unwrap();
    }

    #[test]
    fn missing_base_type() {
        let mut value = degree_credential();
        value["type"] = json!("UniversityDegreeCredential");
        let err = Credential::from_json_value(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        let mut value = degree_credential();
        value.as_object_mut().unwrap().remove("@context");
        let err = Credential::from_json_value(value).unwrap_err();
        assert!(matches!(err, Error::MissingField("@context")));
    }

    #[test]
    fn extension_fields_round_trip() {
        let value = degree_credential();
        let vc = Credential::from_json_value(value.clone()).unwrap();
        assert_eq!(vc.extension_fields.get("referenceNumber"), Some(&json!(83294847)));
        assert_eq!(vc.to_json_value().unwrap(), value);
        let again = Credential::from_json_value(vc.to_json_value().unwrap()).unwrap();
        assert_eq!(again, vc);
    }

    #[test]
    fn extension_field_collision_rejected() {
        let mut vc = Credential::from_json_value(degree_credential()).unwrap();
        vc.extension_fields
            .insert("issuer".to_string(), json!("did:example:other"));
        let err = vc.validate(false).unwrap_err();
        assert!(matches!(err, Error::ExtensionFieldCollision(ref key) if key == "issuer"));
        vc.to_json_value().unwrap_err();
    }

    #[test]
    fn strict_requires_issuance_date() {
        let mut value = degree_credential();
        value.as_object_mut().unwrap().remove("issuanceDate");
        let vc = Credential::from_json_value(value).unwrap();
        vc.validate(false).unwrap();
        let err = vc.validate(true).unwrap_err();
        assert!(matches!(err, Error::MissingField("issuanceDate")));
    }

    #[test]
    fn schemas_always_array() {
        let mut value = degree_credential();
        value["credentialSchema"] = json!({
            "id": "https://example.org/examples/degree.json",
            "type": "JsonSchemaValidator2018"
        });
        let vc = Credential::from_json_value(value).unwrap();
        assert_eq!(vc.credential_schema.as_ref().map(Vec::len), Some(1));
        assert!(vc.to_json_value().unwrap()["credentialSchema"].is_array());
    }

    #[test]
    fn minimal_jwt_claims() {
        let vc = Credential::from_json_value(degree_credential()).unwrap();
        let claims = vc.jwt_claims(true).unwrap();
        assert_eq!(claims.jwt_id.as_deref(), Some("http://example.edu/credentials/1872"));
        assert_eq!(
            claims.issuer.as_deref(),
            Some("did:example:76e12ec712ebc6f1c221ebfeb1f")
        );
        assert_eq!(
            claims.subject.as_deref(),
            Some("did:example:ebfeb1f712ebc6f1c276e12ec21")
        );
        assert_eq!(claims.not_before.unwrap().as_seconds(), 1262373804.0);
        assert_eq!(claims.issuance_date, claims.not_before);
        assert_eq!(claims.expiration_time.unwrap().as_seconds(), 1577906604.0);
        let embedded = claims.verifiable_credential.clone().unwrap();
        assert!(embedded.get("id").is_none());
        assert!(embedded.get("issuanceDate").is_none());
        assert!(embedded.get("expirationDate").is_none());
        assert_eq!(embedded["issuer"], json!({"name": "Example University"}));

        let decoded = Credential::from_jwt_claims(claims).unwrap();
        assert_eq!(decoded, vc);
    }

    #[test]
    fn full_jwt_claims_keep_embedded_values() {
        let vc = Credential::from_json_value(degree_credential()).unwrap();
        let claims = vc.jwt_claims(false).unwrap();
        assert_eq!(
            claims.verifiable_credential.as_ref().unwrap()["id"],
            json!("http://example.edu/credentials/1872")
        );
        assert_eq!(Credential::from_jwt_claims(claims).unwrap(), vc);
    }

    #[test]
    fn jti_mismatch() {
        let vc = Credential::from_json_value(degree_credential()).unwrap();
        let mut claims = vc.jwt_claims(false).unwrap();
        claims.jwt_id = Some("http://example.edu/credentials/9999".to_string());
        let err = Credential::from_jwt_claims(claims).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClaimMismatch);
        assert!(matches!(err, Error::ClaimMismatch { claim: "jti", .. }));
    }

    #[test]
    fn date_format() {
        let date: VCDateTime = "2010-01-01T19:23:24+00:00".parse().unwrap();
        assert_eq!(date.to_string(), "2010-01-01T19:23:24Z");
        let err = "yesterday".parse::<VCDateTime>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn contexts_push_is_idempotent() {
        let mut contexts = Contexts::default();
        contexts.push(Context::URI(DEFAULT_CONTEXT.to_string()));
        contexts.push(Context::URI("https://example.org/ctx".to_string()));
        contexts.push(Context::URI("https://example.org/ctx".to_string()));
        assert_eq!(
            serde_json::to_value(&contexts).unwrap(),
            json!([DEFAULT_CONTEXT, "https://example.org/ctx"])
        );
    }
}
