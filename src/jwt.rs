use std::collections::BTreeMap;
use std::convert::TryFrom;

use chrono::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::Error;
use crate::jwk::Algorithm;
use crate::jws::{self, DecodedJWS, Header};
use crate::one_or_many::OneOrMany;
use crate::signer::Signer;

// RFC 7519 - JSON Web Token (JWT)

/// Represents NumericDate (see https://datatracker.ietf.org/doc/html/rfc7519#section-2)
/// where the range is restricted to those in which microseconds can be exactly represented.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, PartialOrd)]
pub struct NumericDate(#[serde(serialize_with = "interop_serialize")] f64);

/// As many JWT libraries only accept integers, a date is serialized as an
/// integer if it does not have fractional seconds.
fn interop_serialize<S>(x: &f64, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if x.fract() != 0.0 {
        s.serialize_f64(*x)
    } else {
        s.serialize_i64(*x as i64)
    }
}

impl NumericDate {
    /// This is 2^53 / 1_000_000, the largest NumericDate that faithfully
    /// represents full microsecond precision.
    pub const MAX: NumericDate = NumericDate(9_007_199_254.740_992);

    pub fn as_seconds(self) -> f64 {
        self.0
    }

    pub fn try_from_seconds(seconds: f64) -> Result<Self, Error> {
        if !seconds.is_finite() || seconds.abs() > Self::MAX.0 {
            Err(Error::InvalidNumericDate)
        } else {
            Ok(NumericDate(seconds))
        }
    }
}

impl TryFrom<DateTime<Utc>> for NumericDate {
    type Error = Error;
    fn try_from(dtu: DateTime<Utc>) -> Result<Self, Self::Error> {
        let whole_seconds = dtu.timestamp() as f64;
        let fractional_seconds = dtu.timestamp_subsec_nanos() as f64 * 1.0e-9;
        Self::try_from_seconds(whole_seconds + fractional_seconds)
    }
}

impl TryFrom<NumericDate> for DateTime<Utc> {
    type Error = Error;
    fn try_from(nd: NumericDate) -> Result<Self, Self::Error> {
        let whole_seconds = nd.0.floor() as i64;
        let fractional_nanoseconds = ((nd.0 - nd.0.floor()) * 1_000_000_000.0).floor() as u32;
        Utc.timestamp_opt(whole_seconds, fractional_nanoseconds)
            .single()
            .ok_or(Error::InvalidNumericDate)
    }
}

/// Claims of a JWT carrying a credential (`vc`) or a presentation (`vp`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct JWTClaims {
    #[serde(rename = "exp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<NumericDate>,
    #[serde(rename = "iat")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<NumericDate>,
    #[serde(rename = "iss")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(rename = "nbf")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<NumericDate>,
    #[serde(rename = "jti")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_id: Option<String>,
    #[serde(rename = "sub")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "aud")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<OneOrMany<String>>,
    #[serde(rename = "vc")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_credential: Option<Value>,
    #[serde(rename = "vp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_presentation: Option<Value>,
    #[serde(flatten)]
    pub property_set: BTreeMap<String, Value>,
}

impl JWTClaims {
    /// Payload bytes, with object keys in sorted order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, Error> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_vec(&value)?)
    }

    /// Parse a JWT payload, normalizing integral floating-point numbers.
    pub fn from_json_bytes(payload: &[u8]) -> Result<Self, Error> {
        let mut value: Value = serde_json::from_slice(payload)?;
        if !value.is_object() {
            return Err(Error::ExpectedObject);
        }
        normalize_numbers(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Sign the claims into a compact JWS. The header is
    /// `{"alg", "kid", "typ": "JWT"}`; `kid` is always present.
    pub fn marshal_jws(
        &self,
        algorithm: Algorithm,
        signer: &dyn Signer,
        key_id: &str,
    ) -> Result<String, Error> {
        let header = Header {
            algorithm,
            key_id: Some(key_id.to_string()),
            type_: Some("JWT".to_string()),
            ..Default::default()
        };
        let payload = self.to_json_bytes()?;
        jws::encode_sign_with_header(&header, &payload, signer)
    }

    /// Encode the claims into an unsecured JWT (`alg: none`).
    pub fn marshal_unsecured_jwt(&self) -> Result<String, Error> {
        let header = Header {
            algorithm: Algorithm::None,
            type_: Some("JWT".to_string()),
            ..Default::default()
        };
        let payload = self.to_json_bytes()?;
        jws::encode_unsigned_with_header(&header, &payload)
    }
}

/// A compact JWT split and decoded, signature not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJWT {
    pub jws: DecodedJWS,
    pub claims: JWTClaims,
}

impl DecodedJWT {
    pub fn is_unsecured(&self) -> bool {
        self.jws.header.algorithm == Algorithm::None
    }
}

pub fn decode_unverified(jwt: &str) -> Result<DecodedJWT, Error> {
    let (header_b64, payload_b64, signature_b64) = jws::split_jws(jwt)?;
    let decoded = jws::decode_jws_parts(header_b64, payload_b64.as_bytes(), signature_b64)?;
    if decoded.signature.is_empty() && decoded.header.algorithm != Algorithm::None {
        return Err(Error::InvalidJWS);
    }
    if !decoded.signature.is_empty() && decoded.header.algorithm == Algorithm::None {
        return Err(Error::InvalidJWS);
    }
    let claims = JWTClaims::from_json_bytes(&decoded.payload)?;
    Ok(DecodedJWT {
        jws: decoded,
        claims,
    })
}

/// Rewrite floating-point numbers with no fractional part, within the exact
/// integer range of `f64`, as integers.
pub fn normalize_numbers(value: &mut Value) {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    match value {
        Value::Number(number) if !number.is_i64() && !number.is_u64() => {
            if let Some(x) = number.as_f64() {
                if x.fract() == 0.0 && x.abs() < MAX_EXACT {
                    *value = Value::from(x as i64);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        Value::Object(object) => object.values_mut().for_each(normalize_numbers),
        _ => {}
    }
}
