use std::collections::BTreeMap;
#[allow(unused_imports)]
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::jwk::{Algorithm, ECParams, OctetParams, Params as JWKParams, JWK};
use crate::signer::Signer;

// RFC 7515 - JSON Web Signature (JWS)
// RFC 7797 - JSON Web Signature (JWS) Unencoded Payload Option

/// JOSE header.
///
/// Field order is the serialization order: `alg`, `kid`, `typ`, `cty`, `b64`,
/// `crit`, then any additional parameter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Header {
    #[serde(rename = "alg")]
    pub algorithm: Algorithm,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "jku")]
    pub jwk_set_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<JWK>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "kid")]
    pub key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "typ")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "cty")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "b64")]
    pub base64urlencode_payload: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "crit")]
    pub critical: Option<Vec<String>>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(flatten)]
    pub additional_parameters: BTreeMap<String, serde_json::Value>,
}

pub(crate) fn base64_encode_json<T: Serialize>(object: &T) -> Result<String, Error> {
    let json = serde_json::to_string(&object)?;
    Ok(base64::encode_config(json, base64::URL_SAFE_NO_PAD))
}

fn check_key_algorithm(algorithm: Algorithm, key: &JWK) -> Result<(), Error> {
    match key.algorithm {
        Some(key_algorithm) if key_algorithm != algorithm => Err(Error::AlgorithmMismatch),
        _ => Ok(()),
    }
}

pub fn sign_bytes(algorithm: Algorithm, data: &[u8], key: &JWK) -> Result<Vec<u8>, Error> {
    check_key_algorithm(algorithm, key)?;
    match (&key.params, algorithm) {
        (JWKParams::OKP(okp), Algorithm::EdDSA) => ed25519_sign(okp, data),
        (JWKParams::EC(ec), Algorithm::ES256) => p256_sign(ec, data),
        (JWKParams::EC(ec), Algorithm::ES256K) => k256_sign(ec, data),
        (_, Algorithm::None) => Err(Error::UnsupportedAlgorithm(algorithm.to_string())),
        _ => Err(Error::AlgorithmMismatch),
    }
}

pub fn verify_bytes(
    algorithm: Algorithm,
    data: &[u8],
    key: &JWK,
    signature: &[u8],
) -> Result<(), Error> {
    check_key_algorithm(algorithm, key)?;
    match (&key.params, algorithm) {
        (JWKParams::OKP(okp), Algorithm::EdDSA) => ed25519_verify(okp, data, signature),
        (JWKParams::EC(ec), Algorithm::ES256) => p256_verify(ec, data, signature),
        (JWKParams::EC(ec), Algorithm::ES256K) => k256_verify(ec, data, signature),
        (_, Algorithm::None) => Err(Error::UnsupportedAlgorithm(algorithm.to_string())),
        _ => Err(Error::AlgorithmMismatch),
    }
}

#[cfg(feature = "ed25519")]
fn ed25519_sign(okp: &OctetParams, data: &[u8]) -> Result<Vec<u8>, Error> {
    use ed25519_dalek::Signer;
    let signing_key = ed25519_dalek::SigningKey::try_from(okp)?;
    Ok(signing_key.sign(data).to_bytes().to_vec())
}

#[cfg(not(feature = "ed25519"))]
fn ed25519_sign(_okp: &OctetParams, _data: &[u8]) -> Result<Vec<u8>, Error> {
    Err(Error::MissingFeatures("ed25519"))
}

#[cfg(feature = "ed25519")]
fn ed25519_verify(okp: &OctetParams, data: &[u8], signature: &[u8]) -> Result<(), Error> {
    use ed25519_dalek::Verifier;
    let public_key = ed25519_dalek::VerifyingKey::try_from(okp)?;
    let signature =
        ed25519_dalek::Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
    public_key
        .verify(data, &signature)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(not(feature = "ed25519"))]
fn ed25519_verify(_okp: &OctetParams, _data: &[u8], _signature: &[u8]) -> Result<(), Error> {
    Err(Error::MissingFeatures("ed25519"))
}

#[cfg(feature = "secp256r1")]
fn p256_sign(ec: &ECParams, data: &[u8]) -> Result<Vec<u8>, Error> {
    use p256::ecdsa::signature::Signer;
    let signing_key = p256::ecdsa::SigningKey::try_from(ec)?;
    let sig: p256::ecdsa::Signature = signing_key
        .try_sign(data)
        .map_err(|e| Error::Signing(e.to_string()))?;
    Ok(sig.to_bytes().to_vec())
}

#[cfg(not(feature = "secp256r1"))]
fn p256_sign(_ec: &ECParams, _data: &[u8]) -> Result<Vec<u8>, Error> {
    Err(Error::MissingFeatures("secp256r1"))
}

#[cfg(feature = "secp256r1")]
fn p256_verify(ec: &ECParams, data: &[u8], signature: &[u8]) -> Result<(), Error> {
    use p256::ecdsa::signature::Verifier;
    let verifying_key = p256::ecdsa::VerifyingKey::try_from(ec)?;
    let sig = p256::ecdsa::Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(data, &sig)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(not(feature = "secp256r1"))]
fn p256_verify(_ec: &ECParams, _data: &[u8], _signature: &[u8]) -> Result<(), Error> {
    Err(Error::MissingFeatures("secp256r1"))
}

#[cfg(feature = "secp256k1")]
fn k256_sign(ec: &ECParams, data: &[u8]) -> Result<Vec<u8>, Error> {
    use k256::ecdsa::signature::Signer;
    let signing_key = k256::ecdsa::SigningKey::try_from(ec)?;
    let sig: k256::ecdsa::Signature = signing_key
        .try_sign(data)
        .map_err(|e| Error::Signing(e.to_string()))?;
    Ok(sig.to_bytes().to_vec())
}

#[cfg(not(feature = "secp256k1"))]
fn k256_sign(_ec: &ECParams, _data: &[u8]) -> Result<Vec<u8>, Error> {
    Err(Error::MissingFeatures("secp256k1"))
}

#[cfg(feature = "secp256k1")]
fn k256_verify(ec: &ECParams, data: &[u8], signature: &[u8]) -> Result<(), Error> {
    use k256::ecdsa::signature::Verifier;
    let verifying_key = k256::ecdsa::VerifyingKey::try_from(ec)?;
    let sig = k256::ecdsa::Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(data, &sig)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(not(feature = "secp256k1"))]
fn k256_verify(_ec: &ECParams, _data: &[u8], _signature: &[u8]) -> Result<(), Error> {
    Err(Error::MissingFeatures("secp256k1"))
}

/// Sign a payload into a compact JWS using the given header.
pub fn encode_sign_with_header(
    header: &Header,
    payload: &[u8],
    signer: &dyn Signer,
) -> Result<String, Error> {
    if header.algorithm != signer.algorithm() {
        return Err(Error::AlgorithmMismatch);
    }
    let header_b64 = base64_encode_json(header)?;
    let payload_b64 = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    let signing_input = header_b64 + "." + &payload_b64;
    let signature = signer.sign(signing_input.as_bytes())?;
    let sig_b64 = base64::encode_config(signature, base64::URL_SAFE_NO_PAD);
    Ok([signing_input, sig_b64].join("."))
}

/// Encode a payload into an unsecured JWS (`alg: none`, empty signature).
pub fn encode_unsigned_with_header(header: &Header, payload: &[u8]) -> Result<String, Error> {
    let header = Header {
        algorithm: Algorithm::None,
        ..header.clone()
    };
    let header_b64 = base64_encode_json(&header)?;
    let payload_b64 = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
    Ok(header_b64 + "." + &payload_b64 + ".")
}

/// Sign with a detached, unencoded payload (`b64: false`), returning
/// `header..signature`.
pub fn detached_sign_unencoded_payload(
    payload: &[u8],
    signer: &dyn Signer,
) -> Result<String, Error> {
    let header = Header {
        algorithm: signer.algorithm(),
        critical: Some(vec!["b64".to_string()]),
        base64urlencode_payload: Some(false),
        ..Default::default()
    };
    let header_b64 = base64_encode_json(&header)?;
    let signing_input = [header_b64.as_bytes(), b".", payload].concat();
    let signature = signer.sign(&signing_input)?;
    let sig_b64 = base64::encode_config(signature, base64::URL_SAFE_NO_PAD);
    Ok(header_b64 + ".." + &sig_b64)
}

pub fn split_jws(jws: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = jws.splitn(3, '.');
    Ok(
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) if !c.contains('.') => (a, b, c),
            _ => return Err(Error::InvalidJWS),
        },
    )
}

pub fn split_detached_jws(jws: &str) -> Result<(&str, &str), Error> {
    let (header_b64, omitted_payload, signature_b64) = split_jws(jws)?;
    if !omitted_payload.is_empty() {
        return Err(Error::InvalidJWS);
    }
    Ok((header_b64, signature_b64))
}

/// Whether `s` has the shape of a compact JWS: three dot-separated
/// base64url segments with non-empty header and payload.
pub fn is_compact_jws(s: &str) -> bool {
    let is_b64url = |segment: &str| {
        segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    };
    match split_jws(s) {
        Ok((header, payload, signature)) => {
            !header.is_empty()
                && !payload.is_empty()
                && is_b64url(header)
                && is_b64url(payload)
                && is_b64url(signature)
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJWS {
    pub header: Header,
    pub signing_input: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decode JWS parts (JOSE header, payload, and signature) into useful values.
/// The payload argument is bytes since it may be unencoded if the b64:false header parameter is used; otherwise it must be a base64url-encoded string. Header and signature are always expected to be base64url-encoded.
/// "crit" (critical) header parameters are checked and disallowed if unrecognized/unsupported.
pub fn decode_jws_parts(
    header_b64: &str,
    payload_enc: &[u8],
    signature_b64: &str,
) -> Result<DecodedJWS, Error> {
    let signature = base64::decode_config(signature_b64, base64::URL_SAFE_NO_PAD)?;
    let header_json = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD)?;
    let header: Header = serde_json::from_slice(&header_json)?;
    let payload = if header.base64urlencode_payload.unwrap_or(true) {
        base64::decode_config(payload_enc, base64::URL_SAFE_NO_PAD)?
    } else {
        payload_enc.to_vec()
    };
    if let Some(critical) = &header.critical {
        if critical.is_empty() {
            return Err(Error::InvalidCriticalHeader);
        }
        for name in critical {
            match name.as_str() {
                "alg" | "jku" | "jwk" | "kid" | "x5u" | "x5c" | "x5t" | "x5t#S256" | "typ"
                | "cty" | "crit" => return Err(Error::InvalidCriticalHeader),
                "b64" if header.base64urlencode_payload.is_some() => {}
                "b64" => return Err(Error::InvalidCriticalHeader),
                _ => return Err(Error::UnknownCriticalHeader),
            }
        }
    }
    let signing_input = [header_b64.as_bytes(), b".", payload_enc].concat();
    Ok(DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    })
}

/// Verify a JWS with detached payload. Returns the JWS header on success.
pub fn detached_verify(jws: &str, payload_enc: &[u8], key: &JWK) -> Result<Header, Error> {
    let (header_b64, signature_b64) = split_detached_jws(jws)?;
    let DecodedJWS {
        header,
        signing_input,
        payload: _,
        signature,
    } = decode_jws_parts(header_b64, payload_enc, signature_b64)?;
    verify_bytes(header.algorithm, &signing_input, key, &signature)?;
    Ok(header)
}

pub fn decode_verify(jws: &str, key: &JWK) -> Result<(Header, Vec<u8>), Error> {
    let (header_b64, payload_enc, signature_b64) = split_jws(jws)?;
    let DecodedJWS {
        header,
        signing_input,
        payload,
        signature,
    } = decode_jws_parts(header_b64, payload_enc.as_bytes(), signature_b64)?;
    verify_bytes(header.algorithm, &signing_input, key, &signature)?;
    Ok((header, payload))
}

pub fn decode_unverified(jws: &str) -> Result<(Header, Vec<u8>), Error> {
    let (header_b64, payload_enc, signature_b64) = split_jws(jws)?;
    let decoded = decode_jws_parts(header_b64, payload_enc.as_bytes(), signature_b64)?;
    Ok((decoded.header, decoded.payload))
}
