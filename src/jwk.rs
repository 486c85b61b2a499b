use std::convert::{TryFrom, TryInto};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// RFC 7517 - JSON Web Key (JWK)
// RFC 7518 - JSON Web Algorithms (JWA)
// RFC 8037 - CFRG ECDH and Signatures in JOSE

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    EdDSA,
    ES256,
    ES256K,
    /// Unsecured JWS, RFC 7519 section 6.
    #[serde(rename = "none")]
    #[default]
    None,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EdDSA => "EdDSA",
            Self::ES256 => "ES256",
            Self::ES256K => "ES256K",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JWK {
    #[serde(rename = "alg")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
    #[serde(rename = "kid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(flatten)]
    pub params: Params,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kty")]
pub enum Params {
    EC(ECParams),
    OKP(OctetParams),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ECParams {
    // Parameters for Elliptic Curve Public Keys
    #[serde(rename = "crv")]
    pub curve: Option<String>,
    #[serde(rename = "x")]
    pub x_coordinate: Option<Base64urlUInt>,
    #[serde(rename = "y")]
    pub y_coordinate: Option<Base64urlUInt>,

    // Parameters for Elliptic Curve Private Keys
    #[serde(rename = "d")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecc_private_key: Option<Base64urlUInt>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OctetParams {
    // Parameters for Octet Key Pair Public Keys
    #[serde(rename = "crv")]
    pub curve: String,
    #[serde(rename = "x")]
    pub public_key: Base64urlUInt,

    // Parameters for Octet Key Pair Private Keys
    #[serde(rename = "d")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Base64urlUInt>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(try_from = "String")]
#[serde(into = "Base64urlUIntString")]
pub struct Base64urlUInt(pub Vec<u8>);
type Base64urlUIntString = String;

impl TryFrom<String> for Base64urlUInt {
    type Error = Error;
    fn try_from(data: String) -> Result<Self, Self::Error> {
        Ok(Base64urlUInt(base64::decode_config(
            data,
            base64::URL_SAFE_NO_PAD,
        )?))
    }
}

impl From<Base64urlUInt> for Base64urlUIntString {
    fn from(data: Base64urlUInt) -> Base64urlUIntString {
        base64::encode_config(data.0, base64::URL_SAFE_NO_PAD)
    }
}

impl JWK {
    /// Algorithm to use with this key: the `alg` parameter if set, otherwise
    /// the one implied by the curve.
    pub fn get_algorithm(&self) -> Option<Algorithm> {
        if let Some(algorithm) = self.algorithm {
            return Some(algorithm);
        }
        match &self.params {
            Params::OKP(okp) if okp.curve == "Ed25519" => Some(Algorithm::EdDSA),
            Params::EC(ec) => match ec.curve.as_deref() {
                Some("P-256") => Some(Algorithm::ES256),
                Some("secp256k1") => Some(Algorithm::ES256K),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn has_private_key(&self) -> bool {
        match &self.params {
            Params::EC(ec) => ec.ecc_private_key.is_some(),
            Params::OKP(okp) => okp.private_key.is_some(),
        }
    }

    pub fn to_public(&self) -> Self {
        let params = match &self.params {
            Params::EC(ec) => Params::EC(ECParams {
                ecc_private_key: None,
                ..ec.clone()
            }),
            Params::OKP(okp) => Params::OKP(OctetParams {
                private_key: None,
                ..okp.clone()
            }),
        };
        JWK {
            params,
            ..self.clone()
        }
    }

    pub fn from_ed25519_public_key(public_key: &[u8]) -> Result<Self, Error> {
        if public_key.len() != 32 {
            return Err(Error::InvalidKey(format!(
                "Ed25519 public key must be 32 bytes, found {}",
                public_key.len()
            )));
        }
        Ok(JWK::from(Params::OKP(OctetParams {
            curve: "Ed25519".to_string(),
            public_key: Base64urlUInt(public_key.to_vec()),
            private_key: None,
        })))
    }

    /// Build a signing key from the 64-byte `secret || public` form used by
    /// most Ed25519 libraries.
    pub fn from_ed25519_keypair(keypair: &[u8]) -> Result<Self, Error> {
        if keypair.len() != 64 {
            return Err(Error::InvalidKey(format!(
                "Ed25519 key pair must be 64 bytes, found {}",
                keypair.len()
            )));
        }
        let jwk = JWK::from(Params::OKP(OctetParams {
            curve: "Ed25519".to_string(),
            public_key: Base64urlUInt(keypair[32..].to_vec()),
            private_key: Some(Base64urlUInt(keypair[..32].to_vec())),
        }));
        #[cfg(feature = "ed25519")]
        {
            // Rejects a public half that does not belong to the secret half.
            if let Params::OKP(okp) = &jwk.params {
                ed25519_dalek::SigningKey::try_from(okp)?;
            }
        }
        Ok(jwk)
    }

    #[cfg(feature = "ed25519")]
    pub fn from_ed25519_secret(secret: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(secret);
        JWK::from(Params::OKP(OctetParams {
            curve: "Ed25519".to_string(),
            public_key: Base64urlUInt(signing_key.verifying_key().as_bytes().to_vec()),
            private_key: Some(Base64urlUInt(secret.to_vec())),
        }))
    }

    #[cfg(feature = "secp256r1")]
    pub fn from_p256_secret(secret: &[u8]) -> Result<Self, Error> {
        let signing_key = p256::ecdsa::SigningKey::from_slice(secret)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let point = signing_key.verifying_key().to_encoded_point(false);
        let mut jwk = JWK::from_sec1_public_key(KeyType::P256, point.as_bytes())?;
        if let Params::EC(ec) = &mut jwk.params {
            ec.ecc_private_key = Some(Base64urlUInt(secret.to_vec()));
        }
        Ok(jwk)
    }

    /// Build a public key from a SEC1 encoded elliptic curve point.
    pub fn from_sec1_public_key(key_type: KeyType, bytes: &[u8]) -> Result<Self, Error> {
        let curve = match key_type {
            KeyType::P256 => "P-256",
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Ed25519 => return Self::from_ed25519_public_key(bytes),
        };
        let uncompressed = decompress_point(key_type, bytes)?;
        if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
            return Err(Error::InvalidKey(format!(
                "Expected uncompressed {} point",
                curve
            )));
        }
        Ok(JWK::from(Params::EC(ECParams {
            curve: Some(curve.to_string()),
            x_coordinate: Some(Base64urlUInt(uncompressed[1..33].to_vec())),
            y_coordinate: Some(Base64urlUInt(uncompressed[33..65].to_vec())),
            ecc_private_key: None,
        })))
    }
}

impl From<Params> for JWK {
    fn from(params: Params) -> Self {
        Self {
            algorithm: None,
            key_id: None,
            params,
        }
    }
}

fn decompress_point(key_type: KeyType, bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.first() == Some(&0x04) {
        return Ok(bytes.to_vec());
    }
    match key_type {
        #[cfg(feature = "secp256r1")]
        KeyType::P256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            Ok(key.to_encoded_point(false).as_bytes().to_vec())
        }
        #[cfg(feature = "secp256k1")]
        KeyType::Secp256k1 => {
            let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map_err(|e| Error::InvalidKey(e.to_string()))?;
            Ok(key.to_encoded_point(false).as_bytes().to_vec())
        }
        _ => Err(Error::MissingFeatures("secp256r1 or secp256k1")),
    }
}

/// Kind of raw key material returned by a key fetcher.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "secp256k1")]
    Secp256k1,
}

/// Public key material resolved for an `(issuer, key id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: KeyType,
    /// Raw key bytes: 32 bytes for Ed25519, a SEC1 point otherwise.
    pub value: Vec<u8>,
}

impl PublicKey {
    pub fn ed25519(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key_type: KeyType::Ed25519,
            value: value.into(),
        }
    }

    pub fn to_jwk(&self) -> Result<JWK, Error> {
        JWK::from_sec1_public_key(self.key_type, &self.value)
    }
}

impl TryFrom<&PublicKey> for JWK {
    type Error = Error;
    fn try_from(key: &PublicKey) -> Result<Self, Self::Error> {
        key.to_jwk()
    }
}

impl TryFrom<&JWK> for PublicKey {
    type Error = Error;
    fn try_from(jwk: &JWK) -> Result<Self, Self::Error> {
        match &jwk.params {
            Params::OKP(okp) if okp.curve == "Ed25519" => {
                Ok(Self::ed25519(okp.public_key.0.clone()))
            }
            Params::OKP(okp) => Err(Error::CurveNotImplemented(okp.curve.clone())),
            Params::EC(ec) => {
                let key_type = match ec.curve.as_deref() {
                    Some("P-256") => KeyType::P256,
                    Some("secp256k1") => KeyType::Secp256k1,
                    other => {
                        return Err(Error::CurveNotImplemented(
                            other.unwrap_or_default().to_string(),
                        ))
                    }
                };
                match (&ec.x_coordinate, &ec.y_coordinate) {
                    (Some(x), Some(y)) => Ok(Self {
                        key_type,
                        value: [&[0x04][..], &x.0, &y.0].concat(),
                    }),
                    _ => Err(Error::InvalidKey("Missing EC point coordinates".to_string())),
                }
            }
        }
    }
}

fn key_bytes<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], Error> {
    bytes
        .try_into()
        .map_err(|_| Error::InvalidKey(format!("{} must be {} bytes", what, N)))
}

#[cfg(feature = "ed25519")]
impl TryFrom<&OctetParams> for ed25519_dalek::VerifyingKey {
    type Error = Error;
    fn try_from(params: &OctetParams) -> Result<Self, Self::Error> {
        if params.curve != "Ed25519" {
            return Err(Error::CurveNotImplemented(params.curve.to_string()));
        }
        let bytes = key_bytes::<32>(&params.public_key.0, "Ed25519 public key")?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

#[cfg(feature = "ed25519")]
impl TryFrom<&OctetParams> for ed25519_dalek::SigningKey {
    type Error = Error;
    fn try_from(params: &OctetParams) -> Result<Self, Self::Error> {
        if params.curve != "Ed25519" {
            return Err(Error::CurveNotImplemented(params.curve.to_string()));
        }
        let private_key = params
            .private_key
            .as_ref()
            .ok_or(Error::MissingPrivateKey)?;
        let secret = key_bytes::<32>(&private_key.0, "Ed25519 private key")?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
        if signing_key.verifying_key().as_bytes()[..] != params.public_key.0[..] {
            return Err(Error::InvalidKey(
                "Ed25519 public key does not match private key".to_string(),
            ));
        }
        Ok(signing_key)
    }
}

fn ec_point(params: &ECParams, expected_curve: &str) -> Result<Vec<u8>, Error> {
    let curve = params
        .curve
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("Missing curve in JWK".to_string()))?;
    if curve != expected_curve {
        return Err(Error::CurveNotImplemented(curve.to_string()));
    }
    let x = params
        .x_coordinate
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("Missing x coordinate".to_string()))?;
    let y = params
        .y_coordinate
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("Missing y coordinate".to_string()))?;
    Ok([&[0x04], x.0.as_slice(), y.0.as_slice()].concat())
}

#[cfg(feature = "secp256r1")]
impl TryFrom<&ECParams> for p256::ecdsa::VerifyingKey {
    type Error = Error;
    fn try_from(params: &ECParams) -> Result<Self, Self::Error> {
        let point = ec_point(params, "P-256")?;
        p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

#[cfg(feature = "secp256r1")]
impl TryFrom<&ECParams> for p256::ecdsa::SigningKey {
    type Error = Error;
    fn try_from(params: &ECParams) -> Result<Self, Self::Error> {
        ec_point(params, "P-256")?;
        let d = params.ecc_private_key.as_ref().ok_or(Error::MissingPrivateKey)?;
        p256::ecdsa::SigningKey::from_slice(&d.0).map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

#[cfg(feature = "secp256k1")]
impl TryFrom<&ECParams> for k256::ecdsa::VerifyingKey {
    type Error = Error;
    fn try_from(params: &ECParams) -> Result<Self, Self::Error> {
        let point = ec_point(params, "secp256k1")?;
        k256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

#[cfg(feature = "secp256k1")]
impl TryFrom<&ECParams> for k256::ecdsa::SigningKey {
    type Error = Error;
    fn try_from(params: &ECParams) -> Result<Self, Self::Error> {
        ec_point(params, "secp256k1")?;
        let d = params.ecc_private_key.as_ref().ok_or(Error::MissingPrivateKey)?;
        k256::ecdsa::SigningKey::from_slice(&d.0).map_err(|e| Error::InvalidKey(e.to_string()))
    }
}
