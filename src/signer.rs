use crate::error::Error;
use crate::jwk::{Algorithm, JWK};
use crate::jws;

/// Signer.
///
/// Produces raw signatures for one algorithm. Used both for compact JWTs and
/// for linked data proofs.
pub trait Signer: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}

impl<'a, T: Signer + ?Sized> Signer for &'a T {
    fn algorithm(&self) -> Algorithm {
        T::algorithm(*self)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        T::sign(*self, data)
    }
}

/// Signer backed by a private JWK.
#[derive(Debug, Clone)]
pub struct JWKSigner {
    key: JWK,
    algorithm: Algorithm,
}

impl JWKSigner {
    pub fn new(key: JWK) -> Result<Self, Error> {
        let algorithm = key
            .get_algorithm()
            .ok_or_else(|| Error::UnsupportedAlgorithm("unknown key type".to_string()))?;
        Ok(Self { key, algorithm })
    }

    /// Ed25519 signer from the 64-byte `secret || public` key pair encoding.
    pub fn ed25519(keypair: &[u8]) -> Result<Self, Error> {
        Self::new(JWK::from_ed25519_keypair(keypair)?)
    }

    pub fn public_jwk(&self) -> JWK {
        self.key.to_public()
    }
}

impl Signer for JWKSigner {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        if !self.key.has_private_key() {
            return Err(Error::MissingPrivateKey);
        }
        jws::sign_bytes(self.algorithm, data, &self.key).map_err(|e| match e {
            Error::Signing(_) | Error::MissingPrivateKey => e,
            other => Error::Signing(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_cannot_sign() {
        let signer = JWKSigner::new(JWK::from_ed25519_public_key(&[7u8; 32]).unwrap()).unwrap();
        assert_eq!(signer.algorithm(), Algorithm::EdDSA);
        let err = signer.sign(b"data").unwrap_err();
        assert!(matches!(err, Error::MissingPrivateKey));
    }

    #[test]
    #[cfg(feature = "ed25519")]
    fn ed25519_is_deterministic() {
        let signer = JWKSigner::new(JWK::from_ed25519_secret(&[1u8; 32])).unwrap();
        let a = signer.sign(b"data").unwrap();
        let b = signer.sign(b"data").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }
}
