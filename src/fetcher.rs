use crate::error::{BoxedError, Error};
use crate::jwk::{PublicKey, JWK};

/// Resolves the public key for an `(issuer id, key id)` pair.
///
/// Called synchronously, once per signature being verified. Failures are not
/// retried.
pub trait PublicKeyFetcher: Send + Sync {
    fn fetch(&self, issuer_id: &str, key_id: &str) -> Result<PublicKey, BoxedError>;
}

impl<F> PublicKeyFetcher for F
where
    F: Fn(&str, &str) -> Result<PublicKey, BoxedError> + Send + Sync,
{
    fn fetch(&self, issuer_id: &str, key_id: &str) -> Result<PublicKey, BoxedError> {
        self(issuer_id, key_id)
    }
}

/// Fetcher returning the same key for every lookup.
#[derive(Debug, Clone)]
pub struct SingleKey(pub PublicKey);

impl PublicKeyFetcher for SingleKey {
    fn fetch(&self, _issuer_id: &str, _key_id: &str) -> Result<PublicKey, BoxedError> {
        Ok(self.0.clone())
    }
}

/// Split a verification method URL into the issuer id and key id.
///
/// `did:example:123#key1` gives `("did:example:123", "key1")`. Without a
/// fragment the whole URL is used as both.
pub fn split_verification_method(verification_method: &str) -> (&str, &str) {
    match verification_method.split_once('#') {
        Some((issuer_id, key_id)) => (issuer_id, key_id),
        None => (verification_method, verification_method),
    }
}

pub(crate) fn resolve_jwk(
    fetcher: Option<&dyn PublicKeyFetcher>,
    issuer_id: &str,
    key_id: &str,
) -> Result<JWK, Error> {
    let fetcher = fetcher.ok_or_else(|| Error::MissingKeyFetcher {
        issuer_id: issuer_id.to_string(),
        key_id: key_id.to_string(),
    })?;
    log::trace!("fetching key {:?} of {:?}", key_id, issuer_id);
    let public_key = fetcher
        .fetch(issuer_id, key_id)
        .map_err(|source| Error::KeyResolution {
            issuer_id: issuer_id.to_string(),
            key_id: key_id.to_string(),
            source,
        })?;
    public_key.to_jwk()
}
