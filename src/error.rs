use thiserror::Error;

/// Error returned by a caller-supplied capability (key fetcher, document loader).
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Not valid JSON, base64, UTF-8 or compact JWS.
    MalformedInput,
    /// Missing mandatory field or wrongly shaped field.
    SchemaViolation,
    /// A JWT registered claim disagrees with the embedded `vc`/`vp` object.
    ClaimMismatch,
    /// No signature suite or algorithm available for a proof.
    UnsupportedProofType,
    /// The key fetcher failed or returned an unusable key.
    KeyResolutionFailed,
    /// A cryptographic check failed, or the document is unsecured.
    SignatureInvalid,
    /// The document loader failed or the document is not valid JSON-LD.
    CanonicalizationFailed,
    /// A signer could not produce a signature.
    SigningFailed,
}

/// Error type for `ssi-verifiable`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Multibase(#[from] multibase::Error),
    #[error("Input is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Invalid JWS")]
    InvalidJWS,
    /// Invalid `crit` property in JWS header
    #[error("Invalid crit property in JWS header")]
    InvalidCriticalHeader,
    /// Unknown `crit` header name in JWS header
    #[error("Unknown critical header name in JWS header")]
    UnknownCriticalHeader,
    #[error("Expected unencoded JWS header")]
    ExpectedUnencodedHeader,
    #[error("Invalid date `{0}`: {1}")]
    InvalidDate(String, chrono::ParseError),
    #[error("Numeric date out of range")]
    InvalidNumericDate,
    #[error("Expected a JSON object")]
    ExpectedObject,

    #[error("Missing {0} property")]
    MissingField(&'static str),
    #[error("Invalid context")]
    InvalidContext,
    #[error("Missing type {0}")]
    MissingType(&'static str),
    #[error("Invalid {field} property: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Extension field `{0}` collides with a named field")]
    ExtensionFieldCollision(String),
    #[error("Expected a {expected} but found a {found}")]
    UnexpectedDocument {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Missing proof verificationMethod")]
    MissingVerificationMethod,
    #[error("Missing jws or proofValue in proof")]
    MissingProofSignature,

    #[error("JWT claim `{claim}` ({registered}) does not match {field} ({embedded})")]
    ClaimMismatch {
        claim: &'static str,
        field: &'static str,
        registered: String,
        embedded: String,
    },

    #[error("Unsupported proof type `{0}`")]
    UnsupportedProofType(String),
    #[error("Unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    /// Missing crate features
    #[error("Missing features: {0}")]
    MissingFeatures(&'static str),

    #[error("No public key fetcher to resolve key `{key_id}` of `{issuer_id}`")]
    MissingKeyFetcher { issuer_id: String, key_id: String },
    #[error("Unable to resolve key `{key_id}` of `{issuer_id}`: {source}")]
    KeyResolution {
        issuer_id: String,
        key_id: String,
        source: BoxedError,
    },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Curve not implemented: '{0}'")]
    CurveNotImplemented(String),

    #[error("Invalid signature")]
    InvalidSignature,
    /// Algorithm in JWS header does not match the key
    #[error("Algorithm in JWS header does not match key")]
    AlgorithmMismatch,
    #[error("Missing proof")]
    MissingProof,

    #[error("Unable to load document `{url}`: {source}")]
    DocumentLoader { url: String, source: BoxedError },
    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Missing private key")]
    MissingPrivateKey,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Json(_)
            | Self::Base64(_)
            | Self::Multibase(_)
            | Self::Utf8(_)
            | Self::InvalidJWS
            | Self::InvalidCriticalHeader
            | Self::UnknownCriticalHeader
            | Self::ExpectedUnencodedHeader
            | Self::InvalidDate(..)
            | Self::InvalidNumericDate
            | Self::ExpectedObject => ErrorKind::MalformedInput,
            Self::MissingField(_)
            | Self::InvalidContext
            | Self::MissingType(_)
            | Self::InvalidField { .. }
            | Self::ExtensionFieldCollision(_)
            | Self::UnexpectedDocument { .. }
            | Self::MissingVerificationMethod
            | Self::MissingProofSignature => ErrorKind::SchemaViolation,
            Self::ClaimMismatch { .. } => ErrorKind::ClaimMismatch,
            Self::UnsupportedProofType(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::MissingFeatures(_) => ErrorKind::UnsupportedProofType,
            Self::MissingKeyFetcher { .. }
            | Self::KeyResolution { .. }
            | Self::InvalidKey(_)
            | Self::CurveNotImplemented(_) => ErrorKind::KeyResolutionFailed,
            Self::InvalidSignature | Self::AlgorithmMismatch | Self::MissingProof => {
                ErrorKind::SignatureInvalid
            }
            Self::DocumentLoader { .. } | Self::Canonicalization(_) => {
                ErrorKind::CanonicalizationFailed
            }
            Self::Signing(_) | Self::MissingPrivateKey => ErrorKind::SigningFailed,
        }
    }
}

impl From<Error> for String {
    fn from(err: Error) -> String {
        format!("{}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::InvalidJWS.kind(), ErrorKind::MalformedInput);
        assert_eq!(Error::MissingField("type").kind(), ErrorKind::SchemaViolation);
        assert_eq!(
            Error::UnsupportedProofType("RsaSignature2018".to_string()).kind(),
            ErrorKind::UnsupportedProofType
        );
        let err = Error::KeyResolution {
            issuer_id: "did:example:123".to_string(),
            key_id: "key-1".to_string(),
            source: "not found".into(),
        };
        assert_eq!(err.kind(), ErrorKind::KeyResolutionFailed);
        assert_eq!(
            err.to_string(),
            "Unable to resolve key `key-1` of `did:example:123`: not found"
        );
        assert_eq!(Error::MissingProof.kind(), ErrorKind::SignatureInvalid);
        assert_eq!(
            String::from(Error::MissingVerificationMethod),
            "Missing proof verificationMethod"
        );
    }
}
