//! Parse, verify and issue [Verifiable Credentials and Presentations][vc-data-model]
//! in any of their interchangeable encodings:
//! - plain JSON-LD;
//! - compact [JWT][jwt] with the document in the `vc`/`vp` claim
//!   ([JWT-VC][jwt-vc]);
//! - JSON-LD carrying one or more embedded [Linked Data Proofs][ld-proofs].
//!
//! [`decode`] detects the encoding of an opaque byte string, decodes it into
//! a [`Credential`] or [`Presentation`] and verifies every signature layer:
//! the JWS envelope, embedded proofs, and the credentials held by a
//! presentation. Keys are looked up through a caller-supplied
//! [`PublicKeyFetcher`].
//!
//! [vc-data-model]: <https://www.w3.org/TR/vc-data-model/>
//! [jwt]: <https://www.rfc-editor.org/rfc/rfc7519>
//! [jwt-vc]: <https://www.w3.org/TR/vc-data-model/#json-web-token>
//! [ld-proofs]: <https://w3c-ccg.github.io/ld-proofs/>
//!
//! # Basic Usage
//!
//! ```
//! use ssi_verifiable::{
//!     parse_presentation, Algorithm, BoxedError, DecodeOptions, JWKSigner, Presentation,
//!     PublicKey, JWK,
//! };
//!
//! let key = JWK::from_ed25519_secret(&[7u8; 32]);
//! let public_key = PublicKey::try_from(&key).unwrap();
//! let signer = JWKSigner::new(key).unwrap();
//!
//! let vp = Presentation::new().with_holder("did:example:holder");
//! let jwt = vp
//!     .jwt_claims(&[], true)
//!     .unwrap()
//!     .marshal_jws(Algorithm::EdDSA, &signer, "key-1")
//!     .unwrap();
//!
//! let options = DecodeOptions::new().with_public_key_fetcher(
//!     move |_: &str, _: &str| -> Result<PublicKey, BoxedError> { Ok(public_key.clone()) },
//! );
//! let decoded = parse_presentation(jwt.as_bytes(), &options).unwrap();
//! assert_eq!(decoded.holder.as_deref(), Some("did:example:holder"));
//! ```
#![cfg_attr(docsrs, feature(doc_auto_cfg), feature(doc_cfg))]

pub mod decode;
pub mod error;
pub mod fetcher;
pub mod hash;
pub mod jsonld;
pub mod jwk;
pub mod jws;
pub mod jwt;
pub mod ldp;
pub mod one_or_many;
pub mod presentation;
pub mod proof;
pub mod signer;
pub mod vc;
pub mod verify;

pub use decode::{
    decode, detect_format, parse_credential, parse_presentation, DecodeOptions, DecodedDocument,
    Document, Format,
};
pub use error::{BoxedError, Error, ErrorKind};
pub use fetcher::{PublicKeyFetcher, SingleKey};
pub use jsonld::{Canonicalizer, DocumentLoader, JcsCanonicalizer, StaticLoader};
pub use jwk::{Algorithm, KeyType, PublicKey, JWK};
pub use jwt::JWTClaims;
pub use ldp::{
    add_linked_data_proof, Ed25519Signature2018, Ed25519Signature2020, JsonWebSignature2020,
    LinkedDataDocument, LinkedDataProofContext, LinkedDataProofContextBuilder,
    SignatureRepresentation, SignatureSuite, SuiteSet,
};
pub use one_or_many::OneOrMany;
pub use presentation::{CredentialOrJWT, CredentialProjection, Presentation};
pub use proof::{Proof, ProofEnvelope};
pub use signer::{JWKSigner, Signer};
pub use vc::{Credential, VCDateTime};
pub use verify::verify;
