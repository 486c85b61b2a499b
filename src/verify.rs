//! Signature verification over every security layer of a document.
use crate::decode::{parse_credential, DecodeOptions, Document};
use crate::error::Error;
use crate::fetcher::resolve_jwk;
use crate::jws;
use crate::presentation::{CredentialOrJWT, Presentation};
use crate::proof::{JwsEnvelope, ProofEnvelope};

/// Verify the envelope and embedded proofs of `document`, then, for a
/// presentation, the credentials it holds.
///
/// A document with neither a signed envelope nor an embedded proof fails
/// with [`Error::MissingProof`]. The document is never modified.
pub fn verify(
    document: &Document,
    envelope: &ProofEnvelope,
    options: &DecodeOptions,
) -> Result<(), Error> {
    let verifier = options.proof_verifier();
    match envelope {
        ProofEnvelope::None => return Err(Error::MissingProof),
        ProofEnvelope::JWS(jws) => {
            let proofs = document.proofs();
            if jws.is_unsecured() {
                if proofs.is_empty() {
                    return Err(Error::MissingProof);
                }
            } else {
                verify_jws(document, jws, options)?;
            }
            verifier.verify_all(document.as_linked_data(), proofs)?;
        }
        ProofEnvelope::LinkedData(proofs) => {
            if proofs.is_empty() {
                return Err(Error::MissingProof);
            }
            verifier.verify_all(document.as_linked_data(), proofs)?;
        }
    }
    if let Document::Presentation(vp) = document {
        verify_credentials(vp, options.for_credentials())?;
    }
    Ok(())
}

fn verify_jws(document: &Document, jws: &JwsEnvelope, options: &DecodeOptions) -> Result<(), Error> {
    let issuer_id = jws
        .claims
        .issuer
        .as_deref()
        .or_else(|| document.signer_id())
        .unwrap_or("");
    log::debug!(
        "verifying {} JWS by {:?} with key {:?}",
        jws.header.algorithm,
        issuer_id,
        jws.key_id()
    );
    let key = resolve_jwk(
        options.public_key_fetcher.as_deref(),
        issuer_id,
        jws.key_id(),
    )?;
    jws::verify_bytes(jws.header.algorithm, &jws.signing_input, &key, &jws.signature)
}

pub(crate) fn verify_credentials(vp: &Presentation, options: &DecodeOptions) -> Result<(), Error> {
    for (index, credential) in vp.verifiable_credential.iter().enumerate() {
        match credential {
            CredentialOrJWT::JWT(jwt) => {
                parse_credential(jwt.as_bytes(), options)?;
            }
            CredentialOrJWT::Credential(vc) => {
                if vc.proof.is_none() {
                    log::debug!("credential {} has no proof of its own", index);
                } else if !options.disable_proof_check {
                    options
                        .proof_verifier()
                        .verify_all(&**vc, vc.proofs())?;
                }
            }
        }
    }
    Ok(())
}
