/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Signed JSON collateral.
//!
//! TCB info and enclave identity bodies have the shape
//! `{"<field>":{...},"signature":"<hex>"}`. The signature covers the exact
//! bytes of the `<field>` object as sent, so the span is cut out of the body
//! textually instead of being re-serialized.

use mbedtls::hash::{Md, Type};
use serde_json::Value;

use crate::{Certificate, Diagnostics, Error};

const SIGNATURE_MARKER: &'static str = "},\"signature\":";
const SIGNATURE_FIELD: &'static str = "signature";

/// Byte length of a raw P-256 `r || s` signature.
const RAW_SIGNATURE_LEN: usize = 64;

/// The value of `field` in `body`, exactly as it appears on the wire.
pub fn extract_signed_span<'a>(body: &'a str, field: &str) -> Result<&'a str, Error> {
    let key = format!("\"{}\":", field);
    let start = body.find(&key).ok_or_else(|| Error::SignedFieldNotFound(field.to_string()))? + key.len();
    let end = body[start..]
        .find(SIGNATURE_MARKER)
        .ok_or_else(|| Error::SignedFieldNotFound(field.to_string()))?;
    Ok(&body[start..start + end + 1])
}

/// Converts a hex encoded `r || s` ECDSA signature to its DER encoding.
pub fn decode_signature(hex: &str) -> Result<Vec<u8>, Error> {
    let raw = base16::decode(hex.trim().as_bytes())
        .map_err(|e| Error::InvalidSignature(format!("signature is not hex encoded: {}", e)))?;
    if raw.len() != RAW_SIGNATURE_LEN {
        return Err(Error::InvalidSignature(format!(
            "expected {} signature bytes, found {}",
            RAW_SIGNATURE_LEN,
            raw.len()
        )));
    }

    let (r, s) = raw.split_at(raw.len() / 2);
    let r = num::BigUint::from_bytes_be(r);
    let s = num::BigUint::from_bytes_be(s);

    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_biguint(&r);
            writer.next().write_biguint(&s);
        })
    }))
}

/// Verifies the DER encoded ECDSA `signature` over the SHA-256 digest of
/// `message` with the public key of `signer`.
pub fn verify_signature(signer: &Certificate, signature: &[u8], message: &[u8], diagnostics: &mut Diagnostics) -> bool {
    let verified = (|| -> Result<(), Error> {
        let mut hash = [0u8; 32];
        Md::hash(Type::Sha256, message, &mut hash)?;
        let mut signer = signer.to_mbedtls()?;
        signer.public_key_mut().verify(Type::Sha256, &hash, signature)?;
        Ok(())
    })();

    match verified {
        Ok(()) => true,
        Err(e) => {
            diagnostics.push(format!(
                "Signature does not verify with the key of `{}`: {}",
                signer.subject().label(),
                e
            ));
            false
        }
    }
}

/// A byte span, the detached signature over it and the certificate that
/// supposedly signed it.
#[derive(Clone, Debug)]
pub struct SignedPayload {
    message: Vec<u8>,
    signature: Vec<u8>,
    signer: Certificate,
}

impl SignedPayload {
    pub fn new(message: Vec<u8>, signature: Vec<u8>, signer: Certificate) -> Self {
        SignedPayload {
            message,
            signature,
            signer,
        }
    }

    /// Cuts the signed `field` and its `signature` out of a collateral body.
    pub fn from_body(body: &str, field: &str, signer: Certificate) -> Result<Self, Error> {
        let message = extract_signed_span(body, field)?;
        let json: Value = serde_json::from_str(body)?;
        let signature = json
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SignedFieldNotFound(SIGNATURE_FIELD.to_string()))?;
        Ok(SignedPayload::new(message.as_bytes().to_vec(), decode_signature(signature)?, signer))
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn signer(&self) -> &Certificate {
        &self.signer
    }

    pub fn verify(&self, diagnostics: &mut Diagnostics) -> bool {
        verify_signature(&self.signer, &self.signature, &self.message, diagnostics)
    }
}
