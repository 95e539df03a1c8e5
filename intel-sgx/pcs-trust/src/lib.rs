/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

#![deny(warnings)]

//! Trust-chain verification for Intel SGX/TDX provisioning collateral.
//!
//! The Provisioning Certification Service returns every artifact (PCK
//! certificates, PCK CRLs, TCB info, enclave identities) together with an
//! issuer chain in an HTTP header. That chain is not guaranteed to be ordered.
//! This crate turns such a chain into a root-first list of certificates,
//! verifies artifacts against it, authenticates the signed JSON collateral and
//! decodes the Intel SGX extension embedded in PCK certificates.
//!
//! Nothing in this crate performs network or disk I/O.

extern crate percent_encoding;
extern crate yasna;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;

use std::fmt::{self, Display};

pub use yasna::ASN1Error;
use mbedtls::Error as MbedError;
use yasna::{ASN1ErrorKind, ASN1Result, PCBit};

pub use crate::certificate::{Certificate, DistinguishedName};
pub use crate::chain::{is_root_first, sort_chain, ChainLink};
pub use crate::collateral::{
    CollateralVerifier, CollateralVerifierBuilder, PckCertsEntry, PcsVersion, SignedCollateral, UnavailablePckCert,
    VerifiedPckCert, VerifiedPckCerts,
};
pub use crate::crl::Crl;
pub use crate::extension::{decode_extension, ExtensionTree, FieldMap, FieldValue};
pub use crate::pckcert::{cpusvn_from_tcb, root_ca_crl_url, PckCa, PckExtension, PlatformConfiguration, SgxType};
pub use crate::pem::{parse_issuer_header, split_pem_bundle};
pub use crate::signature::{decode_signature, extract_signed_span, verify_signature, SignedPayload};
pub use crate::store::{verify_crl_trust, TrustStore};

mod certificate;
mod chain;
mod collateral;
mod crl;
mod extension;
pub mod oid;
mod pckcert;
pub mod pem;
mod signature;
mod store;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        MalformedChain {
            display("PEM bundle contains a BEGIN marker without a matching END marker")
        }
        InvalidCertificate(reason: String) {
            display("Certificate could not be parsed: {}", reason)
        }
        InvalidCrlFormat {
            display("Invalid CRL format")
        }
        Asn1(err: ASN1Error) {
            display("ASN.1 decoding error: {}", err)
            from()
        }
        Mbedtls(err: MbedError) {
            display("mbedtls error: {}", err)
            from()
        }
        UnknownExtensionField(oid: String) {
            display("SGX extension contains unknown field with OID {}", oid)
        }
        DuplicateExtensionField(name: &'static str) {
            display("SGX extension field `{}` occurs more than once", name)
        }
        ExtensionTooDeep(depth: usize) {
            display("SGX extension nesting exceeds {} levels", depth)
        }
        NoIssuerRelationship(first: String, second: String) {
            display("Neither `{}` nor `{}` issued the other certificate", first, second)
        }
        MultipleRootCertificates(first: String, second: String) {
            display("Chain contains more than one self-signed certificate: `{}` and `{}`", first, second)
        }
        AmbiguousChain(name: String) {
            display("Chain branches at `{}`", name)
        }
        BrokenChain(name: String) {
            display("Chain is broken after `{}`", name)
        }
        CircularOrAmbiguousChain {
            display("Could not determine a unique start of the certificate chain")
        }
        InvalidTcb(reason: String) {
            display("Invalid TCB: {}", reason)
        }
        SignedFieldNotFound(field: String) {
            display("Signed field `{}` not found in response body", field)
        }
        InvalidSignature(reason: String) {
            display("Invalid signature: {}", reason)
        }
        MissingCaChain {
            display("CA chain was unexpectedly empty")
        }
        HeaderMissing(header: &'static str) {
            display("Expected header `{}` is missing", header)
        }
        InvalidHeader(header: &'static str) {
            display("Header `{}` could not be decoded", header)
        }
        ParseError(err: serde_json::error::Error) {
            display("json error: {}", err)
            from()
        }
        Untrusted(diagnostics: Diagnostics) {
            display("Verification failed: {}", diagnostics)
        }
    }
}

/// Human-readable reasons collected while verifying an artifact.
///
/// Verification failures are ordinary outcomes; verifiers return `false` and
/// record why here instead of returning an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<String>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics(Vec::new())
    }

    pub fn push<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        warn!("{}", msg);
        self.0.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

/// Returns the DER encoding of every element of the constructed value `der`.
fn der_elements(der: &[u8]) -> ASN1Result<Vec<Vec<u8>>> {
    let value = yasna::parse_der(der, |reader| reader.read_tagged_der())?;
    if value.pcbit() != PCBit::Constructed {
        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
    }
    split_der_contents(value.value())
}

/// Splits the contents octets of a constructed value into its elements.
fn split_der_contents(contents: &[u8]) -> ASN1Result<Vec<Vec<u8>>> {
    let wrapped = yasna::construct_der(|writer| writer.write_sequence(|writer| writer.next().write_der(contents)));
    let mut elements = Vec::new();
    yasna::parse_der(&wrapped, |reader| {
        reader.read_sequence_of(|reader| {
            elements.push(reader.read_der()?);
            Ok(())
        })
    })?;
    Ok(elements)
}

#[cfg(test)]
mod test_support;
