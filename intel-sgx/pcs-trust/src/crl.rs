/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::ffi::CString;

use mbedtls::hash::{Md, Type};
use mbedtls::x509::Crl as MbedtlsCrl;
use pkix::pem::{self, PEM_CRL};

use crate::certificate::Certificate;
use crate::{Diagnostics, DistinguishedName, Error};

/// A certificate revocation list as served by the PCS, either PEM or DER.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crl {
    der: Vec<u8>,
    pem: Option<String>,
    tbs: Vec<u8>,
    issuer: DistinguishedName,
    digest: Type,
    signature: Vec<u8>,
    revoked: Vec<Vec<u8>>,
}

fn pem_to_mbedtls(pem: &str) -> Result<MbedtlsCrl, Error> {
    let c = CString::new(pem.as_bytes()).map_err(|_| Error::InvalidCrlFormat)?;
    let mut crl = MbedtlsCrl::new();
    crl.push_from_pem(c.as_bytes_with_nul()).map_err(|_| Error::InvalidCrlFormat)?;
    Ok(crl)
}

fn der_to_mbedtls(der: &[u8]) -> Result<MbedtlsCrl, Error> {
    let mut crl = MbedtlsCrl::new();
    crl.push_from_der(der).map_err(|_| Error::InvalidCrlFormat)?;
    Ok(crl)
}

impl Crl {
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let der = pem::pem_to_der(pem.trim(), Some(PEM_CRL)).ok_or(Error::InvalidCrlFormat)?;
        let mut crl = Self::from_mbedtls(&pem_to_mbedtls(pem)?, der)?;
        crl.pem = Some(pem.to_string());
        Ok(crl)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        Self::from_mbedtls(&der_to_mbedtls(der)?, der.to_vec())
    }

    fn from_mbedtls(crl: &MbedtlsCrl, der: Vec<u8>) -> Result<Self, Error> {
        let issuer = crl.issuer_raw().map_err(|_| Error::InvalidCrlFormat)?;
        Ok(Crl {
            der,
            pem: None,
            tbs: crl.tbs_raw().map_err(|_| Error::InvalidCrlFormat)?,
            issuer: DistinguishedName::from_der(&issuer)?,
            digest: crl.digest_type(),
            signature: crl.signature().map_err(|_| Error::InvalidCrlFormat)?,
            revoked: crl.revoked_serials(),
        })
    }

    /// Parses a PEM CRL, falling back to DER for binary input.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        match std::str::from_utf8(data) {
            Ok(text) if text.trim_start().starts_with("-----BEGIN") => Self::from_pem(text),
            _ => Self::from_der(data),
        }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The PEM encoding the CRL was parsed from, or one derived from the DER.
    pub fn to_pem(&self) -> String {
        match &self.pem {
            Some(pem) => pem.clone(),
            None => pem::der_to_pem(&self.der, PEM_CRL),
        }
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Digest of the CRL signature algorithm.
    pub fn digest_type(&self) -> Type {
        self.digest
    }

    /// Serial numbers of the revoked certificates as big-endian bytes.
    pub fn revoked_serials(&self) -> &[Vec<u8>] {
        &self.revoked
    }

    pub fn is_revoked(&self, serial: &[u8]) -> bool {
        self.revoked.iter().any(|revoked| revoked.as_slice() == serial)
    }

    /// Checks the CRL signature against the public key of `issuer`.
    pub fn verify_signature(&self, issuer: &Certificate, diagnostics: &mut Diagnostics) -> bool {
        match self.try_verify_signature(issuer) {
            Ok(()) => true,
            Err(e) => {
                diagnostics.push(format!(
                    "CRL signature does not verify with the key of `{}`: {}",
                    issuer.subject().label(),
                    e
                ));
                false
            }
        }
    }

    fn try_verify_signature(&self, issuer: &Certificate) -> Result<(), Error> {
        let mut hash = [0u8; 64];
        let len = Md::hash(self.digest, &self.tbs, &mut hash)?;
        let mut issuer = issuer.to_mbedtls()?;
        issuer.public_key_mut().verify(self.digest, &hash[..len], &self.signature)?;
        Ok(())
    }

    pub(crate) fn to_mbedtls(&self) -> Result<MbedtlsCrl, Error> {
        match &self.pem {
            Some(pem) => pem_to_mbedtls(pem),
            None => der_to_mbedtls(&self.der),
        }
    }
}
