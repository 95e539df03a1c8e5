/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use mbedtls::alloc::List as MbedtlsList;
use mbedtls::x509::certificate::Certificate as MbedtlsCertificate;

use crate::{Certificate, Crl, Diagnostics, Error};

/// Trust anchors for a single verification call. Every certificate handed to
/// the store is trusted, so intermediates need not chain up to a root.
#[derive(Clone, Debug)]
pub struct TrustStore {
    anchors: Vec<Certificate>,
    crl: Option<Crl>,
}

impl TrustStore {
    pub fn new(chain: &[Certificate]) -> Result<Self, Error> {
        if chain.is_empty() {
            return Err(Error::MissingCaChain);
        }
        Ok(TrustStore {
            anchors: chain.to_vec(),
            crl: None,
        })
    }

    /// Also reject certificates revoked by `crl` during path validation.
    pub fn with_crl(mut self, crl: Crl) -> Self {
        self.crl = Some(crl);
        self
    }

    pub fn anchors(&self) -> &[Certificate] {
        &self.anchors
    }

    /// X.509 path validation of `cert` against the anchors of this store.
    pub fn verify_certificate(&self, cert: &Certificate, diagnostics: &mut Diagnostics) -> bool {
        match self.try_verify(cert) {
            Ok(()) => {
                debug!("`{}` verified against the trust store", cert.subject().label());
                true
            }
            Err(e) => {
                diagnostics.push(format!("Could not verify `{}` using the trust chain: {}", cert.subject().label(), e));
                false
            }
        }
    }

    /// Verifies every certificate in `certs`, stopping at the first failure.
    pub fn verify_certificates(&self, certs: &[Certificate], diagnostics: &mut Diagnostics) -> bool {
        certs.iter().all(|cert| self.verify_certificate(cert, diagnostics))
    }

    fn try_verify(&self, cert: &Certificate) -> Result<(), Error> {
        let chain: MbedtlsList<MbedtlsCertificate> = std::iter::once(cert.to_mbedtls()?).collect();
        let trust: MbedtlsList<MbedtlsCertificate> = self
            .anchors
            .iter()
            .map(Certificate::to_mbedtls)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .collect();
        let mut crl = match &self.crl {
            Some(crl) => Some(crl.to_mbedtls()?),
            None => None,
        };
        let mut err = String::default();
        MbedtlsCertificate::verify(&chain, &trust, crl.as_mut(), Some(&mut err))
            .map_err(|e| Error::InvalidCertificate(format!("{} {}", e, err.trim())))
    }
}

/// Verifies a CRL against its issuer chain (root first). The last certificate
/// is taken as the CRL issuer and must verify against the others, the CRL
/// signature must verify with its key, and the CRL issuer name must equal its
/// subject. All checks run; their diagnostics accumulate.
pub fn verify_crl_trust(chain: &[Certificate], crl: &Crl, diagnostics: &mut Diagnostics) -> bool {
    let (issuer, rest) = match chain.split_last() {
        Some(split) => split,
        None => {
            diagnostics.push("CRL issuer chain is empty");
            return false;
        }
    };

    let issuer_trusted = match TrustStore::new(rest) {
        Ok(store) => store.verify_certificate(issuer, diagnostics),
        Err(_) => {
            diagnostics.push(format!(
                "No certificates left to verify the CRL issuer `{}` against",
                issuer.subject().label()
            ));
            false
        }
    };
    if !issuer_trusted {
        diagnostics.push("Could not verify CRL signing certificate");
    }

    let signature_valid = crl.verify_signature(issuer, diagnostics);

    let issuer_matches = crl.issuer() == issuer.subject();
    if !issuer_matches {
        diagnostics.push(format!(
            "CRL issuer `{}` does not match the subject of `{}`",
            crl.issuer(),
            issuer.subject()
        ));
    }

    let trusted = issuer_trusted && signature_valid && issuer_matches;
    if trusted {
        info!("CRL issued by `{}` verified", issuer.subject().label());
    }
    trusted
}
