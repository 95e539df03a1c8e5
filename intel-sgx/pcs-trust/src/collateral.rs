/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Verification of complete PCS responses.
//!
//! Each function takes the response headers and body of one PCS request,
//! rebuilds the issuer chain from the matching header and authenticates the
//! artifact against it. A response that fails any check is reported as
//! [`Error::Untrusted`] with every reason collected along the way.

use percent_encoding::percent_decode;
use pkix::pem::{self, PEM_CERTIFICATE};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pckcert::{cpusvn_from_tcb, PckCa, PckExtension};
use crate::pem::{
    parse_issuer_header, ENCLAVE_ID_ISSUER_CHAIN_HEADER, PCK_CERTIFICATE_ISSUER_CHAIN_HEADER,
    PCK_CRL_ISSUER_CHAIN_HEADER, TCB_INFO_ISSUER_CHAIN_HEADER_V3, TCB_INFO_ISSUER_CHAIN_HEADER_V4,
};
use crate::signature::SignedPayload;
use crate::store::{verify_crl_trust, TrustStore};
use crate::{sort_chain, Certificate, Crl, Diagnostics, Error};

const NOT_AVAILABLE: &'static str = "Not available";
const TCB_INFO_FIELD: &'static str = "tcbInfo";
const ENCLAVE_IDENTITY_FIELD: &'static str = "enclaveIdentity";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcsVersion {
    V3 = 3,
    V4 = 4,
}

impl PcsVersion {
    pub fn tcb_info_issuer_chain_header(&self) -> &'static str {
        match self {
            PcsVersion::V3 => TCB_INFO_ISSUER_CHAIN_HEADER_V3,
            PcsVersion::V4 => TCB_INFO_ISSUER_CHAIN_HEADER_V4,
        }
    }
}

fn default_enforce_crl() -> bool {
    true
}

fn pem_certificates<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    let pems = Vec::<String>::deserialize(deserializer)?;
    pems.iter()
        .map(|pem| {
            pem::pem_to_der(pem.trim(), Some(PEM_CERTIFICATE))
                .ok_or_else(|| de::Error::custom("trusted root is not a PEM encoded certificate"))
        })
        .collect()
}

/// Options of a [`CollateralVerifier`]. Can be loaded from JSON, where the
/// trusted roots are given as PEM strings.
#[derive(Clone, Debug, Deserialize)]
pub struct CollateralVerifierBuilder {
    version: PcsVersion,
    #[serde(default, deserialize_with = "pem_certificates")]
    trusted_roots: Vec<Vec<u8>>,
    #[serde(default = "default_enforce_crl")]
    enforce_crl: bool,
}

impl CollateralVerifierBuilder {
    pub fn new(version: PcsVersion) -> Self {
        CollateralVerifierBuilder {
            version,
            trusted_roots: Vec::new(),
            enforce_crl: default_enforce_crl(),
        }
    }

    /// DER encoded root certificates. When non-empty, the root of every issuer
    /// chain must verify against one of them.
    pub fn set_trusted_roots(mut self, trusted_roots: Vec<Vec<u8>>) -> Self {
        self.trusted_roots = trusted_roots;
        self
    }

    /// Whether a PCK CRL handed to the PCK certificate checks is used to
    /// reject revoked certificates.
    pub fn set_enforce_crl(mut self, enforce_crl: bool) -> Self {
        self.enforce_crl = enforce_crl;
        self
    }

    pub fn build(self) -> Result<CollateralVerifier, Error> {
        let trusted_roots = self
            .trusted_roots
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CollateralVerifier {
            version: self.version,
            trusted_roots,
            enforce_crl: self.enforce_crl,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CollateralVerifier {
    version: PcsVersion,
    trusted_roots: Vec<Certificate>,
    enforce_crl: bool,
}

#[derive(Clone, Debug)]
pub struct VerifiedPckCert {
    pub cert: Certificate,
    /// Issuer chain, root first.
    pub chain: Vec<Certificate>,
    pub extension: PckExtension,
}

impl VerifiedPckCert {
    pub fn ca(&self) -> Option<PckCa> {
        self.extension.ca()
    }
}

#[derive(Clone, Debug)]
pub struct PckCertsEntry {
    pub tcb: Value,
    pub tcbm: String,
    pub cert: Certificate,
}

/// A TCB level the PCS has no PCK certificate for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnavailablePckCert {
    pub cpu_svn: String,
    pub pce_svn: String,
}

#[derive(Clone, Debug)]
pub struct VerifiedPckCerts {
    pub available: Vec<PckCertsEntry>,
    pub unavailable: Vec<UnavailablePckCert>,
    pub chain: Vec<Certificate>,
}

/// A signed JSON document (TCB info or enclave identity) whose signature and
/// signer were verified.
#[derive(Clone, Debug)]
pub struct SignedCollateral {
    pub body: String,
    /// The signed part of `body`, byte for byte.
    pub signed: String,
    /// Issuer chain, root first. The last certificate is the signer.
    pub chain: Vec<Certificate>,
}

impl SignedCollateral {
    pub fn payload(&self) -> Result<Value, Error> {
        Ok(serde_json::from_str(&self.signed)?)
    }

    pub fn signer(&self) -> Option<&Certificate> {
        self.chain.last()
    }
}

#[derive(Deserialize)]
struct PckCertsItem {
    tcb: Value,
    #[serde(default)]
    tcbm: String,
    cert: String,
}

fn pce_svn(tcb: &Value) -> Result<String, Error> {
    tcb.get("pcesvn")
        .and_then(Value::as_u64)
        .map(|svn| svn.to_string())
        .ok_or_else(|| Error::InvalidTcb("missing or invalid `pcesvn`".into()))
}

fn trusted(diagnostics: Diagnostics, ok: bool) -> Result<(), Error> {
    if ok && diagnostics.is_empty() {
        Ok(())
    } else {
        Err(Error::Untrusted(diagnostics))
    }
}

impl CollateralVerifier {
    pub fn version(&self) -> PcsVersion {
        self.version
    }

    /// Parses and sorts the issuer chain in `header`.
    fn issuer_chain(&self, headers: &[(String, String)], header: &'static str) -> Result<Vec<Certificate>, Error> {
        let chain = parse_issuer_header(headers, header)?
            .iter()
            .map(|pem| Certificate::from_pem(pem))
            .collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(Error::MissingCaChain);
        }
        sort_chain(chain)
    }

    fn check_root(&self, chain: &[Certificate], diagnostics: &mut Diagnostics) -> bool {
        if self.trusted_roots.is_empty() {
            return true;
        }
        let root = match chain.first() {
            Some(root) => root,
            None => {
                diagnostics.push("Issuer chain is empty");
                return false;
            }
        };
        let matches = self.trusted_roots.iter().any(|trusted| {
            let mut ignored = Diagnostics::new();
            TrustStore::new(std::slice::from_ref(trusted))
                .map(|store| store.verify_certificate(root, &mut ignored))
                .unwrap_or(false)
        });
        if !matches {
            diagnostics.push(format!("Chain root `{}` is not signed by a trusted root", root.subject().label()));
        }
        matches
    }

    fn pck_store(&self, chain: &[Certificate], crl: Option<&Crl>) -> Result<TrustStore, Error> {
        let store = TrustStore::new(chain)?;
        Ok(match crl {
            Some(crl) if self.enforce_crl => store.with_crl(crl.clone()),
            _ => store,
        })
    }

    /// Verifies a single PEM encoded PCK certificate.
    pub fn verify_pck_cert(&self, headers: &[(String, String)], body: &str, crl: Option<&Crl>) -> Result<VerifiedPckCert, Error> {
        let chain = self.issuer_chain(headers, PCK_CERTIFICATE_ISSUER_CHAIN_HEADER)?;
        let cert = Certificate::from_pem(body)?;

        let mut diagnostics = Diagnostics::new();
        let root_trusted = self.check_root(&chain, &mut diagnostics);
        let cert_trusted = self.pck_store(&chain, crl)?.verify_certificate(&cert, &mut diagnostics);
        trusted(diagnostics, root_trusted && cert_trusted)?;

        let extension = PckExtension::from_certificate(&cert)?;
        info!("PCK certificate `{}` verified", cert.subject().label());
        Ok(VerifiedPckCert { cert, chain, extension })
    }

    /// Verifies a PCK certificates listing, a JSON array of
    /// `{"tcb": .., "tcbm": .., "cert": ..}` with percent-encoded PEM
    /// certificates. Entries without a certificate are returned separately.
    pub fn verify_pck_certs(&self, headers: &[(String, String)], body: &str, crl: Option<&Crl>) -> Result<VerifiedPckCerts, Error> {
        let chain = self.issuer_chain(headers, PCK_CERTIFICATE_ISSUER_CHAIN_HEADER)?;
        let items: Vec<PckCertsItem> = serde_json::from_str(body)?;

        let mut available = Vec::new();
        let mut unavailable = Vec::new();
        for item in items {
            if item.cert == NOT_AVAILABLE {
                unavailable.push(UnavailablePckCert {
                    cpu_svn: cpusvn_from_tcb(&item.tcb)?,
                    pce_svn: pce_svn(&item.tcb)?,
                });
            } else {
                let pem = percent_decode(item.cert.as_bytes())
                    .decode_utf8()
                    .map_err(|_| Error::InvalidCertificate("PCK certificate is not valid UTF-8".into()))?;
                available.push(PckCertsEntry {
                    tcb: item.tcb,
                    tcbm: item.tcbm,
                    cert: Certificate::from_pem(&pem)?,
                });
            }
        }
        if !unavailable.is_empty() {
            debug!("{} TCB level(s) without PCK certificate", unavailable.len());
        }

        let mut diagnostics = Diagnostics::new();
        let root_trusted = self.check_root(&chain, &mut diagnostics);
        let certs = available.iter().map(|entry| entry.cert.clone()).collect::<Vec<_>>();
        let certs_trusted = self.pck_store(&chain, crl)?.verify_certificates(&certs, &mut diagnostics);
        trusted(diagnostics, root_trusted && certs_trusted)?;

        info!("{} PCK certificate(s) verified", available.len());
        Ok(VerifiedPckCerts {
            available,
            unavailable,
            chain,
        })
    }

    /// Verifies a PCK CRL, PEM or DER encoded.
    pub fn verify_pck_crl(&self, headers: &[(String, String)], body: &[u8]) -> Result<Crl, Error> {
        let chain = self.issuer_chain(headers, PCK_CRL_ISSUER_CHAIN_HEADER)?;
        let crl = Crl::parse(body)?;

        let mut diagnostics = Diagnostics::new();
        let root_trusted = self.check_root(&chain, &mut diagnostics);
        let crl_trusted = verify_crl_trust(&chain, &crl, &mut diagnostics);
        trusted(diagnostics, root_trusted && crl_trusted)?;
        Ok(crl)
    }

    pub fn verify_tcb_info(&self, headers: &[(String, String)], body: &str) -> Result<SignedCollateral, Error> {
        self.verify_signed(headers, self.version.tcb_info_issuer_chain_header(), body, TCB_INFO_FIELD)
    }

    pub fn verify_enclave_identity(&self, headers: &[(String, String)], body: &str) -> Result<SignedCollateral, Error> {
        self.verify_signed(headers, ENCLAVE_ID_ISSUER_CHAIN_HEADER, body, ENCLAVE_IDENTITY_FIELD)
    }

    fn verify_signed(
        &self,
        headers: &[(String, String)],
        header: &'static str,
        body: &str,
        field: &str,
    ) -> Result<SignedCollateral, Error> {
        let chain = self.issuer_chain(headers, header)?;
        let (signer, issuers) = chain.split_last().ok_or(Error::MissingCaChain)?;

        let mut diagnostics = Diagnostics::new();
        let root_trusted = self.check_root(&chain, &mut diagnostics);
        let signer_trusted = match TrustStore::new(issuers) {
            Ok(store) => store.verify_certificate(signer, &mut diagnostics),
            Err(_) => {
                diagnostics.push(format!(
                    "No certificates left to verify the signer `{}` against",
                    signer.subject().label()
                ));
                false
            }
        };

        let payload = SignedPayload::from_body(body, field, signer.clone())?;
        let signature_valid = payload.verify(&mut diagnostics);
        trusted(diagnostics, root_trusted && signer_trusted && signature_valid)?;

        info!("`{}` signed by `{}` verified", field, signer.subject().label());
        let signed = String::from_utf8_lossy(payload.message()).into_owned();
        Ok(SignedCollateral {
            body: body.to_string(),
            signed,
            chain,
        })
    }
}
