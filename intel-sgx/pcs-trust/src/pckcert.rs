/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::convert::TryFrom;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use yasna::models::TaggedDerValue;
use yasna::{PCBit, Tag};

use crate::extension::{decode_extension, ExtensionTree, FieldValue};
use crate::oid::{self, SGX_EXTENSION};
use crate::{der_elements, split_der_contents, Certificate, DistinguishedName, Error};

/// The intermediate CA that issued a PCK certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PckCa {
    Processor,
    Platform,
}

impl PckCa {
    /// Classifies an issuer by the CA naming convention of the PCS.
    pub fn from_issuer(issuer: &DistinguishedName) -> Option<PckCa> {
        let issuer = issuer.to_string();
        if issuer.contains("Processor") {
            Some(PckCa::Processor)
        } else if issuer.contains("Platform") {
            Some(PckCa::Platform)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PckCa::Processor => "PROCESSOR",
            PckCa::Platform => "PLATFORM",
        }
    }
}

impl Display for PckCa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SgxType {
    Standard,
    Scalable,
    ScalableWithIntegrity,
}

impl TryFrom<i64> for SgxType {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SgxType::Standard),
            1 => Ok(SgxType::Scalable),
            2 => Ok(SgxType::ScalableWithIntegrity),
            _ => Err(Error::InvalidCertificate(format!("unknown SGX type {}", value))),
        }
    }
}

/// Platform configuration flags of a Platform CA issued PCK certificate.
/// Absent flags read as `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlatformConfiguration {
    pub dynamic_platform: bool,
    pub cached_keys: bool,
    pub smt_enabled: bool,
}

/// Named view over the SGX extension of a PCK certificate.
///
/// Every accessor returns `None` when the certificate has no SGX extension or
/// the field is missing. Hex output is lowercase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PckExtension {
    tree: ExtensionTree,
    issuer: Option<DistinguishedName>,
}

impl PckExtension {
    pub fn from_certificate(cert: &Certificate) -> Result<Self, Error> {
        let tree = match cert.extension(&SGX_EXTENSION)? {
            Some(der) => decode_extension(&der)?,
            None => {
                debug!("certificate `{}` has no SGX extension", cert.subject().label());
                ExtensionTree::default()
            }
        };
        Ok(PckExtension {
            tree,
            issuer: Some(cert.issuer().clone()),
        })
    }

    pub fn from_extension_der(der: &[u8]) -> Result<Self, Error> {
        Ok(PckExtension {
            tree: decode_extension(der)?,
            issuer: None,
        })
    }

    pub fn tree(&self) -> &ExtensionTree {
        &self.tree
    }

    fn bytes(&self, path: &[&str]) -> Option<&[u8]> {
        self.tree.get(path).and_then(FieldValue::as_bytes)
    }

    fn integer(&self, path: &[&str]) -> Option<i64> {
        self.tree.get(path).and_then(FieldValue::as_integer)
    }

    fn hex(&self, path: &[&str]) -> Option<String> {
        self.bytes(path).map(base16::encode_lower)
    }

    pub fn fmspc(&self) -> Option<String> {
        self.hex(&[oid::FMSPC])
    }

    pub fn pce_id(&self) -> Option<String> {
        self.hex(&[oid::PCE_ID])
    }

    pub fn ppid(&self) -> Option<String> {
        self.hex(&[oid::PPID])
    }

    pub fn cpusvn(&self) -> Option<String> {
        self.hex(&[oid::TCB, oid::TCB_CPUSVN])
    }

    /// PCE-SVN as two little-endian bytes in hex, `7` gives `"0700"`.
    pub fn pcesvn(&self) -> Option<String> {
        let pcesvn = u16::try_from(self.integer(&[oid::TCB, oid::TCB_PCESVN])?).ok()?;
        Some(base16::encode_lower(&pcesvn.to_le_bytes()))
    }

    /// CPU-SVN followed by PCE-SVN, the TCB identifier used by the PCS.
    pub fn tcbm(&self) -> Option<String> {
        Some(self.cpusvn()? + &self.pcesvn()?)
    }

    pub fn tcb_components(&self) -> Option<[u8; 16]> {
        let mut components = [0u8; 16];
        for (i, component) in components.iter_mut().enumerate() {
            let name = oid::tcb_component_field(i + 1)?;
            *component = u8::try_from(self.integer(&[oid::TCB, name])?).ok()?;
        }
        Some(components)
    }

    pub fn sgx_type(&self) -> Option<SgxType> {
        SgxType::try_from(self.integer(&[oid::SGX_TYPE])?).ok()
    }

    pub fn platform_instance_id(&self) -> Option<String> {
        self.hex(&[oid::PLATFORM_INSTANCE_ID])
    }

    pub fn configuration(&self) -> Option<PlatformConfiguration> {
        let configuration = self.tree.get(&[oid::CONFIGURATION])?.as_map()?;
        let flag = |name: &str| configuration.get(name).and_then(FieldValue::as_bool).unwrap_or(false);
        Some(PlatformConfiguration {
            dynamic_platform: flag(oid::CONFIGURATION_DYNAMIC_PLATFORM),
            cached_keys: flag(oid::CONFIGURATION_CACHED_KEYS),
            smt_enabled: flag(oid::CONFIGURATION_SMT_ENABLED),
        })
    }

    /// The CA that issued the certificate, unknown for a bare extension.
    pub fn ca(&self) -> Option<PckCa> {
        PckCa::from_issuer(self.issuer.as_ref()?)
    }
}

// Context tags of `DistributionPoint.distributionPoint`,
// `DistributionPointName.fullName` and `GeneralName.uniformResourceIdentifier`
const DISTRIBUTION_POINT_TAG: u64 = 0;
const FULL_NAME_TAG: u64 = 0;
const URI_TAG: u64 = 6;

/// First URI listed in the CRL distribution points of the PEM certificate
/// `pem`, typically the Root CA CRL when called on the root certificate.
pub fn root_ca_crl_url(pem: &str) -> Result<Option<String>, Error> {
    let cert = Certificate::from_pem(pem)?;
    match cert.extension(&oid::crlDistributionPoints)? {
        Some(der) => find_uri(&der),
        None => Ok(None),
    }
}

fn tagged(der: &[u8]) -> Result<TaggedDerValue, Error> {
    Ok(yasna::parse_der(der, |reader| reader.read_tagged_der())?)
}

fn is_context(value: &TaggedDerValue, tag: u64, pcbit: PCBit) -> bool {
    value.tag() == Tag::context(tag) && value.pcbit() == pcbit
}

/// Walks `SEQUENCE OF DistributionPoint` down to the `fullName` general
/// names. Only that fixed shape is read, nothing else is descended into.
fn find_uri(der: &[u8]) -> Result<Option<String>, Error> {
    for point in der_elements(der)? {
        for field in der_elements(&point)? {
            let field = tagged(&field)?;
            if !is_context(&field, DISTRIBUTION_POINT_TAG, PCBit::Constructed) {
                continue;
            }
            let name = tagged(field.value())?;
            if !is_context(&name, FULL_NAME_TAG, PCBit::Constructed) {
                continue;
            }
            for general_name in split_der_contents(name.value())? {
                let general_name = tagged(&general_name)?;
                if is_context(&general_name, URI_TAG, PCBit::Primitive) {
                    return Ok(Some(String::from_utf8_lossy(general_name.value()).into_owned()));
                }
            }
        }
    }
    Ok(None)
}

/// Uppercase hex of the 16 component SVNs of a TCB object from a PCK
/// certificates listing (`{"sgxtcbcomp01svn": .., "pcesvn": ..}`).
pub fn cpusvn_from_tcb(tcb: &serde_json::Value) -> Result<String, Error> {
    let mut cpusvn = String::with_capacity(32);
    for i in 1..=16 {
        let key = format!("sgxtcbcomp{:02}svn", i);
        let svn = tcb
            .get(&key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|svn| u8::try_from(svn).ok())
            .ok_or_else(|| Error::InvalidTcb(format!("missing or invalid `{}`", key)))?;
        cpusvn.push_str(&format!("{:02X}", svn));
    }
    Ok(cpusvn)
}
