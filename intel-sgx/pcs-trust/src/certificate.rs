/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use mbedtls::alloc::Box as MbedtlsBox;
use mbedtls::x509::certificate::Certificate as MbedtlsCertificate;
use pkix::pem::{self, PEM_CERTIFICATE};
use pkix::types::ObjectIdentifier;
use pkix::x509::GenericCertificate;
use pkix::FromBer;
use yasna::tags::TAG_UTF8STRING;

use crate::chain::ChainLink;
use crate::oid;
use crate::{der_elements, Error};

/// An X.501 distinguished name.
///
/// Two names are equal when their DER encodings are equal. The decoded
/// attributes only serve lookups and diagnostics.
#[derive(Clone, Debug)]
pub struct DistinguishedName {
    der: Vec<u8>,
    attributes: Vec<(ObjectIdentifier, String)>,
}

impl DistinguishedName {
    /// Encodes a name with one UTF8String attribute per relative
    /// distinguished name, in the order given.
    pub fn new(attributes: &[(&ObjectIdentifier, &str)]) -> Self {
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                for (oid, value) in attributes {
                    writer.next().write_set(|writer| {
                        writer.next().write_sequence(|writer| {
                            writer.next().write_oid(oid);
                            writer
                                .next()
                                .write_tagged_implicit(TAG_UTF8STRING, |writer| writer.write_bytes(value.as_bytes()));
                        })
                    })
                }
            })
        });
        DistinguishedName {
            der,
            attributes: attributes.iter().map(|(oid, value)| ((*oid).clone(), value.to_string())).collect(),
        }
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        yasna::parse_der(der, |reader| {
            reader.read_sequence_of(|reader| {
                reader.read_set_of(|reader| {
                    let attribute = reader.read_sequence(|reader| {
                        let oid = reader.next().read_oid()?;
                        let value = reader.next().read_tagged_der()?;
                        Ok((oid, String::from_utf8_lossy(value.value()).into_owned()))
                    })?;
                    attributes.push(attribute);
                    Ok(())
                })
            })
        })?;
        Ok(DistinguishedName {
            der: der.to_vec(),
            attributes,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn attributes(&self) -> &[(ObjectIdentifier, String)] {
        &self.attributes
    }

    /// First value of the attribute `oid`.
    pub fn get(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == oid)
            .map(|(_, value)| value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(&oid::commonName)
    }

    pub fn organization(&self) -> Option<&str> {
        self.get(&oid::organizationName)
    }

    /// Common name if present, the full name otherwise. Used in messages.
    pub(crate) fn label(&self) -> String {
        match self.common_name() {
            Some(cn) => cn.to_string(),
            None => self.to_string(),
        }
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.der.hash(state)
    }
}

impl Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let attributes = self
            .attributes
            .iter()
            .map(|(oid, value)| format!("{}={}", oid::attribute_short_name(oid), value))
            .collect::<Vec<_>>();
        write!(f, "{}", attributes.join(", "))
    }
}

/// A parsed X.509 certificate. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: DistinguishedName,
    issuer: DistinguishedName,
}

impl Certificate {
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let der = pem::pem_to_der(pem.trim(), Some(PEM_CERTIFICATE))
            .ok_or(Error::InvalidCertificate("not a PEM encoded certificate".into()))?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        // Reject anything the X.509 layer would refuse during verification
        MbedtlsCertificate::from_der(der).map_err(|e| Error::InvalidCertificate(e.to_string()))?;
        GenericCertificate::from_ber(der).map_err(|e| Error::InvalidCertificate(e.to_string()))?;

        let certificate = der_elements(der)?;
        let tbs = certificate
            .first()
            .ok_or(Error::InvalidCertificate("empty certificate".into()))?;
        let fields = der_elements(tbs)?;
        // TBSCertificate starts with an optional [0] EXPLICIT version
        let offset = match fields.first() {
            Some(version) if version.first() == Some(&0xa0) => 1,
            _ => 0,
        };
        let name = |index: usize| -> Result<DistinguishedName, Error> {
            let der = fields
                .get(offset + index)
                .ok_or(Error::InvalidCertificate("truncated TBSCertificate".into()))?;
            DistinguishedName::from_der(der)
        };
        let issuer = name(2)?;
        let subject = name(4)?;

        Ok(Certificate {
            der: der.to_vec(),
            subject,
            issuer,
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        pem::der_to_pem(&self.der, PEM_CERTIFICATE)
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// Value of the extension `oid`, if the certificate carries it.
    pub fn extension(&self, oid: &ObjectIdentifier) -> Result<Option<Vec<u8>>, Error> {
        let cert = GenericCertificate::from_ber(&self.der)?;
        Ok(cert.tbscert.get_extension(oid).map(|extension| extension.value))
    }

    pub(crate) fn to_mbedtls(&self) -> Result<MbedtlsBox<MbedtlsCertificate>, Error> {
        Ok(MbedtlsCertificate::from_der(&self.der)?)
    }
}

impl ChainLink for Certificate {
    fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }
}
