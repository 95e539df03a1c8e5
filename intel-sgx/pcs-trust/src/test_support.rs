/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Fixtures shared by the unit tests: real Intel PCK certificates, a small
//! P-256 PKI generated on the fly and hand-built SGX extensions.

use mbedtls::hash::{Md, Type};
use mbedtls::pk::{EcGroupId, Pk};
use mbedtls::rng::Rdrand;
use mbedtls::x509::certificate::Builder;
use mbedtls::x509::Time;
use pkix::types::ObjectIdentifier;

use crate::oid::{self, SGX_EXTENSION};
use crate::Certificate;

// PCK certificate issued by the Intel SGX PCK Processor CA (SGX type Standard)
pub const PROCESSOR_PCK_PEM: &'static str = concat!(
    "-----BEGIN CERTIFICATE-----\n",
    "MIIEjDCCBDKgAwIBAgIVALonBDd14S/1zfdU+ZtfOsI+ngLVMAoGCCqGSM49BAMC\n",
    "MHExIzAhBgNVBAMMGkludGVsIFNHWCBQQ0sgUHJvY2Vzc29yIENBMRowGAYDVQQK\n",
    "DBFJbnRlbCBDb3Jwb3JhdGlvbjEUMBIGA1UEBwwLU2FudGEgQ2xhcmExCzAJBgNV\n",
    "BAgMAkNBMQswCQYDVQQGEwJVUzAeFw0xOTA5MDUwNzQ3MDZaFw0yNjA5MDUwNzQ3\n",
    "MDZaMHAxIjAgBgNVBAMMGUludGVsIFNHWCBQQ0sgQ2VydGlmaWNhdGUxGjAYBgNV\n",
    "BAoMEUludGVsIENvcnBvcmF0aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkG\n",
    "A1UECAwCQ0ExCzAJBgNVBAYTAlVTMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE\n",
    "ZbnHpHbJ8kqQgySEX0M+qzcWpLAj6RcLi7vYKWqtityqaCWciAXHxlJvCJ1Kr35Y\n",
    "mWlpekwiEjo+XlEmg+NQVKOCAqYwggKiMB8GA1UdIwQYMBaAFJ8Gl+9TIUTU+kx+\n",
    "6LqNs9Ml5JKQMGsGA1UdHwRkMGIwYKBeoFyGWmh0dHBzOi8vZmFrZS1jcmwtZGlz\n",
    "dHJpYnV0aW9uLXBvaW50LXVybC5pbnRlbC5jb20vc2d4L2NlcnRpZmljYXRpb24v\n",
    "djIvcGNrY3JsP2NhPXByb2Nlc3NvcjAdBgNVHQ4EFgQUEULjJXxk96LC2FJd13qm\n",
    "5pKzckEwDgYDVR0PAQH/BAQDAgbAMAwGA1UdEwEB/wQCMAAwggHTBgkqhkiG+E0B\n",
    "DQEEggHEMIIBwDAeBgoqhkiG+E0BDQEBBBCEYYY7t+zjH2TI6bd/0xytMIIBYwYK\n",
    "KoZIhvhNAQ0BAjCCAVMwEAYLKoZIhvhNAQ0BAgECAQAwEAYLKoZIhvhNAQ0BAgIC\n",
    "AQMwEAYLKoZIhvhNAQ0BAgMCAQAwEAYLKoZIhvhNAQ0BAgQCAQAwEAYLKoZIhvhN\n",
    "AQ0BAgUCAQAwEAYLKoZIhvhNAQ0BAgYCAQEwEAYLKoZIhvhNAQ0BAgcCAQEwEAYL\n",
    "KoZIhvhNAQ0BAggCAQAwEAYLKoZIhvhNAQ0BAgkCAQAwEAYLKoZIhvhNAQ0BAgoC\n",
    "AQAwEAYLKoZIhvhNAQ0BAgsCAQAwEAYLKoZIhvhNAQ0BAgwCAQAwEAYLKoZIhvhN\n",
    "AQ0BAg0CAQAwEAYLKoZIhvhNAQ0BAg4CAQAwEAYLKoZIhvhNAQ0BAg8CAQAwEAYL\n",
    "KoZIhvhNAQ0BAhACAQAwEAYLKoZIhvhNAQ0BAhECAQMwHwYLKoZIhvhNAQ0BAhIE\n",
    "EAADAAAAAQEAAAAAAAAAAAAwEAYKKoZIhvhNAQ0BAwQCAAAwFAYKKoZIhvhNAQ0B\n",
    "BAQGAHB/AAAAMA8GCiqGSIb4TQENAQUKAQAwCgYIKoZIzj0EAwIDSAAwRQIhANmr\n",
    "mwJgah3SFMDCv7/JvCW8GsB0fIuhbHQtXRO0KN0WAiAsAY5USoy5uk0B7/sVEvng\n",
    "ILOJfSqEZlN7hTCJpjcEgw==\n",
    "-----END CERTIFICATE-----\n",
);

// PCK certificate issued by the Intel SGX PCK Platform CA (SGX type Scalable)
pub const PLATFORM_PCK_PEM: &'static str = concat!(
    "-----BEGIN CERTIFICATE-----\n",
    "MIIE8jCCBJigAwIBAgIVAL2ntN6oDXniW91PanIORAaYoA12MAoGCCqGSM49BAMCMHAxIjAgBgNV\n",
    "BAMMGUludGVsIFNHWCBQQ0sgUGxhdGZvcm0gQ0ExGjAYBgNVBAoMEUludGVsIENvcnBvcmF0aW9u\n",
    "MRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJBgNVBAYTAlVTMB4XDTIwMDMx\n",
    "ODA5MzA0OVoXDTI3MDMxODA5MzA0OVowcDEiMCAGA1UEAwwZSW50ZWwgU0dYIFBDSyBDZXJ0aWZp\n",
    "Y2F0ZTEaMBgGA1UECgwRSW50ZWwgQ29ycG9yYXRpb24xFDASBgNVBAcMC1NhbnRhIENsYXJhMQsw\n",
    "CQYDVQQIDAJDQTELMAkGA1UEBhMCVVMwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAASF0WfF3Bu6\n",
    "Ds3AAqfzKp4te+4FWvddvTVr5uHdszbvloIOTOgq6HIob0D/QZtyeeUBOKOM1Dq3mi1DWgAbVdkL\n",
    "o4IDDTCCAwkwHwYDVR0jBBgwFoAU7bmCA3TzblbsRZSTub7BGnDEPbQwYgYDVR0fBFswWTBXoFWg\n",
    "U4ZRaHR0cHM6Ly9wcmUxMy1ncmVlbi1wY3Muc2d4bnAuYWRzZGNzcC5jb20vc2d4L2NlcnRpZmlj\n",
    "YXRpb24vdjEvcGNrY3JsP2NhPXBsYXRmb3JtMB0GA1UdDgQWBBR3DHSU0wR85z1ekrDGwC8ckFB3\n",
    "WjAOBgNVHQ8BAf8EBAMCBsAwDAYDVR0TAQH/BAIwADCCAkMGCSqGSIb4TQENAQSCAjQwggIwMB4G\n",
    "CiqGSIb4TQENAQEEEDcDl5X+CwarSOOPiYq5LO8wggFtBgoqhkiG+E0BDQECMIIBXTAQBgsqhkiG\n",
    "+E0BDQECAQIBADAQBgsqhkiG+E0BDQECAgIBQzARBgsqhkiG+E0BDQECAwICAMcwEAYLKoZIhvhN\n",
    "AQ0BAgQCAVwwEQYLKoZIhvhNAQ0BAgUCAgDXMBEGCyqGSIb4TQENAQIGAgIAtDAQBgsqhkiG+E0B\n",
    "DQECBwIBOzARBgsqhkiG+E0BDQECCAICAK0wEAYLKoZIhvhNAQ0BAgkCAU4wEQYLKoZIhvhNAQ0B\n",
    "AgoCAgC/MBEGCyqGSIb4TQENAQILAgIAvjAQBgsqhkiG+E0BDQECDAIBQzARBgsqhkiG+E0BDQEC\n",
    "DQICANUwEAYLKoZIhvhNAQ0BAg4CAV8wEAYLKoZIhvhNAQ0BAg8CATQwEQYLKoZIhvhNAQ0BAhAC\n",
    "AgClMBIGCyqGSIb4TQENAQIRAgMA2GQwHwYLKoZIhvhNAQ0BAhIEEABDx1zXtDutTr++Q9VfNKUw\n",
    "EAYKKoZIhvhNAQ0BAwQCAAAwFAYKKoZIhvhNAQ0BBAQGEEdcDQAAMA8GCiqGSIb4TQENAQUKAQEw\n",
    "HgYKKoZIhvhNAQ0BBgQQ80TO9xJaqXgYpFUT9hf90jBEBgoqhkiG+E0BDQEHMDYwEAYLKoZIhvhN\n",
    "AQ0BBwEBAf8wEAYLKoZIhvhNAQ0BBwIBAf8wEAYLKoZIhvhNAQ0BBwMBAQAwCgYIKoZIzj0EAwID\n",
    "SAAwRQIgIwVrUZy1o//8kKk3NWmz5VhH9ppS+tzIbRdckz8psoMCIQD+pl4qgmoUsoz83e8HfRSR\n",
    "t1Uz20ThyeYg0+3EEXn5OA==\n",
    "-----END CERTIFICATE-----\n",
);

pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// OID below the SGX extension root, e.g. `sgx_oid(&[2, 17])` for PCE-SVN.
pub fn sgx_oid(suffix: &[u64]) -> ObjectIdentifier {
    let mut components = SGX_EXTENSION.components().clone();
    components.extend_from_slice(suffix);
    ObjectIdentifier::from(components)
}

/// Certificate together with the key it certifies and the name string used
/// to issue it.
pub struct TestCert {
    pub cert: Certificate,
    pub key: Pk,
    pub name: String,
}

impl TestCert {
    pub fn pem(&self) -> String {
        self.cert.to_pem()
    }
}

pub fn new_key() -> Pk {
    Pk::generate_ec(&mut Rdrand, EcGroupId::SecP256R1).unwrap()
}

fn validity() -> (Time, Time) {
    (Time::new(2020, 1, 1, 0, 0, 0).unwrap(), Time::new(2049, 12, 31, 23, 59, 59).unwrap())
}

fn build(subject_key: &mut Pk, subject: &str, issuer_key: &mut Pk, issuer: &str, serial: u8, ca: bool) -> Certificate {
    let (not_before, not_after) = validity();
    let subject = format!("{}\0", subject);
    let issuer = format!("{}\0", issuer);
    let mut builder = Builder::new();
    builder
        .subject_key(subject_key)
        .subject_with_nul(&subject)
        .unwrap()
        .issuer_key(issuer_key)
        .issuer_with_nul(&issuer)
        .unwrap()
        .validity(not_before, not_after)
        .unwrap()
        .serial(&[serial])
        .unwrap()
        .signature_hash(Type::Sha256);
    if ca {
        builder.basic_constraints(true, None).unwrap();
    }
    let der = builder.write_der_vec(&mut Rdrand).unwrap();
    Certificate::from_der(&der).unwrap()
}

/// Self-signed CA certificate, `name` in mbedtls notation (`CN=..,O=..`).
pub fn self_signed(name: &str, serial: u8) -> TestCert {
    let mut key = new_key();
    let mut public = Pk::from_public_key(&key.write_public_der_vec().unwrap()).unwrap();
    let cert = build(&mut public, name, &mut key, name, serial, true);
    TestCert {
        cert,
        key,
        name: name.to_string(),
    }
}

pub fn issue(issuer: &mut TestCert, name: &str, serial: u8, ca: bool) -> TestCert {
    let mut key = new_key();
    let cert = build(&mut key, name, &mut issuer.key, &issuer.name, serial, ca);
    TestCert {
        cert,
        key,
        name: name.to_string(),
    }
}

/// Root CA, intermediate CA and leaf, in that order.
pub fn pki(prefix: &str) -> (TestCert, TestCert, TestCert) {
    let mut root = self_signed(&format!("CN={} Root CA,O=Fortanix", prefix), 1);
    let mut intermediate = issue(&mut root, &format!("CN={} Processor CA,O=Fortanix", prefix), 2, true);
    let leaf = issue(&mut intermediate, &format!("CN={} Certificate,O=Fortanix", prefix), 3, false);
    (root, intermediate, leaf)
}

/// DER encoded ECDSA signature over SHA-256 of `message`.
pub fn sign(key: &mut Pk, message: &[u8]) -> Vec<u8> {
    let mut hash = [0u8; 32];
    Md::hash(Type::Sha256, message, &mut hash).unwrap();
    let mut signature = vec![0u8; 1024];
    let len = key.sign(Type::Sha256, &hash, &mut signature, &mut Rdrand).unwrap();
    signature.truncate(len);
    signature
}

/// Fixed width `r || s` form of a DER encoded P-256 signature.
pub fn raw_signature(der: &[u8]) -> Vec<u8> {
    let (r, s) = yasna::parse_der(der, |reader| {
        reader.read_sequence(|reader| {
            let r = reader.next().read_biguint()?;
            let s = reader.next().read_biguint()?;
            Ok((r, s))
        })
    })
    .unwrap();
    let mut raw = Vec::new();
    for component in &[r, s] {
        let bytes = component.to_bytes_be();
        raw.extend(std::iter::repeat(0u8).take(32 - bytes.len()));
        raw.extend_from_slice(&bytes);
    }
    raw
}

/// JSON body in the layout the PCS uses for signed collateral.
pub fn signed_body(key: &mut Pk, field: &str, payload: &str) -> String {
    let signature = raw_signature(&sign(key, payload.as_bytes()));
    format!(
        "{{\"{}\":{},\"signature\":\"{}\"}}",
        field,
        payload,
        base16::encode_lower(&signature)
    )
}

fn utc_time(time: &str) -> Vec<u8> {
    let mut der = vec![0x17, time.len() as u8];
    der.extend_from_slice(time.as_bytes());
    der
}

/// Version 2 CRL issued and signed by `issuer`, revoking `revoked`.
pub fn crl_der(issuer: &mut TestCert, revoked: &[&[u8]]) -> Vec<u8> {
    let tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_u8(1);
            writer.next().write_sequence(|writer| writer.next().write_oid(&oid::ecdsaWithSHA256));
            writer.next().write_der(issuer.cert.subject().as_der());
            writer.next().write_der(&utc_time("200101000000Z"));
            writer.next().write_der(&utc_time("491231000000Z"));
            if !revoked.is_empty() {
                writer.next().write_sequence(|writer| {
                    for serial in revoked {
                        writer.next().write_sequence(|writer| {
                            writer.next().write_der(&integer(serial));
                            writer.next().write_der(&utc_time("200601000000Z"));
                        })
                    }
                })
            }
        })
    });
    let signature = sign(&mut issuer.key, &tbs);
    let mut bit_string = vec![0x03, (signature.len() + 1) as u8, 0x00];
    bit_string.extend_from_slice(&signature);
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            writer.next().write_sequence(|writer| writer.next().write_oid(&oid::ecdsaWithSHA256));
            writer.next().write_der(&bit_string);
        })
    })
}

fn integer(value: &[u8]) -> Vec<u8> {
    let mut der = vec![0x02, value.len() as u8];
    der.extend_from_slice(value);
    der
}

/// SGX extension with every field a PCK certificate carries.
pub struct ExtensionFixture {
    pub ppid: [u8; 16],
    pub svns: [u8; 16],
    pub pcesvn: u16,
    pub cpusvn: [u8; 16],
    pub pce_id: [u8; 2],
    pub fmspc: [u8; 6],
    pub sgx_type: i64,
}

impl Default for ExtensionFixture {
    fn default() -> Self {
        ExtensionFixture {
            ppid: [0x84, 0x61, 0x86, 0x3b, 0xb7, 0xec, 0xe3, 0x1f, 0x64, 0xc8, 0xe9, 0xb7, 0x7f, 0xd3, 0x1c, 0xad],
            svns: [0, 3, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            pcesvn: 3,
            cpusvn: [0, 3, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            pce_id: [0, 0],
            fmspc: [0x00, 0x70, 0x7f, 0x00, 0x00, 0x00],
            sgx_type: 0,
        }
    }
}

impl ExtensionFixture {
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&sgx_oid(&[1]));
                    writer.next().write_bytes(&self.ppid);
                });
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&sgx_oid(&[2]));
                    writer.next().write_sequence(|writer| {
                        for (i, svn) in self.svns.iter().enumerate() {
                            writer.next().write_sequence(|writer| {
                                writer.next().write_oid(&sgx_oid(&[2, i as u64 + 1]));
                                writer.next().write_u8(*svn);
                            });
                        }
                        writer.next().write_sequence(|writer| {
                            writer.next().write_oid(&sgx_oid(&[2, 17]));
                            writer.next().write_u16(self.pcesvn);
                        });
                        writer.next().write_sequence(|writer| {
                            writer.next().write_oid(&sgx_oid(&[2, 18]));
                            writer.next().write_bytes(&self.cpusvn);
                        });
                    });
                });
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&sgx_oid(&[3]));
                    writer.next().write_bytes(&self.pce_id);
                });
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&sgx_oid(&[4]));
                    writer.next().write_bytes(&self.fmspc);
                });
                writer.next().write_sequence(|writer| {
                    writer.next().write_oid(&sgx_oid(&[5]));
                    writer.next().write_enum(self.sgx_type);
                });
            })
        })
    }
}

/// A PCK-certs TCB object as returned in the PCK certificates list.
pub fn pck_tcb_json(svns: &[u8; 16], pcesvn: u16) -> serde_json::Value {
    let mut tcb = serde_json::Map::new();
    for (i, svn) in svns.iter().enumerate() {
        tcb.insert(format!("sgxtcbcomp{:02}svn", i + 1), serde_json::Value::from(*svn));
    }
    tcb.insert("pcesvn".to_string(), serde_json::Value::from(pcesvn));
    serde_json::Value::Object(tcb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pki_links_up() {
        let (root, intermediate, leaf) = pki("Fixture");
        assert!(root.cert.is_self_signed());
        assert_eq!(intermediate.cert.issuer(), root.cert.subject());
        assert_eq!(leaf.cert.issuer(), intermediate.cert.subject());
    }

    #[test]
    fn raw_signatures_are_fixed_width() {
        let mut key = new_key();
        for message in &[&b"a"[..], b"tcbInfo", b"{}"] {
            assert_eq!(raw_signature(&sign(&mut key, message)).len(), 64);
        }
    }
}
