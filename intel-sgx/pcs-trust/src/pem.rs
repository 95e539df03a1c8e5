/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Splitting of issuer chains as delivered by the PCS.

use percent_encoding::percent_decode;

use crate::Error;

pub const CERTIFICATE_BEGIN: &'static str = "-----BEGIN CERTIFICATE-----";
pub const CERTIFICATE_END: &'static str = "-----END CERTIFICATE-----";

pub const PCK_CERTIFICATE_ISSUER_CHAIN_HEADER: &'static str = "SGX-PCK-Certificate-Issuer-Chain";
pub const PCK_CRL_ISSUER_CHAIN_HEADER: &'static str = "SGX-PCK-CRL-Issuer-Chain";
pub const TCB_INFO_ISSUER_CHAIN_HEADER_V3: &'static str = "SGX-TCB-Info-Issuer-Chain";
pub const TCB_INFO_ISSUER_CHAIN_HEADER_V4: &'static str = "TCB-Info-Issuer-Chain";
pub const ENCLAVE_ID_ISSUER_CHAIN_HEADER: &'static str = "SGX-Enclave-Identity-Issuer-Chain";

/// Splits a concatenation of PEM certificates into the individual blocks,
/// preserving their order. Each block spans from its BEGIN marker up to and
/// including its END marker.
pub fn split_pem_bundle(bundle: &str) -> Result<Vec<&str>, Error> {
    let mut blocks = Vec::new();
    let mut rest = bundle;
    while let Some(begin) = rest.find(CERTIFICATE_BEGIN) {
        let end = rest[begin..].find(CERTIFICATE_END).ok_or(Error::MalformedChain)?;
        let end = begin + end + CERTIFICATE_END.len();
        blocks.push(&rest[begin..end]);
        rest = &rest[end..];
    }
    Ok(blocks)
}

/// Returns the issuer chain carried in `header`, one PEM block per certificate
/// in the order the service sent them.
pub fn parse_issuer_header(headers: &[(String, String)], header: &'static str) -> Result<Vec<String>, Error> {
    let cert_chain = headers
        .iter()
        .find_map(|(key, value)| {
            if key.eq_ignore_ascii_case(header) {
                Some(value)
            } else {
                None
            }
        })
        .ok_or(Error::HeaderMissing(header))?;

    let cert_chain = percent_decode(cert_chain.as_bytes())
        .decode_utf8()
        .map_err(|_| Error::InvalidHeader(header))?;

    let chain = split_pem_bundle(&cert_chain)?
        .into_iter()
        .map(|pem| pem.to_owned())
        .collect::<Vec<_>>();
    debug!("header {} carries {} certificate(s)", header, chain.len());
    Ok(chain)
}
