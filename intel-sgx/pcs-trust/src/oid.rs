/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Object identifiers understood by this crate.
//!
//! The SGX extension field names follow the ASN.1 module of the Intel SGX PCK
//! Certificate and CRL Profile. Supporting a new extension field means adding
//! a row to the table below.

#![allow(non_upper_case_globals)]

use std::collections::HashMap;

use pkix::types::ObjectIdentifier;
pub use sgx_pkix::oid::SGX_EXTENSION;
use sgx_pkix::oid::{
    SGX_EXTENSION_CONFIGURATION, SGX_EXTENSION_CONF_CACHED_KEYS, SGX_EXTENSION_CONF_DYNAMIC_PLATFORM,
    SGX_EXTENSION_CONF_SMT_ENABLED, SGX_EXTENSION_FMSPC, SGX_EXTENSION_PCEID, SGX_EXTENSION_PLATFORM_INSTANCE_ID,
    SGX_EXTENSION_PPID, SGX_EXTENSION_SGX_TYPE, SGX_EXTENSION_TCB, SGX_EXTENSION_TCB_COMP01_SVN,
    SGX_EXTENSION_TCB_COMP02_SVN, SGX_EXTENSION_TCB_COMP03_SVN, SGX_EXTENSION_TCB_COMP04_SVN,
    SGX_EXTENSION_TCB_COMP05_SVN, SGX_EXTENSION_TCB_COMP06_SVN, SGX_EXTENSION_TCB_COMP07_SVN,
    SGX_EXTENSION_TCB_COMP08_SVN, SGX_EXTENSION_TCB_COMP09_SVN, SGX_EXTENSION_TCB_COMP10_SVN,
    SGX_EXTENSION_TCB_COMP11_SVN, SGX_EXTENSION_TCB_COMP12_SVN, SGX_EXTENSION_TCB_COMP13_SVN,
    SGX_EXTENSION_TCB_COMP14_SVN, SGX_EXTENSION_TCB_COMP15_SVN, SGX_EXTENSION_TCB_COMP16_SVN,
    SGX_EXTENSION_TCB_CPUSVN, SGX_EXTENSION_TCB_PCESVN,
};

lazy_static! {
    // X.509 certificate extensions
    pub static ref crlDistributionPoints: ObjectIdentifier = vec![2, 5, 29, 31].into();

    // Signature algorithms
    pub static ref ecdsaWithSHA256: ObjectIdentifier = vec![1, 2, 840, 10045, 4, 3, 2].into();

    // X.500 attribute types
    pub static ref commonName: ObjectIdentifier = vec![2, 5, 4, 3].into();
    pub static ref organizationName: ObjectIdentifier = vec![2, 5, 4, 10].into();

    static ref SGX_EXTENSION_FIELDS: HashMap<ObjectIdentifier, &'static str> = {
        let mut fields = HashMap::new();

        macro_rules! sgx_fields {
            ($oid:ident => $name:expr, $($rest:tt)*) => (
                fields.insert($oid.clone(), $name);
                sgx_fields!($($rest)*);
            );
            () => ();
        }

        sgx_fields! {
            SGX_EXTENSION => SGX_EXTENSIONS,
            SGX_EXTENSION_PPID => PPID,
            SGX_EXTENSION_TCB => TCB,
            SGX_EXTENSION_TCB_COMP01_SVN => "tCB-sGXTCBComp01SVN",
            SGX_EXTENSION_TCB_COMP02_SVN => "tCB-sGXTCBComp02SVN",
            SGX_EXTENSION_TCB_COMP03_SVN => "tCB-sGXTCBComp03SVN",
            SGX_EXTENSION_TCB_COMP04_SVN => "tCB-sGXTCBComp04SVN",
            SGX_EXTENSION_TCB_COMP05_SVN => "tCB-sGXTCBComp05SVN",
            SGX_EXTENSION_TCB_COMP06_SVN => "tCB-sGXTCBComp06SVN",
            SGX_EXTENSION_TCB_COMP07_SVN => "tCB-sGXTCBComp07SVN",
            SGX_EXTENSION_TCB_COMP08_SVN => "tCB-sGXTCBComp08SVN",
            SGX_EXTENSION_TCB_COMP09_SVN => "tCB-sGXTCBComp09SVN",
            SGX_EXTENSION_TCB_COMP10_SVN => "tCB-sGXTCBComp10SVN",
            SGX_EXTENSION_TCB_COMP11_SVN => "tCB-sGXTCBComp11SVN",
            SGX_EXTENSION_TCB_COMP12_SVN => "tCB-sGXTCBComp12SVN",
            SGX_EXTENSION_TCB_COMP13_SVN => "tCB-sGXTCBComp13SVN",
            SGX_EXTENSION_TCB_COMP14_SVN => "tCB-sGXTCBComp14SVN",
            SGX_EXTENSION_TCB_COMP15_SVN => "tCB-sGXTCBComp15SVN",
            SGX_EXTENSION_TCB_COMP16_SVN => "tCB-sGXTCBComp16SVN",
            SGX_EXTENSION_TCB_PCESVN => TCB_PCESVN,
            SGX_EXTENSION_TCB_CPUSVN => TCB_CPUSVN,
            SGX_EXTENSION_PCEID => PCE_ID,
            SGX_EXTENSION_FMSPC => FMSPC,
            SGX_EXTENSION_SGX_TYPE => SGX_TYPE,
            SGX_EXTENSION_PLATFORM_INSTANCE_ID => PLATFORM_INSTANCE_ID,
            SGX_EXTENSION_CONFIGURATION => CONFIGURATION,
            SGX_EXTENSION_CONF_DYNAMIC_PLATFORM => CONFIGURATION_DYNAMIC_PLATFORM,
            SGX_EXTENSION_CONF_CACHED_KEYS => CONFIGURATION_CACHED_KEYS,
            SGX_EXTENSION_CONF_SMT_ENABLED => CONFIGURATION_SMT_ENABLED,
        }

        fields
    };

    static ref TCB_COMPONENTS: [&'static ObjectIdentifier; 16] = [
        &*SGX_EXTENSION_TCB_COMP01_SVN,
        &*SGX_EXTENSION_TCB_COMP02_SVN,
        &*SGX_EXTENSION_TCB_COMP03_SVN,
        &*SGX_EXTENSION_TCB_COMP04_SVN,
        &*SGX_EXTENSION_TCB_COMP05_SVN,
        &*SGX_EXTENSION_TCB_COMP06_SVN,
        &*SGX_EXTENSION_TCB_COMP07_SVN,
        &*SGX_EXTENSION_TCB_COMP08_SVN,
        &*SGX_EXTENSION_TCB_COMP09_SVN,
        &*SGX_EXTENSION_TCB_COMP10_SVN,
        &*SGX_EXTENSION_TCB_COMP11_SVN,
        &*SGX_EXTENSION_TCB_COMP12_SVN,
        &*SGX_EXTENSION_TCB_COMP13_SVN,
        &*SGX_EXTENSION_TCB_COMP14_SVN,
        &*SGX_EXTENSION_TCB_COMP15_SVN,
        &*SGX_EXTENSION_TCB_COMP16_SVN,
    ];

    static ref ATTRIBUTE_SHORT_NAMES: HashMap<ObjectIdentifier, &'static str> = {
        let mut names = HashMap::new();
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 3]), "CN");
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 6]), "C");
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 7]), "L");
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 8]), "ST");
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 10]), "O");
        names.insert(ObjectIdentifier::from(vec![2, 5, 4, 11]), "OU");
        names
    };
}

pub const SGX_EXTENSIONS: &'static str = "sGXExtensions";
pub const PPID: &'static str = "pPID";
pub const TCB: &'static str = "tCB";
pub const TCB_PCESVN: &'static str = "tCB-pCESVN";
pub const TCB_CPUSVN: &'static str = "tCB-cPUSVN";
pub const PCE_ID: &'static str = "pCE-ID";
pub const FMSPC: &'static str = "fMSPC";
pub const SGX_TYPE: &'static str = "sGXType";
pub const PLATFORM_INSTANCE_ID: &'static str = "platformInstanceID";
pub const CONFIGURATION: &'static str = "configuration";
pub const CONFIGURATION_DYNAMIC_PLATFORM: &'static str = "configuration-dynamicPlatform";
pub const CONFIGURATION_CACHED_KEYS: &'static str = "configuration-cachedKeys";
pub const CONFIGURATION_SMT_ENABLED: &'static str = "configuration-sMTEnabled";

/// Name of the `index`th (1-based) TCB component SVN field.
pub fn tcb_component_field(index: usize) -> Option<&'static str> {
    let oid = TCB_COMPONENTS.get(index.checked_sub(1)?)?;
    sgx_extension_field(oid)
}

/// Symbolic name of an SGX extension field, `None` for OIDs outside the table.
pub fn sgx_extension_field(oid: &ObjectIdentifier) -> Option<&'static str> {
    SGX_EXTENSION_FIELDS.get(oid).map(|name| *name)
}

/// Dotted decimal notation, e.g. `1.2.840.113741.1.13.1`.
pub fn dotted(oid: &ObjectIdentifier) -> String {
    oid.components().iter().map(|c| c.to_string()).collect::<Vec<_>>().join(".")
}

/// Short attribute type used when printing distinguished names.
pub fn attribute_short_name(oid: &ObjectIdentifier) -> String {
    match ATTRIBUTE_SHORT_NAMES.get(oid) {
        Some(name) => name.to_string(),
        None => dotted(oid),
    }
}
