/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Schema-less decoder for the Intel SGX PCK certificate extension.
//!
//! The extension is a DER tree of `SEQUENCE { OBJECT IDENTIFIER, value }`
//! pairs where a value is either a primitive or another sequence of pairs.
//! Rather than hard-coding the layout, the decoder walks the tag stream and
//! names every value after the most recent object identifier, resolved
//! through [`crate::oid`]. An object identifier that is not in that table
//! aborts decoding.

use std::collections::BTreeMap;

use pkix::types::ObjectIdentifier;
use yasna::tags::{TAG_BOOLEAN, TAG_ENUMERATED, TAG_INTEGER, TAG_OCTETSTRING, TAG_OID};
use yasna::{ASN1Error, ASN1ErrorKind, PCBit};

use crate::oid::{self, SGX_EXTENSION};
use crate::{split_der_contents, Error};

/// Constructed values may be nested this deep below the extension root.
pub const MAX_EXTENSION_DEPTH: usize = 16;

pub type FieldMap = BTreeMap<&'static str, FieldValue>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Bytes(Vec<u8>),
    Boolean(bool),
    Map(FieldMap),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Map(v) => Some(v),
            _ => None,
        }
    }
}

/// Decoded SGX extension. The top level holds a single `sGXExtensions` entry
/// for a well-formed PCK certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionTree(FieldMap);

impl ExtensionTree {
    pub fn fields(&self) -> &FieldMap {
        &self.0
    }

    /// The `sGXExtensions` mapping, absent when the certificate carries no
    /// SGX extension.
    pub fn root(&self) -> Option<&FieldMap> {
        self.0.get(oid::SGX_EXTENSIONS).and_then(FieldValue::as_map)
    }

    /// Looks up a value by its path below the `sGXExtensions` root, e.g.
    /// `["tCB", "tCB-pCESVN"]`.
    pub fn get(&self, path: &[&str]) -> Option<&FieldValue> {
        let (last, parents) = path.split_last()?;
        let mut map = self.root()?;
        for name in parents {
            map = map.get(*name)?.as_map()?;
        }
        map.get(*last)
    }
}

/// Register threaded through the recursive descent.
#[derive(Clone, Debug)]
struct DecoderState {
    /// Most recently seen object identifier; names the next primitive value.
    current: ObjectIdentifier,
    /// Whether the previous element at this level was an object identifier.
    after_oid: bool,
    depth: usize,
}

impl DecoderState {
    fn root() -> Self {
        DecoderState {
            current: SGX_EXTENSION.clone(),
            after_oid: true,
            depth: 0,
        }
    }

    fn enter(&self) -> Self {
        DecoderState {
            current: self.current.clone(),
            after_oid: false,
            depth: self.depth + 1,
        }
    }

    fn field_name(&self) -> Result<&'static str, Error> {
        resolve(&self.current)
    }
}

fn resolve(oid: &ObjectIdentifier) -> Result<&'static str, Error> {
    oid::sgx_extension_field(oid).ok_or_else(|| Error::UnknownExtensionField(oid::dotted(oid)))
}

fn insert(map: &mut FieldMap, name: &'static str, value: FieldValue) -> Result<(), Error> {
    if map.contains_key(name) {
        return Err(Error::DuplicateExtensionField(name));
    }
    map.insert(name, value);
    Ok(())
}

/// Decodes the value of the SGX extension (OID `1.2.840.113741.1.13.1`).
pub fn decode_extension(der: &[u8]) -> Result<ExtensionTree, Error> {
    let mut state = DecoderState::root();
    let mut fields = FieldMap::new();
    decode_element(der, &mut state, &mut fields)?;
    Ok(ExtensionTree(fields))
}

fn decode_element(der: &[u8], state: &mut DecoderState, map: &mut FieldMap) -> Result<(), Error> {
    let value = yasna::parse_der(der, |reader| reader.read_tagged_der())?;

    if value.pcbit() == PCBit::Constructed {
        if state.depth >= MAX_EXTENSION_DEPTH {
            return Err(Error::ExtensionTooDeep(MAX_EXTENSION_DEPTH));
        }
        let elements = split_der_contents(value.value())?;
        let mut inner = state.enter();
        if state.after_oid {
            let name = state.field_name()?;
            let mut nested = FieldMap::new();
            for element in &elements {
                decode_element(element, &mut inner, &mut nested)?;
            }
            trace!("sgx extension: {} ({} entries)", name, nested.len());
            insert(map, name, FieldValue::Map(nested))?;
        } else {
            for element in &elements {
                decode_element(element, &mut inner, map)?;
            }
        }
        state.after_oid = false;
        return Ok(());
    }

    if value.tag() == TAG_OID {
        let oid = yasna::parse_der(der, |reader| reader.read_oid())?;
        resolve(&oid)?;
        state.current = oid;
        state.after_oid = true;
        return Ok(());
    }

    let field = decode_primitive(der, &value.tag())?;
    let name = state.field_name()?;
    trace!("sgx extension: {} = {:?}", name, field);
    insert(map, name, field)?;
    state.after_oid = false;
    Ok(())
}

fn decode_primitive(der: &[u8], tag: &yasna::Tag) -> Result<FieldValue, Error> {
    let value = match *tag {
        TAG_INTEGER => FieldValue::Integer(yasna::parse_der(der, |reader| reader.read_i64())?),
        TAG_ENUMERATED => FieldValue::Integer(yasna::parse_der(der, |reader| reader.read_enum())?),
        TAG_BOOLEAN => FieldValue::Boolean(yasna::parse_der(der, |reader| reader.read_bool())?),
        TAG_OCTETSTRING => FieldValue::Bytes(yasna::parse_der(der, |reader| reader.read_bytes())?),
        _ => return Err(Error::Asn1(ASN1Error::new(ASN1ErrorKind::Invalid))),
    };
    Ok(value)
}
