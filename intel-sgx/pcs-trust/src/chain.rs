/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Ordering of issuer chains.
//!
//! The PCS sends issuer chains in no particular order. [`sort_chain`] puts
//! them root first, so that `chain[i + 1]` is issued by `chain[i]`, using
//! nothing but the subject and issuer names of the certificates. Names are
//! compared by their DER encoding.

use std::collections::{HashMap, HashSet};

use crate::{DistinguishedName, Error};

/// Anything with a subject and an issuer name.
pub trait ChainLink {
    fn subject(&self) -> &DistinguishedName;
    fn issuer(&self) -> &DistinguishedName;

    fn is_self_signed(&self) -> bool {
        self.subject() == self.issuer()
    }
}

fn label<T: ChainLink>(link: &T) -> String {
    link.subject().label()
}

/// Whether `chain` is already root first: every certificate is issued by its
/// predecessor and the first one is either self-signed or issued by a name
/// outside the chain.
pub fn is_root_first<T: ChainLink>(chain: &[T]) -> bool {
    let first = match chain.first() {
        Some(first) => first,
        None => return true,
    };
    let anchored = first.is_self_signed() || !chain.iter().any(|link| link.subject() == first.issuer());
    anchored && chain.windows(2).all(|pair| pair[1].issuer() == pair[0].subject())
}

/// Reorders `chain` root first. No partial chain is returned on failure.
pub fn sort_chain<T: ChainLink>(chain: Vec<T>) -> Result<Vec<T>, Error> {
    let sorted = match chain.len() {
        0 | 1 => chain,
        2 => sort_pair(chain)?,
        _ if is_root_first(&chain) => chain,
        _ => {
            let order = reconstruct(&chain)?;
            let mut slots = chain.into_iter().map(Some).collect::<Vec<_>>();
            order
                .into_iter()
                .map(|i| slots[i].take().ok_or(Error::CircularOrAmbiguousChain))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    for pair in sorted.windows(2) {
        debug!("chain: {} <- {}", label(&pair[0]), label(&pair[1]));
    }
    Ok(sorted)
}

fn sort_pair<T: ChainLink>(mut chain: Vec<T>) -> Result<Vec<T>, Error> {
    if chain[1].issuer() == chain[0].subject() {
        Ok(chain)
    } else if chain[0].issuer() == chain[1].subject() {
        chain.reverse();
        Ok(chain)
    } else {
        Err(Error::NoIssuerRelationship(label(&chain[0]), label(&chain[1])))
    }
}

/// Returns the root first order of `chain` as indices into it.
fn reconstruct<T: ChainLink>(chain: &[T]) -> Result<Vec<usize>, Error> {
    let roots = (0..chain.len()).filter(|&i| chain[i].is_self_signed()).collect::<Vec<_>>();
    if roots.len() > 1 {
        return Err(Error::MultipleRootCertificates(
            label(&chain[roots[0]]),
            label(&chain[roots[1]]),
        ));
    }

    let mut by_subject: HashMap<&DistinguishedName, usize> = HashMap::new();
    let mut by_issuer: HashMap<&DistinguishedName, usize> = HashMap::new();
    for (i, link) in chain.iter().enumerate() {
        if by_subject.insert(link.subject(), i).is_some() {
            return Err(Error::AmbiguousChain(link.subject().label()));
        }
        if !link.is_self_signed() && by_issuer.insert(link.issuer(), i).is_some() {
            return Err(Error::AmbiguousChain(link.issuer().label()));
        }
    }

    let start = match roots.first() {
        Some(&root) => root,
        None => {
            let mut unanchored = (0..chain.len()).filter(|&i| !by_subject.contains_key(chain[i].issuer()));
            match (unanchored.next(), unanchored.next()) {
                (Some(start), None) => start,
                _ => return Err(Error::CircularOrAmbiguousChain),
            }
        }
    };

    let mut order = vec![start];
    let mut visited = HashSet::new();
    visited.insert(start);
    let mut current = start;
    while order.len() < chain.len() {
        match by_issuer.get(chain[current].subject()) {
            Some(&next) if visited.insert(next) => {
                order.push(next);
                current = next;
            }
            _ => return Err(Error::BrokenChain(label(&chain[current]))),
        }
    }
    Ok(order)
}
