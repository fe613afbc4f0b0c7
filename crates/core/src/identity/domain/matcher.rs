use crate::hashing::domain::fingerprint::{FingerprintDistance, FingerprintSet};

use super::identity::{Identity, IdentityId};

/// Closest registered identity for a query fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    pub identity_id: IdentityId,
    pub name: String,
    pub distance: FingerprintDistance,
}

impl IdentityMatch {
    /// `1 - normalized distance`, in [0, 1].
    pub fn confidence(&self) -> f64 {
        1.0 - self.distance.normalized()
    }
}

/// Identity with the smallest combined distance to `query`; exact ties go to
/// the lowest identity id.
pub fn best_match<'a>(
    query: &FingerprintSet,
    identities: impl IntoIterator<Item = &'a Identity>,
) -> Option<IdentityMatch> {
    let mut best: Option<(&Identity, FingerprintDistance)> = None;
    for identity in identities {
        let Some(distance) = query.distance_to(&identity.reference) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((current, d)) => {
                (distance.combined, identity.id) < (d.combined, current.id)
            }
        };
        if better {
            best = Some((identity, distance));
        }
    }
    best.map(|(identity, distance)| IdentityMatch {
        identity_id: identity.id,
        name: identity.name.clone(),
        distance,
    })
}

/// [`best_match`], accepted only when its combined distance is `<= threshold`.
pub fn find_match<'a>(
    query: &FingerprintSet,
    identities: impl IntoIterator<Item = &'a Identity>,
    threshold: u32,
) -> Option<IdentityMatch> {
    best_match(query, identities).filter(|m| m.distance.combined <= threshold)
}
