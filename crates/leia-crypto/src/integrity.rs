//! Integrity function capability and the reference additive combiner.

use subtle::ConstantTimeEq;

/// Keyed combining function `mac(key, fields...) -> u64`.
///
/// Implementors only provide [`combine`](Self::combine). The three protocol
/// call sites are default methods so every implementation orders the fields
/// the same way.
///
/// # Invariants
///
/// - Deterministic: the same key and fields always produce the same tag
/// - Pure: no interior state, so peers holding equal inputs agree
pub trait IntegrityFunction: Clone + Send + Sync + 'static {
    /// Fold `key` and `fields` into a 64-bit tag.
    fn combine(&self, key: u64, fields: &[u64]) -> u64;

    /// Session key for an epoch: `mac(shared_key, epoch)`.
    fn derive_session_key(&self, shared_key: u64, epoch: u64) -> u64 {
        self.combine(shared_key, &[epoch])
    }

    /// Tag of a data frame: `mac(session_key, sequence, data)`.
    fn data_tag(&self, session_key: u64, sequence: u16, data: u64) -> u64 {
        self.combine(session_key, &[u64::from(sequence), data])
    }

    /// Tag of an epoch announcement: `mac(session_key, sequence, epoch)`.
    fn epoch_tag(&self, session_key: u64, sequence: u16, epoch: u64) -> u64 {
        self.combine(session_key, &[u64::from(sequence), epoch])
    }
}

/// Reference combiner: wrapping sum of key and fields.
///
/// Matches the values produced by the reference firmware
/// (`session_key = shared_key + epoch`, `tag = session_key + sequence + data`).
/// Offers no authenticity against an active attacker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdditiveMac;

impl IntegrityFunction for AdditiveMac {
    fn combine(&self, key: u64, fields: &[u64]) -> u64 {
        fields.iter().fold(key, |acc, field| acc.wrapping_add(*field))
    }
}

/// Compare two tags without early exit.
pub fn tags_equal(expected: u64, received: u64) -> bool {
    expected.ct_eq(&received).into()
}
