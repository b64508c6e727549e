use crate::model::Identity;

/// Deterministic glare tie-break: the lexicographically smaller identity offers.
///
/// Both sides evaluate the same pair and reach opposite answers, so exactly one
/// of two crossing offers survives.
pub fn is_offerer(local: &Identity, remote: &Identity) -> bool {
    local < remote
}
