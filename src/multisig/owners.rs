//! Owner list navigation
//!
//! The vault stores owners as a singly-linked list keyed by address, with a
//! sentinel entry pointing at the head. `getOwners` returns the list in
//! link order, so removing an owner needs the entry that points at it.

use alloy_primitives::{address, Address};

/// Sentinel head of the on-chain owner list (distinct from the zero address)
pub const SENTINEL_OWNERS: Address = address!("0000000000000000000000000000000000000001");

/// Find the list entry pointing at `target` in the given on-chain order.
///
/// Returns [`SENTINEL_OWNERS`] for the head and `None` when `target` is not
/// an owner.
pub fn previous_owner(target: Address, owners: &[Address]) -> Option<Address> {
    let index = owners.iter().position(|owner| *owner == target)?;
    if index == 0 {
        Some(SENTINEL_OWNERS)
    } else {
        Some(owners[index - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const C: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    #[test]
    fn test_head_points_to_sentinel() {
        assert_eq!(previous_owner(A, &[A, B, C]), Some(SENTINEL_OWNERS));
    }

    #[test]
    fn test_inner_owner_points_to_predecessor() {
        let owners = [A, B, C];
        for i in 1..owners.len() {
            assert_eq!(previous_owner(owners[i], &owners), Some(owners[i - 1]));
        }
    }

    #[test]
    fn test_order_is_respected_not_sorted() {
        assert_eq!(previous_owner(A, &[C, B, A]), Some(B));
    }

    #[test]
    fn test_missing_owner() {
        assert_eq!(previous_owner(C, &[A, B]), None);
        assert_eq!(previous_owner(A, &[]), None);
    }

    #[test]
    fn test_sentinel_is_not_zero_address() {
        assert_ne!(SENTINEL_OWNERS, Address::ZERO);
    }
}
