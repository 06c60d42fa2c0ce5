//! Client-side view of the token bridge and the core bridge it posts
//! messages through.
//!
//! The programs themselves are opaque deployments. This crate only knows
//! how to address them (program-derived addresses), how to encode the
//! legacy native-transfer instructions, and how to read back the message
//! account a successful transfer leaves behind.

pub mod core_bridge;
pub mod instruction;
pub mod message;
pub mod payload;
pub mod pda;

/// Wormhole chain id of Solana.
pub const SOLANA_CHAIN: u16 = 1;

/// Token amounts recorded in bridge messages carry at most this many
/// decimals.
pub const MAX_DECIMALS: u8 = 8;

fn truncation_factor(decimals: u8) -> u64 {
    10u64.saturating_pow(decimals.saturating_sub(MAX_DECIMALS) as u32)
}

/// The amount recorded in a bridge message for `amount` base units of a
/// mint with `decimals` decimals.
pub fn normalize_amount(amount: u64, decimals: u8) -> u64 {
    amount / truncation_factor(decimals)
}

/// The base units a normalized amount stands for.
pub fn denormalize_amount(amount: u64, decimals: u8) -> u64 {
    amount.saturating_mul(truncation_factor(decimals))
}

/// The base units actually moved when transferring `amount`: anything
/// below the message precision stays in the sender's account.
pub fn transferable_amount(amount: u64, decimals: u8) -> u64 {
    denormalize_amount(normalize_amount(amount, decimals), decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_below_max_decimals_is_identity() {
        assert_eq!(normalize_amount(88_888_888, 8), 88_888_888);
        assert_eq!(normalize_amount(88_888_888, 6), 88_888_888);
        assert_eq!(denormalize_amount(88_888_888, 8), 88_888_888);
        assert_eq!(transferable_amount(88_888_888, 0), 88_888_888);
    }

    #[test]
    fn test_normalization_truncates_extra_decimals() {
        assert_eq!(normalize_amount(88_888_888, 9), 8_888_888);
        assert_eq!(denormalize_amount(8_888_888, 9), 88_888_880);
        assert_eq!(transferable_amount(88_888_888, 9), 88_888_880);
        assert_eq!(normalize_amount(9, 9), 0);
        assert_eq!(normalize_amount(u64::MAX, 18), u64::MAX / 10_000_000_000);
    }
}
