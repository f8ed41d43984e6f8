//! Address and 32-byte value formatting helpers.

use evmbridge_core::error::ConnectorError;
use evmbridge_core::types::Bytes32;

/// Re-exported canonicalization: lowercase hex, `0x` prefix, strict
/// 20-byte check.
pub use evmbridge_core::location::canonical_address;

/// Format an optional 32-byte value as `0x`-prefixed hex, zero-filled
/// when absent (the wire form for unset pin fields).
pub fn hex_format_b32(value: Option<&Bytes32>) -> String {
    value.unwrap_or(&Bytes32::ZERO).to_hex_prefixed()
}

/// Extract a canonicalized signing key from an event payload field.
pub fn author_verifier(author: &str) -> Result<String, ConnectorError> {
    canonical_address(author)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_nil_is_zero_filled() {
        assert_eq!(
            hex_format_b32(None),
            "0x0000000000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn author_mixed_case_is_canonicalized() {
        assert_eq!(
            author_verifier("0X91D2B4381A4CD5C7C0F27565A7D4B829844C8635").unwrap(),
            "0x91d2b4381a4cd5c7c0f27565a7d4b829844c8635"
        );
    }
}
