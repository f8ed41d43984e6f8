//! # evmbridge-abi
//!
//! Pure ABI functions for the connector: address canonicalization,
//! canonical event/error/method signatures, translation of the abstract
//! typed-parameter schema onto `DynSolType`, JSON argument coercion,
//! and the two historical batch-pin wire formats.
//!
//! Nothing in this crate performs I/O; everything is deterministic and
//! unit-testable.

pub mod address;
pub mod batchpin;
pub mod encode;
pub mod interface;
pub mod signature;
pub mod translate;

pub use address::{canonical_address, hex_format_b32};
pub use batchpin::{
    decode_pin_blob, encode_pin_blob, is_batch_pin_signature, pack_uuids, split_uuids,
    BATCH_PIN_SIGNATURE, NETWORK_ACTION_PREFIX,
};
pub use interface::{AbiCache, AbiParam, ParsedError, ParsedEvent, ParsedInterface, ParsedMethod};
pub use signature::{error_signature, event_signature, signature_with_location};
