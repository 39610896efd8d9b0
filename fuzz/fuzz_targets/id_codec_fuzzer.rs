//! Fuzz target for the extended identifier codec
//!
//! # Invariants
//!
//! - NEVER panic on any 32-bit identifier
//! - Decoding ignores bits 29-31: re-encoding yields the input with the
//!   marker set and the unused bits cleared
//! - Marking is idempotent and never touches the low 29 bits

#![no_main]

use leia_proto::{ExtendedId, decode_extended, is_extended, mark_extended};
use libfuzzer_sys::fuzz_target;

const ID_BITS: u32 = 0x1FFF_FFFF;

fuzz_target!(|raw: u32| {
    let decoded = decode_extended(raw);
    assert_eq!(decoded, ExtendedId::from_raw(raw));
    assert_eq!(decoded.to_raw(), mark_extended(raw & ID_BITS));

    let marked = mark_extended(raw);
    assert!(is_extended(marked));
    assert_eq!(mark_extended(marked), marked);
    assert_eq!(marked & ID_BITS, raw & ID_BITS);
});
