//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pop_core::{Address, ContentDigest, Keypair};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random ContentDigest.
pub fn digest() -> impl Strategy<Value = ContentDigest> {
    any::<[u8; 32]>().prop_map(ContentDigest::from_bytes)
}

/// Generate a random non-zero Address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>()
        .prop_filter("zero address is the unregistered owner", |b| b.iter().any(|x| *x != 0))
        .prop_map(Address::from_bytes)
}

/// Generate a metadata pointer shaped like a CID.
pub fn metadata_pointer() -> impl Strategy<Value = String> {
    "bafy[a-z2-7]{10,40}"
}

/// Generate a plausible ledger timestamp (seconds, never zero).
pub fn timestamp() -> impl Strategy<Value = u64> {
    1u64..=4_102_444_800
}

/// Generate a paragraph of plain words.
pub fn paragraph() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z,.!?]{1,10}", 1..12).prop_map(|words| words.join(" "))
}

/// Generate text with incidental noise: mixed line endings, trailing
/// spaces and tabs, blank line runs, and surrounding whitespace.
pub fn messy_text() -> impl Strategy<Value = String> {
    let line_ending = prop_oneof![Just("\n"), Just("\r\n"), Just("\r")];
    let trailing = "[ \t]{0,3}";
    let blank_lines = 0usize..4;

    (
        "[ \t\n]{0,3}",
        prop::collection::vec((paragraph(), trailing, line_ending, blank_lines), 1..6),
        "[ \t\n]{0,3}",
    )
        .prop_map(|(lead, lines, tail)| {
            let mut text = lead;
            for (line, pad, eol, blanks) in lines {
                text.push_str(&line);
                text.push_str(&pad);
                for _ in 0..=blanks {
                    text.push_str(eol);
                }
            }
            text.push_str(&tail);
            text
        })
}

/// Generate a registration attempt: (digest index, caller index, pointer).
pub fn registration_attempt(
    digests: u8,
    callers: u8,
) -> impl Strategy<Value = (u8, u8, String)> {
    (0..digests, 0..callers, metadata_pointer())
}
