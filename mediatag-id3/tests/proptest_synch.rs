//! Property-based tests for the synchsafe and unsynchronisation codecs.

use mediatag_id3::synch::{
    decode_synchsafe, deunsynchronize, encode_synchsafe, unsynchronize, MAX_SYNCHSAFE,
};
use proptest::prelude::*;

proptest! {
    /// Encoding then decoding any 28-bit value is the identity, and no
    /// emitted byte ever has its MSB set.
    #[test]
    fn synchsafe_roundtrip(value in 0u32..=MAX_SYNCHSAFE) {
        let encoded = encode_synchsafe(value).unwrap();
        prop_assert!(encoded.iter().all(|b| b & 0x80 == 0));
        prop_assert_eq!(decode_synchsafe(encoded).unwrap(), value);
    }

    /// Unsynchronising arbitrary bytes never leaves a false sync pattern and
    /// always reverses exactly.
    #[test]
    fn unsynchronisation_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let stuffed = unsynchronize(&data);
        prop_assert!(!stuffed.windows(2).any(|w| w[0] == 0xFF && w[1] >= 0xE0));
        prop_assert!(stuffed.last() != Some(&0xFF));
        prop_assert_eq!(deunsynchronize(&stuffed), data);
    }
}
