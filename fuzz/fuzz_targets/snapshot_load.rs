#![no_main]

use libfuzzer_sys::fuzz_target;

use dispatch_core::{assert_invariants, State};

// Whatever parses as a board must normalize to a valid one, idempotently
fuzz_target!(|data: &[u8]| {
    let Ok(board) = serde_json::from_slice::<State>(data) else {
        return;
    };

    let (repaired, _) = board.normalized();
    assert_invariants(&repaired, "normalized snapshot");
    assert!(repaired.normalized().1.is_empty());
});
