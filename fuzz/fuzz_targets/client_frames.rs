#![no_main]

use libfuzzer_sys::fuzz_target;

use dispatch_core::assert_invariants;
use dispatch_runtime::{encode_sync, ClientFrame};
use dispatch_state::CanonicalStore;

// Any text a client can send must leave the board valid
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(ClientFrame::Action(action)) = ClientFrame::decode(text) else {
        return;
    };

    let mut store = CanonicalStore::default();
    store.dispatch(action);
    assert_invariants(store.current(), "fuzzed client frame");
    assert!(encode_sync(store.current()).is_ok());
});
