#![no_main]

use libfuzzer_sys::fuzz_target;
use scarlet_protocol::Packet;

fuzz_target!(|data: &[u8]| {
    // Header validation must reject or accept, never panic
    if let Ok(packet) = Packet::validate(data) {
        assert_eq!(packet.len(), data.len());
        assert_eq!(packet.payload.len() + 11, data.len());
    }
});
