#![no_main]

use libfuzzer_sys::fuzz_target;
use scarlet_protocol::protocol::handshake::ServerHello;

fuzz_target!(|data: &[u8]| {
    // Fuzz the server's handshake response
    if let Ok(hello) = ServerHello::parse(data) {
        assert_eq!(data[8], 0xF5);
        let _ = hello.accepted();
    }
});
