//! End-to-end session over real loopback sockets.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use scarlet_protocol::config::ClientConfig;
use scarlet_protocol::core::packet::{encode, Packet};
use scarlet_protocol::protocol::handshake::{HandshakeResult, ServerHello};
use scarlet_protocol::{ConnectionState, Session, Transport};
use std::io::{Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Poll until `done` holds or two seconds pass.
fn poll_until<T, U, C>(session: &mut Session<T, U, C>, mut done: impl FnMut(&Session<T, U, C>) -> bool) -> bool
where
    T: scarlet_protocol::transport::StreamTransport,
    U: scarlet_protocol::transport::DatagramTransport,
    C: scarlet_protocol::utils::time::Clock,
{
    let give_up = Instant::now() + Duration::from_secs(2);
    while Instant::now() < give_up {
        session.poll();
        if done(session) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn free_udp_port() -> u16 {
    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

#[test]
fn test_session_over_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
    server_udp
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();

    let config = ClientConfig {
        name: "loop".to_string(),
        server_address: "127.0.0.1".to_string(),
        tcp_port: listener.local_addr().unwrap().port(),
        udp_port: server_udp.local_addr().unwrap().port(),
        local_udp_port: free_udp_port(),
        ..ClientConfig::default()
    };

    let (go_tx, go_rx) = mpsc::channel::<()>();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let mut hello = vec![0u8; 15 + 2 * "loop".len()];
        stream.read_exact(&mut hello).unwrap();
        let hello_packet = Packet::validate(&hello).unwrap();
        assert_eq!(hello_packet.type_id, 0xF4);
        assert_eq!(hello_packet.payload[1], 0xC0);

        let reply = ServerHello {
            server_version: 0xC0,
            result: HandshakeResult::Okay,
        }
        .encode(0)
        .unwrap();
        stream.write_all(&reply).unwrap();

        // Keep the application packet out of the handshake read
        go_rx.recv().unwrap();
        stream
            .write_all(&encode(0x10, b"ping", 0).unwrap())
            .unwrap();

        let mut echo = [0u8; 15];
        stream.read_exact(&mut echo).unwrap();
        let echo_packet = Packet::validate(&echo).unwrap();
        assert_eq!(echo_packet.type_id, 0x11);
        assert_eq!(echo_packet.payload, b"ping");
        // Dropping the stream closes the connection
    });

    let mut session = Session::from_config(&config).unwrap();
    let pings = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pings);
    session
        .register_handler(0x10, move |ctx, packet| {
            assert_eq!(ctx.transport(), Transport::Tcp);
            counter.fetch_add(1, Ordering::SeqCst);
            let echo = ctx.packet(0x11, packet.payload)?;
            ctx.reply(&echo)
        })
        .unwrap();

    session.poll();
    assert_eq!(session.state(), ConnectionState::Connected);

    // Watchdog over UDP gets a header-only answer
    let client_udp = format!("127.0.0.1:{}", config.local_udp_port);
    server_udp
        .send_to(&encode(0xF0, &[], 0).unwrap(), &client_udp)
        .unwrap();
    assert!(poll_until(&mut session, |s| s.metrics().snapshot().watchdogs_answered == 1));
    let mut buf = [0u8; 64];
    let (len, _) = server_udp.recv_from(&mut buf).unwrap();
    assert_eq!(len, 11);
    assert_eq!(buf[8], 0xF1);

    // Application packet over TCP reaches the handler, which echoes it back
    go_tx.send(()).unwrap();
    assert!(poll_until(&mut session, |_| pings.load(Ordering::SeqCst) == 1));

    server.join().unwrap();
    assert!(poll_until(&mut session, |s| matches!(
        s.state(),
        ConnectionState::Backoff { .. }
    )));
}

#[test]
fn test_refused_connection_backs_off() {
    // Bind then drop to get a port with nothing listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ClientConfig {
        server_address: "127.0.0.1".to_string(),
        tcp_port: port,
        connect_timeout: Duration::from_millis(500),
        ..ClientConfig::default()
    };

    let mut session = Session::from_config(&config).unwrap();
    session.poll();
    assert!(session.backoff_until().is_some());
    assert!(!session.is_connected());
}
