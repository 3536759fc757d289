//! Engine-level integration tests against a scripted loopback TCP
//! listener: a scripted peer stands in for real hardware so the
//! transport layer (timeouts, connection closure, CRC corruption,
//! mutual exclusion) can be exercised deterministically over a real
//! socket rather than an in-process double.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dtu_client::{ConnectionState, DeviceEndpoint, RequestEngine};
use dtu_core::crypto;
use dtu_core::frame::{Frame, GCM_TAG_LEN, MAGIC};

/// Binds an ephemeral loopback listener and returns it plus the port a
/// `DeviceEndpoint` should target.
fn bind_loopback() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let port = listener.local_addr().expect("local_addr").port();
    (listener, port)
}

fn read_one_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).expect("read request");
    buf[..n].to_vec()
}

fn endpoint_on(port: u16) -> DeviceEndpoint {
    DeviceEndpoint::new("127.0.0.1").with_port(port)
}

/// Heartbeat round trip, plaintext. A scripted device echoes back a
/// minimal standard frame for whatever command id it was sent.
#[test]
fn heartbeat_round_trip_transitions_to_online() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_one_request(&mut stream);
        assert_eq!(&request[0..4], &MAGIC, "magic header");
        let command_id = u16::from_be_bytes([request[4], request[5]]);
        assert_eq!(command_id, 0x0030, "CMD_HB_RES_DTO");

        let reply_payload = b"hb-reply".to_vec();
        let reply = Frame::encode_standard(command_id, 1, &reply_payload, 0);
        stream.write_all(&reply).expect("write reply");
    });

    let engine = RequestEngine::new(endpoint_on(port));
    let reply = engine.execute_standard(0x0030, b"hb-request", true).expect("decoded reply");
    assert_eq!(reply, b"hb-reply");
    assert_eq!(engine.connection_state(), ConnectionState::Online);

    server.join().expect("server thread");
}

/// Extended frame round trip: declared-length and sub-header bytes
/// match the documented extended layout.
#[test]
fn extended_frame_round_trip_transitions_to_online() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_one_request(&mut stream);
        assert_eq!(u16::from_be_bytes([request[12], request[13]]), 0x000E, "extended sub-header");
        assert_eq!(&request[14..22], &[0u8; 8], "DTU serial number unknown");
        assert_eq!(u16::from_be_bytes([request[24], request[25]]), 0x00FF, "number=255");

        let command_id = u16::from_be_bytes([request[4], request[5]]);
        let reply = Frame::encode_extended(command_id, 1, 0, 0x00FF, b"gw-info-reply");
        stream.write_all(&reply).expect("write reply");
    });

    let engine = RequestEngine::new(endpoint_on(port));
    let reply = engine.execute_extended(0x0041, 0, 0x00FF, b"").expect("decoded reply");
    assert_eq!(reply, b"gw-info-reply");
    assert_eq!(engine.connection_state(), ConnectionState::Online);

    server.join().expect("server thread");
}

/// An encrypted standard-frame round trip using the same EncRand on
/// both ends.
#[test]
fn encrypted_round_trip_transitions_to_online() {
    const ENC_RAND: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
    ];
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_one_request(&mut stream);
        let command_id = u16::from_be_bytes([request[4], request[5]]);
        let sequence = u16::from_be_bytes([request[6], request[7]]);
        let decoded = Frame::decode_standard(&request, GCM_TAG_LEN).expect("decode request frame");
        let plaintext = crypto::open(command_id, sequence, &ENC_RAND, decoded.payload()).expect("open request");
        assert_eq!(plaintext, b"sealed-request");

        let reply_plaintext = b"sealed-reply".to_vec();
        let sealed_reply = crypto::seal(command_id, sequence, &ENC_RAND, &reply_plaintext).expect("seal reply");
        let reply = Frame::encode_standard(command_id, sequence, &sealed_reply, GCM_TAG_LEN);
        stream.write_all(&reply).expect("write reply");
    });

    let endpoint = endpoint_on(port).with_encryption(ENC_RAND);
    let engine = RequestEngine::new(endpoint);
    let reply = engine.execute_standard(0x0012, b"sealed-request", false).expect("decoded reply");
    assert_eq!(reply, b"sealed-reply");
    assert_eq!(engine.connection_state(), ConnectionState::Online);

    server.join().expect("server thread");
}

/// Closing the connection mid-read (before any bytes are written back)
/// yields `ConnectionState::Offline` and `None`.
#[test]
fn closed_connection_yields_offline_state() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        drop(stream);
    });

    let engine = RequestEngine::new(endpoint_on(port));
    let reply = engine.execute_standard(0x0030, b"hb-request", true);
    assert!(reply.is_none());
    assert_eq!(engine.connection_state(), ConnectionState::Offline);

    server.join().expect("server thread");
}

/// A corrupted CRC byte yields `ConnectionState::Unknown` and `None`.
#[test]
fn corrupt_crc_yields_unknown_state() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_one_request(&mut stream);
        let command_id = u16::from_be_bytes([request[4], request[5]]);

        let mut reply = Frame::encode_standard(command_id, 1, b"hb-reply", 0);
        let crc_idx = 8;
        reply[crc_idx] ^= 0xFF;
        stream.write_all(&reply).expect("write corrupted reply");
    });

    let engine = RequestEngine::new(endpoint_on(port));
    let reply = engine.execute_standard(0x0030, b"hb-request", true);
    assert!(reply.is_none());
    assert_eq!(engine.connection_state(), ConnectionState::Unknown);

    server.join().expect("server thread");
}

/// The rate-limit invariant: two back-to-back calls on one engine must
/// be separated by at least 2000ms between the first call's completion
/// and the second call's start.
#[test]
fn rate_limit_enforces_two_second_gap() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_one_request(&mut stream);
            let command_id = u16::from_be_bytes([request[4], request[5]]);
            let reply = Frame::encode_standard(command_id, 1, b"ok", 0);
            stream.write_all(&reply).expect("write reply");
        }
    });

    let engine = RequestEngine::new(endpoint_on(port));

    engine.execute_standard(0x0030, b"req1", true).expect("first reply");

    let second_start = Instant::now();
    engine.execute_standard(0x0030, b"req2", true).expect("second reply");
    let second_call_duration = second_start.elapsed();

    assert!(
        second_call_duration >= Duration::from_millis(1900),
        "expected the second call to observe the ~2s rate limit, took {second_call_duration:?}"
    );

    server.join().expect("server thread");
}

/// Mutual exclusion: two threads calling the same engine concurrently
/// never have overlapping socket activity; a shared counter that the
/// scripted server bumps on accept and drops on disconnect must never
/// read 2.
#[test]
fn concurrent_callers_never_overlap() {
    let (listener, port) = bind_loopback();
    let concurrent = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let server_concurrent = concurrent.clone();
    let server_max = max_seen.clone();
    let server = thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().expect("accept");
            let now = server_concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            server_max.fetch_max(now, Ordering::SeqCst);

            let request = read_one_request(&mut stream);
            let command_id = u16::from_be_bytes([request[4], request[5]]);
            // Hold the connection open briefly so a racing second accept
            // would be observed if mutual exclusion were broken.
            thread::sleep(Duration::from_millis(50));
            let reply = Frame::encode_standard(command_id, 1, b"ok", 0);
            stream.write_all(&reply).expect("write reply");

            server_concurrent.fetch_sub(1, Ordering::SeqCst);
        }
    });

    let engine = Arc::new(RequestEngine::new(endpoint_on(port)));

    let e1 = engine.clone();
    let t1 = thread::spawn(move || e1.execute_standard(0x0030, b"req-a", true));
    let e2 = engine.clone();
    let t2 = thread::spawn(move || e2.execute_standard(0x0030, b"req-b", true));

    let r1 = t1.join().expect("thread 1");
    let r2 = t2.join().expect("thread 2");
    assert!(r1.is_some());
    assert!(r2.is_some());

    server.join().expect("server thread");
    assert_eq!(max_seen.load(Ordering::SeqCst), 1, "two callers overlapped on the wire");
}

/// Sequence wraparound is exercised at the unit level in
/// `dtu_client::engine::tests`, against the wrapping-arithmetic helper
/// directly — a real round trip per increment would need 65536 of them,
/// each paying the 2-second rate limit.
///
/// Here we only pin that two consecutive round trips on a fresh engine
/// see sequence values 1 then 2, i.e. the counter is actually threaded
/// through the wire frames rather than left at a constant.
#[test]
fn sequence_increments_across_consecutive_round_trips() {
    let (listener, port) = bind_loopback();

    let observed = Arc::new((AtomicUsize::new(0), AtomicUsize::new(0)));
    let server_observed = observed.clone();

    let server = thread::spawn(move || {
        for i in 0..2usize {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_one_request(&mut stream);
            let sequence = u16::from_be_bytes([request[6], request[7]]);
            if i == 0 {
                server_observed.0.store(sequence as usize, Ordering::SeqCst);
            } else {
                server_observed.1.store(sequence as usize, Ordering::SeqCst);
            }
            let command_id = u16::from_be_bytes([request[4], request[5]]);
            let reply = Frame::encode_standard(command_id, sequence, b"ok", 0);
            stream.write_all(&reply).expect("write reply");
        }
    });

    let engine = RequestEngine::new(endpoint_on(port));
    engine.execute_standard(0x0030, b"req1", true).expect("first reply");
    engine.execute_standard(0x0030, b"req2", true).expect("second reply");

    assert_eq!(observed.0.load(Ordering::SeqCst), 1);
    assert_eq!(observed.1.load(Ordering::SeqCst), 2);

    server.join().expect("server thread");
}
