//! `DtuClient`-level integration tests, run against the real request
//! engine and a scripted loopback listener rather than against
//! `paging::assemble` in isolation.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use dtu_client::{DeviceEndpoint, DtuClient};
use dtu_core::frame::Frame;
use dtu_core::proto::{CommandReqDto, CommandResDto, RealDataNewReqDto, RealDataNewResDto, SgsData};
use prost::Message;

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

/// Real-data-new with `ap=2`. First reply carries `ap=2, cp=0` with one
/// `sgs_data` entry; the second reply carries `cp=1` with a second
/// entry. The assembled result has two entries.
#[test]
fn real_data_new_assembles_two_pages() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        for page in 0..2i32 {
            let (mut stream, _) = listener.accept().expect("accept");
            let request_bytes = read_one_request(&mut stream);
            let command_id = u16::from_be_bytes([request_bytes[4], request_bytes[5]]);
            let sequence = u16::from_be_bytes([request_bytes[6], request_bytes[7]]);

            let decoded = Frame::decode_standard(&request_bytes, 0).expect("decode request frame");
            let request = RealDataNewResDto::decode(decoded.payload()).expect("decode request payload");
            assert_eq!(request.cp, page, "client should request the page it was told about");

            let reply = RealDataNewReqDto {
                ap: 2,
                cp: page,
                sgs_data: vec![SgsData {
                    serial_number: page as u64 + 1,
                    data: vec![page as u8],
                }],
            };
            let reply_bytes = Frame::encode_standard(command_id, sequence, &reply.encode_to_vec(), 0);
            stream.write_all(&reply_bytes).expect("write reply");
        }
    });

    let endpoint = DeviceEndpoint::new("127.0.0.1").with_port(port);
    let client = DtuClient::new(endpoint);

    let assembled = client.real_data_new().expect("assembled real-data-new response");
    assert_eq!(assembled.ap, 2);
    assert_eq!(assembled.sgs_data.len(), 2);
    assert_eq!(assembled.sgs_data[0].serial_number, 1);
    assert_eq!(assembled.sgs_data[1].serial_number, 2);

    server.join().expect("server thread");
}

/// `set_power_limit(50)` emits `data = "A:500,B:0,C:0\r"` in the
/// generic-command payload; the device ACKs and the caller gets back a
/// decoded `CommandReqDto`.
#[test]
fn set_power_limit_emits_expected_data_field() {
    let (listener, port) = bind_loopback();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request_bytes = read_one_request(&mut stream);
        let command_id = u16::from_be_bytes([request_bytes[4], request_bytes[5]]);
        let sequence = u16::from_be_bytes([request_bytes[6], request_bytes[7]]);

        let decoded = Frame::decode_standard(&request_bytes, 0).expect("decode request frame");
        let request = CommandResDto::decode(decoded.payload()).expect("decode request payload");
        assert_eq!(request.data, b"A:500,B:0,C:0\r");
        assert_eq!(request.package_nub, 1);

        let reply = CommandReqDto {
            result: true,
            data: vec![],
        };
        let reply_bytes = Frame::encode_standard(command_id, sequence, &reply.encode_to_vec(), 0);
        stream.write_all(&reply_bytes).expect("write reply");
    });

    let endpoint = DeviceEndpoint::new("127.0.0.1").with_port(port);
    let client = DtuClient::new(endpoint);

    let reply = client.set_power_limit(50).expect("validation passes").expect("decoded reply");
    assert!(reply.result);

    server.join().expect("server thread");
}

/// `power_limit = 101` is a synchronous validation error; no bytes are
/// sent to the device.
#[test]
fn invalid_power_limit_sends_no_bytes() {
    let (listener, port) = bind_loopback();

    let accepted_any_connection = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let server_flag = accepted_any_connection.clone();
    listener.set_nonblocking(true).expect("set nonblocking");

    let server = thread::spawn(move || {
        // Poll briefly for an incoming connection; none should ever arrive.
        for _ in 0..20 {
            if listener.accept().is_ok() {
                server_flag.store(true, std::sync::atomic::Ordering::SeqCst);
                return;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
    });

    let endpoint = DeviceEndpoint::new("127.0.0.1").with_port(port);
    let client = DtuClient::new(endpoint);

    let result = client.set_power_limit(101);
    assert!(result.is_err());

    server.join().expect("server thread");
    assert!(!accepted_any_connection.load(std::sync::atomic::Ordering::SeqCst), "no connection should have been attempted");
}
