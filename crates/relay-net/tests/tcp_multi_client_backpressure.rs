use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use relay_comm::InterruptFlag;
use relay_net::EgressGroup;

/// An `EgressGroup` (spec §4.3) with two endpoints: liveness tracks how
/// many of them are currently connected, and round-robin `send` delivers
/// frames to both peers.
#[test]
fn egress_group_tracks_liveness_and_round_robins_sends() {
    let listener_a = TcpListener::bind("127.0.0.1:0").unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr_a = listener_a.local_addr().unwrap();
    let addr_b = listener_b.local_addr().unwrap();

    let accept_a = thread::spawn(move || {
        let (mut stream, _) = listener_a.accept().unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        buf
    });
    let accept_b = thread::spawn(move || {
        let (mut stream, _) = listener_b.accept().unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        buf
    });

    let mut group = EgressGroup::init(&format!("tcp://{addr_a},tcp://{addr_b}")).unwrap();
    group.start_monitors(InterruptFlag::new()).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while group.liveness() < 2 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
        group.sample();
    }
    assert_eq!(group.liveness(), 2);
    assert!(group.is_live());

    // header(1 more-flag + 4 len) + payload "hi" = 7 bytes per send.
    group.send(0, b"hi".to_vec(), false);
    group.send(1, b"hi".to_vec(), false);

    let got_a = accept_a.join().unwrap();
    let got_b = accept_b.join().unwrap();
    assert_eq!(&got_a[..1], &[0]);
    assert_eq!(u32::from_le_bytes(got_a[1..5].try_into().unwrap()), 2);
    assert_eq!(&got_b[..1], &[0]);
    assert_eq!(u32::from_le_bytes(got_b[1..5].try_into().unwrap()), 2);

    group.destroy();
}
