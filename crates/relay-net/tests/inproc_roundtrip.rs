use std::thread;
use std::time::Duration;

use relay_net::{PollEvent, RelayConnector, RelayEndpoint, SendBehavior};

#[test]
fn inproc_roundtrip_through_the_global_hub() {
    let endpoint = RelayEndpoint::parse("inproc://connector-test-roundtrip").unwrap();

    let mut listener = RelayConnector::new().unwrap();
    listener.listen_at(&endpoint).unwrap();

    let server = thread::spawn(move || {
        let mut frames = Vec::new();
        while frames.len() < 2 {
            listener.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Message { payload, more, .. } = ev {
                    frames.push((payload.to_vec(), more));
                }
            });
        }
        assert_eq!(frames, vec![(b"a".to_vec(), true), (b"b".to_vec(), false)]);
    });

    let client = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let mut conn = RelayConnector::new().unwrap();
        let token = conn.connect(endpoint);

        let mut connected = false;
        while !connected {
            conn.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Connect { token: t } = ev {
                    if t == token {
                        connected = true;
                    }
                }
            });
        }
        conn.write_or_enqueue(SendBehavior::Single(token), b"a", true);
        conn.write_or_enqueue(SendBehavior::Single(token), b"b", false);
    });

    server.join().unwrap();
    client.join().unwrap();
}

#[test]
fn connecting_before_bind_retries_until_the_listener_shows_up() {
    let endpoint = RelayEndpoint::parse("inproc://connector-test-late-bind").unwrap();

    let mut conn = RelayConnector::new().unwrap().with_reconnect_interval(Duration::from_millis(10));
    let token = conn.connect(endpoint.clone());

    // A few ticks with nobody bound yet: connect keeps retrying instead of
    // erroring out.
    for _ in 0..3 {
        conn.poll_with(Some(Duration::from_millis(10)), |_| {});
    }

    let mut listener = RelayConnector::new().unwrap();
    listener.listen_at(&endpoint).unwrap();

    let mut connected = false;
    for _ in 0..50 {
        if connected {
            break;
        }
        conn.poll_with(Some(Duration::from_millis(10)), |ev| {
            if let PollEvent::Connect { token: t } = ev {
                if t == token {
                    connected = true;
                }
            }
        });
    }
    assert!(connected);

    conn.write_or_enqueue(SendBehavior::Single(token), b"late", false);

    let mut received = None;
    while received.is_none() {
        listener.poll_with(Some(Duration::from_millis(20)), |ev| {
            if let PollEvent::Message { payload, .. } = ev {
                received = Some(payload.to_vec());
            }
        });
    }
    assert_eq!(received.unwrap(), b"late");
}
