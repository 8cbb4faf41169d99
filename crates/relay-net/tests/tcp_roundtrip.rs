use std::thread;
use std::time::Duration;

use relay_net::{PollEvent, RelayConnector, RelayEndpoint, SendBehavior};

#[test]
fn tcp_roundtrip_both_directions() {
    let endpoint = RelayEndpoint::parse("tcp://127.0.0.1:24712").unwrap();

    let mut listener = RelayConnector::new().unwrap();
    listener.listen_at(&endpoint).unwrap();

    let server = thread::spawn(move || {
        let mut stream_token = None;
        while stream_token.is_none() {
            listener.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Accept { stream, .. } = ev {
                    stream_token = Some(stream);
                }
            });
        }
        let stream_token = stream_token.unwrap();

        let mut received = None;
        while received.is_none() {
            listener.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Message { token, payload, more } = ev {
                    assert_eq!(token, stream_token);
                    assert!(!more);
                    received = Some(payload.to_vec());
                }
            });
        }
        assert_eq!(received.unwrap(), b"pong-request");

        listener.write_or_enqueue(SendBehavior::Single(stream_token), b"pong-reply", false);
        // Give the reply a moment to actually go out before the thread exits.
        for _ in 0..5 {
            listener.poll_with(Some(Duration::from_millis(20)), |_| {});
        }
    });

    let client = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let mut conn = RelayConnector::new().unwrap();
        let token = conn.connect(endpoint);

        let mut connected = false;
        while !connected {
            conn.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Connect { token: t } = ev {
                    assert_eq!(t, token);
                    connected = true;
                }
            });
        }
        conn.write_or_enqueue(SendBehavior::Single(token), b"pong-request", false);

        let mut received = None;
        while received.is_none() {
            conn.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Message { payload, .. } = ev {
                    received = Some(payload.to_vec());
                }
            });
        }
        assert_eq!(received.unwrap(), b"pong-reply");
    });

    server.join().unwrap();
    client.join().unwrap();
}

#[test]
fn multi_frame_message_preserves_order_and_more_flag() {
    let endpoint = RelayEndpoint::parse("tcp://127.0.0.1:24713").unwrap();

    let mut listener = RelayConnector::new().unwrap();
    listener.listen_at(&endpoint).unwrap();

    let server = thread::spawn(move || {
        let mut frames = Vec::new();
        while frames.len() < 3 {
            listener.poll_with(Some(Duration::from_millis(50)), |ev| {
                if let PollEvent::Message { payload, more, .. } = ev {
                    frames.push((payload.to_vec(), more));
                }
            });
        }
        assert_eq!(
            frames,
            vec![(b"k".to_vec(), true), (b"a".to_vec(), true), (b"b".to_vec(), false)]
        );
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
        conn.write_or_enqueue(SendBehavior::Single(token), b"k", true);
        conn.write_or_enqueue(SendBehavior::Single(token), b"a", true);
        conn.write_or_enqueue(SendBehavior::Single(token), b"b", false);
        for _ in 0..5 {
            conn.poll_with(Some(Duration::from_millis(20)), |_| {});
        }
    });

    server.join().unwrap();
    client.join().unwrap();
}
