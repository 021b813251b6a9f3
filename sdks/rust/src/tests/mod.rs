//! Behavioural tests for the map engine over the in-process transport

use crate::codec::{self, Envelope};
use crate::map::{MapEvent, ReplicatedMap};
use crate::transport::{ChannelRemote, ChannelTransport};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Minimal stand-in for the server: applies client writes to its own copy
/// and forwards them to every other client, like the reference server does.
struct FakeServer {
    map: HashMap<String, Value>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    fn connect(&self, remote: &ChannelRemote) {
        remote.open();
        remote
            .deliver_envelope(&Envelope::Init {
                map: self.map.clone(),
            })
            .unwrap();
    }

    /// Apply everything `from` wrote and broadcast it to `others`
    fn pump(&mut self, from: &mut ChannelRemote, others: &[&ChannelRemote]) {
        for frame in from.take_writes() {
            match codec::decode(&frame).unwrap() {
                Envelope::Put { key, value } => {
                    self.map.insert(key, value);
                }
                Envelope::Remove { key } => {
                    self.map.remove(&key);
                }
                Envelope::Clear => self.map.clear(),
                other => panic!("client sent {other:?}"),
            }
            for remote in others {
                remote.deliver(frame.clone());
            }
        }
    }
}

fn counting_map() -> (ReplicatedMap<ChannelTransport>, ChannelRemote, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (transport, remote) = ChannelTransport::pair();
    let map = ReplicatedMap::new(
        transport,
        Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    (map, remote, calls)
}

fn sorted(map: &ReplicatedMap<ChannelTransport>) -> Vec<(String, Value)> {
    let mut entries = map.entries();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn sorted_server(server: &FakeServer) -> Vec<(String, Value)> {
    let mut entries: Vec<_> = server
        .map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

#[test]
fn test_lossless_round_trip_converges() {
    let mut server = FakeServer::new();
    let (transport_a, mut remote_a) = ChannelTransport::pair();
    let (transport_b, mut remote_b) = ChannelTransport::pair();
    let mut a = ReplicatedMap::new(transport_a, None);
    let mut b = ReplicatedMap::new(transport_b, None);

    server.connect(&remote_a);
    server.connect(&remote_b);
    a.drain_events();
    b.drain_events();

    a.put("Red Leader", "Garven Dreis").unwrap();
    a.put("Red Two", "Wedge Antilles").unwrap();
    server.pump(&mut remote_a, &[&remote_b]);
    b.drain_events();

    b.put("Red Five", "Luke Skywalker").unwrap();
    b.remove("Red Two").unwrap();
    server.pump(&mut remote_b, &[&remote_a]);
    a.drain_events();

    a.put("Red Three", json!({"name": "Biggs", "lost": true})).unwrap();
    server.pump(&mut remote_a, &[&remote_b]);

    a.drain_events();
    b.drain_events();

    assert_eq!(sorted(&a), sorted_server(&server));
    assert_eq!(sorted(&b), sorted_server(&server));
    assert_eq!(a.size(), 3);

    b.clear();
    server.pump(&mut remote_b, &[&remote_a]);
    a.drain_events();
    assert!(a.is_empty());
    assert!(server.map.is_empty());
}

#[test]
fn test_remote_events_are_idempotent() {
    let (mut map, remote, _) = counting_map();
    remote.open();

    let put = r#"{"event":"put","key":"k","value":[1,2]}"#;
    remote.deliver(put);
    map.drain_events();
    let once = sorted(&map);
    remote.deliver(put);
    map.drain_events();
    assert_eq!(sorted(&map), once);

    let remove = r#"{"event":"remove","key":"k"}"#;
    remote.deliver(remove);
    remote.deliver(remove);
    map.drain_events();
    assert!(map.is_empty());

    remote.deliver(r#"{"event":"put","key":"z","value":0}"#);
    remote.deliver(r#"{"event":"clear"}"#);
    remote.deliver(r#"{"event":"clear"}"#);
    map.drain_events();
    assert!(map.is_empty());
}

#[test]
fn test_absent_keys_read_as_none() {
    let (mut map, _remote, _) = counting_map();
    assert_eq!(map.get("never-seen").unwrap(), None);

    map.put("k", 1).unwrap();
    map.remove("k").unwrap();
    assert_eq!(map.get("k").unwrap(), None);
}

#[test]
fn test_offline_put_never_reaches_transport() {
    let (mut map, mut remote, calls) = counting_map();
    assert!(!map.is_online());

    map.put("a", 1).unwrap();

    assert_eq!(map.get("a").unwrap(), Some(&json!(1)));
    assert!(remote.take_writes().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_write_lost_after_disconnect_is_not_replayed() {
    let (mut map, mut remote, _) = counting_map();
    remote.open();
    map.drain_events();

    remote.close();
    map.drain_events();
    map.put("late", true).unwrap();

    remote.open();
    map.drain_events();
    assert!(remote.take_writes().is_empty());

    // Next snapshot from the server wins
    remote.deliver(r#"{"event":"init","map":{}}"#);
    map.drain_events();
    assert_eq!(map.get("late").unwrap(), None);
}

#[test]
fn test_one_notification_per_operation() {
    let (mut map, remote, calls) = counting_map();
    remote.open();
    assert_eq!(map.drain_events(), vec![MapEvent::Opened]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    remote.deliver(r#"{"event":"init","map":{"a":1}}"#);
    map.drain_events();
    map.put("b", 2).unwrap();
    remote.deliver(r#"{"event":"remove","key":"a"}"#);
    map.drain_events();
    map.remove("missing").unwrap();
    map.clear();

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(map.notifications(), 5);
}
