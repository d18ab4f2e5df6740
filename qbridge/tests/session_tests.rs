//! End-to-end tests of the session loop over a loopback connection.
use qbridge::config::{EpsilonSource, SessionConfig};
use qbridge::session::Session;
use qbridge_candle_agent::dqn::DqnConfig;
use qbridge_core::exploration::EpsilonSchedule;
use qbridge_core::record::{NullRecorder, Record, Recorder};
use qbridge_core::replay_buffer::ReplayBufferConfig;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Learner that never trains during a test (warmup far above what is sent).
fn test_agent_config() -> DqnConfig {
    DqnConfig::default()
        .warmup(10_000)
        .replay(ReplayBufferConfig::default().capacity(64))
}

fn test_session_config() -> SessionConfig {
    SessionConfig::default()
        .agent(test_agent_config())
        .checkpoint_interval(0)
}

fn start_server(config: SessionConfig) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut session = Session::new(
            config,
            Box::new(NullRecorder::new()),
            Box::new(NullRecorder::new()),
        );
        session.run(stream).unwrap();
    });
    (addr, handle)
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn send(&mut self, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).unwrap();
    }

    fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
    }

    fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }
}

/// Forwards written records into a buffer shared with the test body.
struct SharedRecorder(Arc<Mutex<Vec<Record>>>);

impl Recorder for SharedRecorder {
    fn write(&mut self, record: Record) {
        self.0.lock().unwrap().push(record);
    }

    fn flush(&mut self) {}
}

fn transition(node_id: i64, reward: f64) -> Value {
    json!({
        "type": "transition",
        "action_id": "move",
        "node_id": node_id,
        "reward": reward,
        "state_t": [0.1, 0.2, 0.3],
        "state_tp1": [0.2, 0.3, 0.4],
    })
}

#[test]
fn greedy_reply_before_training_is_deterministic() {
    let config = test_session_config().epsilon(EpsilonSource::External { default: 0.1 });
    let (addr, handle) = start_server(config);
    let mut client = Client::connect(addr);

    client.send(json!({
        "type": "action_request",
        "state": [0.0, 0.0, 0.0],
        "candidate_node_ids": [1, 2],
        "epsilon": 0.0,
    }));
    let reply = client.recv();

    assert_eq!(reply["type"], "action_reply");
    assert_eq!(reply["is_random"], false);
    assert_eq!(reply["epsilon"], 0.0);
    assert_eq!(reply["candidate_node_ids"], json!([1, 2]));

    let q_values = reply["q_values"].as_array().unwrap();
    assert_eq!(q_values.len(), 2);
    let expected = if q_values[0].as_f64().unwrap() >= q_values[1].as_f64().unwrap() {
        1
    } else {
        2
    };
    assert_eq!(reply["chosen_node_id"], expected);

    drop(client);
    handle.join().unwrap();
}

#[test]
fn horizon_transitions_advance_the_episode_schedule() {
    let horizon = 2;
    let config = test_session_config()
        .horizon(horizon)
        .epsilon(EpsilonSource::Schedule(
            EpsilonSchedule::default().decay_episodes(3),
        ));
    let (addr, handle) = start_server(config);
    let mut client = Client::connect(addr);

    // Episode 1: full exploration.
    client.send(json!({
        "type": "action_request",
        "state": [0.0, 0.0, 0.0],
        "candidate_node_ids": [1, 2],
    }));
    let reply = client.recv();
    assert_eq!(reply["epsilon"], 1.0);
    assert_eq!(reply["is_random"], true);

    // One full pseudo-episode of transitions.
    for step in 0..horizon {
        client.send(transition(step as i64, 1.0));
        let update = client.recv();
        assert_eq!(update["type"], "q_update");
        assert_eq!(update["node_ids"], json!([step]));
        assert_eq!(update["q_values"].as_array().unwrap().len(), 1);
    }

    // The episode counter moved exactly once: epsilon decayed one notch.
    client.send(json!({
        "type": "action_request",
        "state": [0.0, 0.0, 0.0],
        "candidate_node_ids": [1, 2],
    }));
    let reply = client.recv();
    let epsilon = reply["epsilon"].as_f64().unwrap();
    assert!((epsilon - 0.55).abs() < 1e-9, "epsilon was {}", epsilon);

    drop(client);
    handle.join().unwrap();
}

#[test]
fn a_full_horizon_emits_one_episode_summary() {
    let horizon = 3;
    let config = test_session_config()
        .horizon(horizon)
        .epsilon(EpsilonSource::External { default: 0.0 });

    let episodes: Arc<Mutex<Vec<Record>>> = Arc::default();
    let sink = episodes.clone();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut session = Session::new(
            config,
            Box::new(NullRecorder::new()),
            Box::new(SharedRecorder(sink)),
        );
        session.run(stream).unwrap();
    });

    let mut client = Client::connect(addr);
    for step in 0..horizon {
        client.send(transition(step as i64, 0.5));
        let update = client.recv();
        assert_eq!(update["type"], "q_update");
    }
    drop(client);
    handle.join().unwrap();

    let episodes = episodes.lock().unwrap();
    assert_eq!(episodes.len(), 1);
    let summary = &episodes[0];
    assert_eq!(summary.get_scalar("episode").unwrap(), 1.0);
    assert_eq!(
        summary.get_scalar("episodic/length").unwrap(),
        horizon as f32
    );
    assert_eq!(summary.get_scalar("episodic/return").unwrap(), 1.5);
}

#[test]
fn unknown_and_malformed_lines_keep_the_session_alive() {
    let config = test_session_config().epsilon(EpsilonSource::External { default: 0.0 });
    let (addr, handle) = start_server(config);
    let mut client = Client::connect(addr);

    client.send(json!({"type": "ping"}));
    client.send_raw("not json at all");
    client.send(json!({
        "type": "action_request",
        "state": [0.5, 0.5],
        "candidate_node_ids": [9],
    }));

    // The only reply is for the valid request.
    let reply = client.recv();
    assert_eq!(reply["type"], "action_reply");
    assert_eq!(reply["chosen_node_id"], 9);

    client.send(json!({
        "type": "action_request",
        "state": [0.5, 0.5],
        "candidate_node_ids": [4],
    }));
    assert_eq!(client.recv()["chosen_node_id"], 4);

    drop(client);
    handle.join().unwrap();
}

#[test]
fn empty_action_request_is_a_no_op() {
    let config = test_session_config().epsilon(EpsilonSource::External { default: 0.0 });
    let (addr, handle) = start_server(config);
    let mut client = Client::connect(addr);

    client.send(json!({
        "type": "action_request",
        "state": [0.1, 0.2],
        "candidate_node_ids": [],
    }));
    client.send(json!({
        "type": "action_request",
        "state": [],
        "candidate_node_ids": [1],
    }));
    client.send(json!({
        "type": "action_request",
        "state": [0.1, 0.2],
        "candidate_node_ids": [5],
    }));

    let reply = client.recv();
    assert_eq!(reply["candidate_node_ids"], json!([5]));

    drop(client);
    handle.join().unwrap();
}

#[test]
fn mismatched_state_dimensions_are_rejected() {
    let config = test_session_config().epsilon(EpsilonSource::External { default: 0.0 });
    let (addr, handle) = start_server(config);
    let mut client = Client::connect(addr);

    // Fixes the state dimensionality at 3.
    client.send(json!({
        "type": "action_request",
        "state": [0.0, 0.0, 0.0],
        "candidate_node_ids": [1],
    }));
    client.recv();

    // Wrong dimensionality: rejected, no reply.
    client.send(json!({
        "type": "transition",
        "node_id": 5,
        "reward": 1.0,
        "state_t": [0.1, 0.2],
        "state_tp1": [0.2, 0.3],
    }));
    client.send(transition(7, 0.5));

    let update = client.recv();
    assert_eq!(update["type"], "q_update");
    assert_eq!(update["node_ids"], json!([7]));

    drop(client);
    handle.join().unwrap();
}
