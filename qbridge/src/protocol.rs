//! Wire messages of the simulation link.
//!
//! Requests arrive as UTF-8 JSON objects, one per line, dispatched on their
//! `type` field. Inbound lines may carry a UTF-8 BOM prefix, which is
//! stripped before parsing.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

/// Action-selection query over a candidate set.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    /// Current state vector.
    #[serde(default)]
    pub state: Vec<f32>,

    /// Candidate action identifiers to score.
    #[serde(default)]
    pub candidate_node_ids: Vec<i64>,

    /// Exploration probability proposed by the peer.
    #[serde(default)]
    pub epsilon: Option<f64>,
}

/// One environment transition reported by the peer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionMsg {
    /// Opaque action tag, echoed in diagnostics only.
    #[serde(default)]
    pub action_id: Value,

    /// Identifier of the action that was executed.
    #[serde(default = "default_node_id")]
    pub node_id: i64,

    /// Observed reward.
    #[serde(default)]
    pub reward: f32,

    /// State before the action.
    #[serde(default)]
    pub state_t: Vec<f32>,

    /// State after the action.
    #[serde(default)]
    pub state_tp1: Vec<f32>,
}

fn default_node_id() -> i64 {
    -1
}

/// A parsed inbound message.
#[derive(Debug)]
pub enum Inbound {
    /// An `action_request` message.
    ActionRequest(ActionRequest),

    /// A `transition` message.
    Transition(TransitionMsg),

    /// A well-formed object of an unhandled type.
    Unknown(String),
}

/// Replies of the decision service, tagged with their `type` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Reply to an [`ActionRequest`].
    ActionReply {
        chosen_node_id: i64,
        candidate_node_ids: Vec<i64>,
        q_values: Vec<f64>,
        epsilon: f64,
        is_random: bool,
    },

    /// Fresh Q estimate sent after ingesting a transition.
    QUpdate {
        node_ids: Vec<i64>,
        q_values: Vec<f64>,
    },
}

/// Parses one inbound line.
///
/// Fails on malformed JSON or on an object whose fields do not deserialize;
/// a well-formed object with an unhandled `type` parses to
/// [`Inbound::Unknown`].
pub fn parse_line(line: &str) -> Result<Inbound> {
    let line = line.trim_start_matches('\u{feff}').trim();
    let value: Value = serde_json::from_str(line)?;
    let msg_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match msg_type.as_str() {
        "action_request" => Ok(Inbound::ActionRequest(serde_json::from_value(value)?)),
        "transition" => Ok(Inbound::Transition(serde_json::from_value(value)?)),
        _ => Ok(Inbound::Unknown(msg_type)),
    }
}

/// Writes one reply as a newline-terminated JSON line.
pub fn write_line<W: Write>(writer: &mut W, msg: &Outbound) -> Result<()> {
    let line = serde_json::to_string(msg)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_request_with_bom() {
        let line = "\u{feff}{\"type\":\"action_request\",\"state\":[0.0,1.0],\"candidate_node_ids\":[1,2],\"epsilon\":0.25}";
        match parse_line(line).unwrap() {
            Inbound::ActionRequest(req) => {
                assert_eq!(req.state, vec![0.0, 1.0]);
                assert_eq!(req.candidate_node_ids, vec![1, 2]);
                assert_eq!(req.epsilon, Some(0.25));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn transition_fields_have_defaults() {
        let line = r#"{"type":"transition","state_t":[0.5],"state_tp1":[0.6]}"#;
        match parse_line(line).unwrap() {
            Inbound::Transition(msg) => {
                assert_eq!(msg.node_id, -1);
                assert_eq!(msg.reward, 0.0);
                assert!(msg.action_id.is_null());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        match parse_line(r#"{"type":"ping"}"#).unwrap() {
            Inbound::Unknown(t) => assert_eq!(t, "ping"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(parse_line("not json at all").is_err());
    }

    #[test]
    fn replies_are_tagged_lines() {
        let mut out = Vec::new();
        let reply = Outbound::QUpdate {
            node_ids: vec![7],
            q_values: vec![0.5],
        };
        write_line(&mut out, &reply).unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["type"], "q_update");
        assert_eq!(value["node_ids"][0], 7);
    }
}
