//! Request correlation and frame decoding.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;

use super::types::{Op, ReplyPayload, RequestFrame, ServerFrame};
use crate::error::PresenceError;

pub(crate) type Reply = oneshot::Sender<Result<Value, PresenceError>>;

/// Replies awaited on the current socket, keyed by ref.
#[derive(Default)]
pub(crate) struct PendingRequests {
    next_ref: u64,
    waiters: HashMap<u64, Reply>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_ref(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    pub fn insert(&mut self, ref_id: u64, reply: Reply) {
        // Callers that timed out have dropped their receiver.
        self.waiters.retain(|_, tx| !tx.is_closed());
        self.waiters.insert(ref_id, reply);
    }

    /// Deliver a reply. Returns `false` for unknown refs.
    pub fn resolve(&mut self, ref_id: u64, result: Result<Value, PresenceError>) -> bool {
        match self.waiters.remove(&ref_id) {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn fail_all(&mut self, err: PresenceError) {
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }
}

pub(crate) fn encode(
    ref_id: u64,
    op: Op,
    path: Option<&str>,
    payload: &Value,
) -> Result<String, PresenceError> {
    let frame = RequestFrame {
        ref_id,
        op,
        path,
        payload,
    };
    Ok(serde_json::to_string(&frame)?)
}

#[derive(Debug, PartialEq)]
pub(crate) enum Inbound {
    Reply {
        ref_id: u64,
        result: Result<Value, PresenceError>,
    },
    /// Any other server op; ignored by the client.
    Other(String),
}

pub(crate) fn decode(text: &str) -> Result<Inbound, PresenceError> {
    let frame: ServerFrame = serde_json::from_str(text)?;
    if frame.op != "reply" {
        trace!(op = %frame.op, "ignoring server push");
        return Ok(Inbound::Other(frame.op));
    }
    let ref_id = frame
        .ref_id
        .ok_or_else(|| PresenceError::Decode("reply without ref".into()))?;
    let payload: ReplyPayload = serde_json::from_value(frame.payload)?;
    Ok(Inbound::Reply {
        ref_id,
        result: payload.into_result(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refs_are_unique_and_increasing() {
        let mut p = PendingRequests::new();
        let a = p.next_ref();
        let b = p.next_ref();
        assert!(b > a);
    }

    #[tokio::test]
    async fn resolve_delivers_to_waiter() {
        let mut p = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        let r = p.next_ref();
        p.insert(r, tx);

        assert!(p.resolve(r, Ok(json!(1))));
        assert_eq!(rx.await.unwrap(), Ok(json!(1)));
        assert!(!p.resolve(r, Ok(json!(2))));
    }

    #[tokio::test]
    async fn fail_all_drains_every_waiter() {
        let mut p = PendingRequests::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        p.insert(1, tx1);
        p.insert(2, tx2);

        p.fail_all(PresenceError::Disconnected);
        assert_eq!(p.len(), 0);
        assert_eq!(rx1.await.unwrap(), Err(PresenceError::Disconnected));
        assert_eq!(rx2.await.unwrap(), Err(PresenceError::Disconnected));
    }

    #[test]
    fn abandoned_waiters_are_pruned() {
        let mut p = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        p.insert(1, tx);
        drop(rx);
        let (tx, _rx) = oneshot::channel();
        p.insert(2, tx);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn decode_reply() {
        let text = r#"{"op":"reply","ref":3,"payload":{"status":"ok","response":{"state":"online"}}}"#;
        assert_eq!(
            decode(text).unwrap(),
            Inbound::Reply {
                ref_id: 3,
                result: Ok(json!({"state": "online"}))
            }
        );
    }

    #[test]
    fn decode_push_and_garbage() {
        assert_eq!(
            decode(r#"{"op":"presence_diff","payload":{}}"#).unwrap(),
            Inbound::Other("presence_diff".into())
        );
        assert!(matches!(decode("not json"), Err(PresenceError::Decode(_))));
        assert!(matches!(
            decode(r#"{"op":"reply","payload":{"status":"ok"}}"#),
            Err(PresenceError::Decode(_))
        ));
    }

    #[test]
    fn encode_includes_ref_and_op() {
        let text = encode(4, Op::Update, Some("status/u"), &json!({"a": 1})).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["ref"], 4);
        assert_eq!(v["op"], "update");
    }
}
