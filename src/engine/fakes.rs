//! Scripted gateway and time fakes shared by engine and driver tests

use super::Sleeper;
use crate::error::{Error, Result};
use crate::gateway::{ResultSet, SearchGateway};
use crate::model::{decode_record, Entity, EntityKind};
use crate::streams::StreamDef;
use crate::window::Window;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted gateway response
pub(crate) enum Reply {
    /// Result set with these records
    Records(Vec<Entity>),
    /// Result set advertising a different total
    Advertised(Vec<Entity>, usize),
    /// Result set that fails after yielding these records
    FailAfter(Vec<Entity>, Error),
    /// The search itself fails
    Fail(Error),
}

/// Gateway answering searches from a script, in call order.
///
/// Once the script runs out every search returns an empty result set.
pub(crate) struct ScriptedGateway {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Option<Window>>>,
}

impl ScriptedGateway {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Windows searched so far; `None` marks a full enumeration
    pub(crate) fn calls(&self) -> Vec<Option<Window>> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: Option<Window>) -> Result<Box<dyn ResultSet>> {
        self.calls.lock().unwrap().push(call);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Records(Vec::new()));

        let results = match reply {
            Reply::Records(records) => ScriptedResults::new(records, None, None),
            Reply::Advertised(records, total) => ScriptedResults::new(records, Some(total), None),
            Reply::FailAfter(records, e) => ScriptedResults::new(records, None, Some(e)),
            Reply::Fail(e) => return Err(e),
        };
        Ok(Box::new(results))
    }
}

#[async_trait]
impl SearchGateway for ScriptedGateway {
    async fn search(&self, _stream: &StreamDef, window: Window) -> Result<Box<dyn ResultSet>> {
        self.answer(Some(window))
    }

    async fn all(&self, _stream: &StreamDef) -> Result<Box<dyn ResultSet>> {
        self.answer(None)
    }
}

struct ScriptedResults {
    advertised: usize,
    records: VecDeque<Entity>,
    failure: Option<Error>,
}

impl ScriptedResults {
    fn new(records: Vec<Entity>, advertised: Option<usize>, failure: Option<Error>) -> Self {
        Self {
            advertised: advertised.unwrap_or(records.len()),
            records: records.into(),
            failure,
        }
    }
}

#[async_trait]
impl ResultSet for ScriptedResults {
    fn maximum_size(&self) -> usize {
        self.advertised
    }

    async fn next_record(&mut self) -> Result<Option<Entity>> {
        if let Some(record) = self.records.pop_front() {
            return Ok(Some(record));
        }
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

/// Sleeper that records requested durations and returns immediately
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Transaction created and last updated at the given RFC 3339 timestamps
pub(crate) fn transaction(id: &str, created_at: &str, updated_at: &str) -> Entity {
    decode_record(
        EntityKind::Transaction,
        &json!({
            "id": id,
            "amount": "10.00",
            "status": "settled",
            "created_at": created_at,
            "updated_at": updated_at,
        }),
    )
    .unwrap()
}

pub(crate) fn maintenance() -> Error {
    Error::maintenance("503 Service Unavailable")
}

pub(crate) fn connection_lost() -> Error {
    Error::connection("connection reset by peer")
}
