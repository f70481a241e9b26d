use crate::identity::InstanceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Immutable record of one intercepted method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Class the call is attributed to.
    pub class: String,
    /// Identity of the receiving instance; `None` for static calls.
    pub instance: Option<InstanceId>,
    pub method: String,
    /// Arguments as passed to the call, verbatim.
    pub args: Vec<Value>,
    /// Result the call produced, stubbed or real.
    pub result: Value,
}

/// Ordered per-class and per-instance call logs.
///
/// Records are appended, never mutated and never removed individually. Stub
/// cleanup does not touch the logs; [`clear`](Self::clear) is the harness's
/// separate wipe operation.
#[derive(Debug, Default)]
pub struct CallRecorder {
    class_log: HashMap<String, Vec<CallRecord>>,
    instance_log: HashMap<InstanceId, Vec<CallRecord>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record to the class log, and additionally to the instance
    /// log when the call had an instance receiver. Never fails.
    pub fn record(&mut self, record: CallRecord) {
        trace!(
            class = record.class.as_str(),
            method = record.method.as_str(),
            "Recording call"
        );
        if let Some(id) = record.instance {
            self.instance_log
                .entry(id)
                .or_default()
                .push(record.clone());
        }
        self.class_log
            .entry(record.class.clone())
            .or_default()
            .push(record);
    }

    /// Calls recorded against a class, in order. Empty for unknown classes.
    pub fn class_calls(&self, class: &str) -> &[CallRecord] {
        self.class_log.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Calls recorded against one instance, in order.
    pub fn instance_calls(&self, id: InstanceId) -> &[CallRecord] {
        self.instance_log
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop every recorded call from both logs.
    pub fn clear(&mut self) {
        self.class_log.clear();
        self.instance_log.clear();
    }
}
