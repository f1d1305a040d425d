//! Inbound schedule requests.

use serde::{Deserialize, Serialize};

use crate::tasks::Inputs;

/// One task to schedule: `{"registered_task": "app.tasks.build", "inputs": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Dotted name of a registered runnable.
    #[serde(alias = "registeredTask")]
    pub registered_task: String,
    #[serde(default)]
    pub inputs: Inputs,
}

impl ScheduleRequest {
    pub fn new(registered_task: impl Into<String>, inputs: Inputs) -> Self {
        Self {
            registered_task: registered_task.into(),
            inputs,
        }
    }
}

/// Request body: a single request or an array of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleBody {
    Many(Vec<ScheduleRequest>),
    One(ScheduleRequest),
}

impl ScheduleBody {
    pub fn into_vec(self) -> Vec<ScheduleRequest> {
        match self {
            ScheduleBody::Many(requests) => requests,
            ScheduleBody::One(request) => vec![request],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_single_or_array() {
        let one: ScheduleBody = serde_json::from_value(json!({
            "registeredTask": "app.tasks.sleep",
            "inputs": {"duration": 1}
        }))
        .unwrap();
        let one = one.into_vec();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].registered_task, "app.tasks.sleep");
        assert_eq!(one[0].inputs["duration"], 1);

        let many: ScheduleBody = serde_json::from_value(json!([
            {"registered_task": "app.a"},
            {"registered_task": "app.b", "inputs": {}}
        ]))
        .unwrap();
        let many = many.into_vec();
        assert_eq!(many.len(), 2);
        assert!(many[0].inputs.is_empty());
    }
}
