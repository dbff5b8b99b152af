//! The compute-service stream modelled as a tagged sum rather than
//! dispatched by string type at the call site. `parse_record` is the one
//! place that knows the wire shape is a loosely-typed JSON object with a
//! `type` discriminator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ComputeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotOutputType {
    Text,
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotOutputRecord {
    pub output_type: BotOutputType,
    pub content: String,
    pub filename: Option<String>,
    pub caption: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackCostRecord {
    pub total_cost: Decimal,
    pub currency: Option<String>,
    pub api_calls: Option<i64>,
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TerminalRecord {
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorRecord {
    #[serde(default)]
    pub message: String,
}

/// One decoded line of the compute service's stream. `Progress` carries no
/// structured payload the coordinator needs — it only ever gets suppressed.
#[derive(Debug, Clone)]
pub enum StreamRecord {
    Progress,
    BotOutput(BotOutputRecord),
    TrackCost(TrackCostRecord),
    Complete(TerminalRecord),
    Done(TerminalRecord),
    Error(ErrorRecord),
    Cancelled(TerminalRecord),
}

/// Decodes one line-delimited JSON record. A `bot_output` whose
/// `output_type` is itself `"track_cost"` is folded into
/// [`StreamRecord::TrackCost`] by parsing its `content` as the cost
/// payload — the upstream service sometimes nests the trailer this way
/// instead of emitting it as its own top-level record.
pub fn parse_record(line: &str) -> Result<StreamRecord, ComputeError> {
    let value: Value = serde_json::from_str(line)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ComputeError::Decode("stream record missing \"type\"".into()))?;

    match kind {
        "progress" => Ok(StreamRecord::Progress),
        "bot_output" => {
            let output_type = value.get("output_type").and_then(Value::as_str).unwrap_or("text");
            if output_type == "track_cost" {
                let nested: Value = value
                    .get("content")
                    .and_then(|content| content.as_str())
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or(value.clone());
                Ok(StreamRecord::TrackCost(serde_json::from_value(nested)?))
            } else {
                Ok(StreamRecord::BotOutput(serde_json::from_value(value)?))
            }
        }
        "track_cost" => Ok(StreamRecord::TrackCost(serde_json::from_value(value)?)),
        "complete" => Ok(StreamRecord::Complete(serde_json::from_value(value)?)),
        "done" => Ok(StreamRecord::Done(serde_json::from_value(value)?)),
        "error" => Ok(StreamRecord::Error(serde_json::from_value(value)?)),
        "cancelled" => Ok(StreamRecord::Cancelled(serde_json::from_value(value)?)),
        other => Err(ComputeError::Decode(format!("unknown stream record type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_records_carry_no_payload() {
        assert!(matches!(parse_record(r#"{"type":"progress","message":"step 1"}"#).unwrap(), StreamRecord::Progress));
    }

    #[test]
    fn bot_output_decodes_text_payload() {
        let record = parse_record(r#"{"type":"bot_output","output_type":"text","content":"hello"}"#).unwrap();
        match record {
            StreamRecord::BotOutput(b) => {
                assert_eq!(b.output_type, BotOutputType::Text);
                assert_eq!(b.content, "hello");
            }
            other => panic!("expected BotOutput, got {other:?}"),
        }
    }

    #[test]
    fn top_level_track_cost_decodes_total_cost() {
        let record = parse_record(r#"{"type":"track_cost","total_cost":"2.50"}"#).unwrap();
        match record {
            StreamRecord::TrackCost(t) => assert_eq!(t.total_cost, Decimal::new(250, 2)),
            other => panic!("expected TrackCost, got {other:?}"),
        }
    }

    #[test]
    fn track_cost_nested_inside_bot_output_is_unwrapped() {
        let line = r#"{"type":"bot_output","output_type":"track_cost","content":"{\"total_cost\":\"1.00\"}"}"#;
        let record = parse_record(line).unwrap();
        match record {
            StreamRecord::TrackCost(t) => assert_eq!(t.total_cost, Decimal::ONE),
            other => panic!("expected TrackCost, got {other:?}"),
        }
    }

    #[test]
    fn terminal_records_carry_the_task_id() {
        let record = parse_record(r#"{"type":"complete","task_id":"abc-123"}"#).unwrap();
        match record {
            StreamRecord::Complete(t) => assert_eq!(t.task_id.as_deref(), Some("abc-123")),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        assert!(parse_record(r#"{"type":"mystery"}"#).is_err());
    }
}
