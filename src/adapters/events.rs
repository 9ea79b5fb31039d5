//! Decoding identifiers out of post-submission event logs.
//!
//! Relayer register/remove proposals return their application id only through a
//! notification: `{ event_name: "putRelayerApply" | "putRelayerRemove", args: [id, ...] }`.

use serde_json::Value;

use crate::error::{GovernanceError, Result};
use crate::types::{NotificationRecord, TxHash};

/// Find `event` among `records` and decode its first argument as an id.
///
/// If the event occurs more than once the last occurrence wins.
pub fn decode_handle_id(
    tx_hash: &TxHash,
    records: &[NotificationRecord],
    event: &str,
) -> Result<u64> {
    let record = records
        .iter()
        .rev()
        .find(|r| r.event_name == event)
        .ok_or_else(|| GovernanceError::EventMissing {
            tx_hash: tx_hash.clone(),
            event: event.to_string(),
        })?;

    let first = record.args.first().ok_or_else(|| GovernanceError::EventMalformed {
        event: event.to_string(),
        reason: "no arguments".into(),
    })?;

    id_from_value(first).ok_or_else(|| GovernanceError::EventMalformed {
        event: event.to_string(),
        reason: format!("first argument {} is not an unsigned id", first),
    })
}

fn id_from_value(value: &Value) -> Option<u64> {
    match value {
        // nodes may report numbers as JSON floats
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(id_from_float)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `u64::MAX as f64` rounds up to 2^64, which is already out of range.
fn id_from_float(f: f64) -> Option<u64> {
    (f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash() -> TxHash {
        TxHash::new("aa")
    }

    #[test]
    fn test_decode_relayer_apply() {
        let records = vec![
            NotificationRecord::new("gas", "transfer", vec![json!("from"), json!(10)]),
            NotificationRecord::new(
                "relayer_manager",
                "putRelayerApply",
                vec![json!(42), json!(["addr"])],
            ),
        ];
        assert_eq!(decode_handle_id(&hash(), &records, "putRelayerApply").unwrap(), 42);
    }

    #[test]
    fn test_float_and_string_ids() {
        let records = vec![NotificationRecord::new("r", "putRelayerRemove", vec![json!(7.0)])];
        assert_eq!(decode_handle_id(&hash(), &records, "putRelayerRemove").unwrap(), 7);
        let records = vec![NotificationRecord::new("r", "putRelayerRemove", vec![json!("8")])];
        assert_eq!(decode_handle_id(&hash(), &records, "putRelayerRemove").unwrap(), 8);
    }

    #[test]
    fn test_missing_event() {
        let records = vec![NotificationRecord::new("r", "other", vec![json!(1)])];
        assert!(matches!(
            decode_handle_id(&hash(), &records, "putRelayerApply"),
            Err(GovernanceError::EventMissing { .. })
        ));
    }

    #[test]
    fn test_malformed_event() {
        let records = vec![NotificationRecord::new("r", "putRelayerApply", vec![json!(-1.5)])];
        assert!(matches!(
            decode_handle_id(&hash(), &records, "putRelayerApply"),
            Err(GovernanceError::EventMalformed { .. })
        ));
        let records = vec![NotificationRecord::new("r", "putRelayerApply", vec![])];
        assert!(matches!(
            decode_handle_id(&hash(), &records, "putRelayerApply"),
            Err(GovernanceError::EventMalformed { .. })
        ));
    }

    #[test]
    fn test_float_id_beyond_u64_is_malformed() {
        let too_big = json!(18446744073709551616.0);
        let records = vec![NotificationRecord::new("r", "putRelayerApply", vec![too_big])];
        assert!(matches!(
            decode_handle_id(&hash(), &records, "putRelayerApply"),
            Err(GovernanceError::EventMalformed { .. })
        ));
        let exact = json!(9007199254740992.0);
        let records = vec![NotificationRecord::new("r", "putRelayerApply", vec![exact])];
        assert_eq!(decode_handle_id(&hash(), &records, "putRelayerApply").unwrap(), 1 << 53);
    }
}
