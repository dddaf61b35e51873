use serde_json::{Map, Value};

/// Tray text: one `"<friendly_name>: <state><unit>"` line per subscribed entity
/// present in `states`.
///
/// `None` when there is nothing to show yet (no states or no subscriptions).
pub fn entity_summary(states: Option<&Map<String, Value>>, subscribed: &[String]) -> Option<String> {
    let states = states?;
    if subscribed.is_empty() {
        return None;
    }

    let lines: Vec<String> = subscribed
        .iter()
        .filter_map(|entity_id| states.get(entity_id).map(|state| describe(entity_id, state)))
        .collect();

    Some(lines.join("\n"))
}

fn describe(entity_id: &str, state: &Value) -> String {
    let attributes = state.get("attributes");
    let name = attributes
        .and_then(|a| a.get("friendly_name"))
        .and_then(Value::as_str)
        .unwrap_or(entity_id);
    let value = match state.get("state") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let unit = attributes
        .and_then(|a| a.get("unit_of_measurement"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    format!("{name}: {value}{unit}")
}
