use std::sync::OnceLock;

use regex::Regex;

const ENTITY_ID_PATTERN: &str = r"^[a-z0-9_]+\.[a-z0-9_]+$";

static ENTITY_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn entity_id_regex() -> &'static Regex {
    ENTITY_ID_REGEX.get_or_init(|| Regex::new(ENTITY_ID_PATTERN).expect("valid regex pattern"))
}

/// Check that `entity_id` has the `domain.object_id` shape the hub uses.
pub fn is_valid_entity_id(entity_id: &str) -> bool {
    entity_id_regex().is_match(entity_id)
}
