// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type and group inference over single raw records.

use serde_json::Value;

use crate::raw::{RawElement, KNOWN_BUCKETS, PARAMETERS};
use crate::value::ParameterType;

/// Group for fields found only at the top level of a raw record.
pub const GENERAL_GROUP: &str = "General";
/// Group for the free-form `parameters` bucket and for fields not found at all.
pub const PARAMETERS_GROUP: &str = "Parameters";

/// Infers the primitive type of a value: boolean first, then number, else string.
///
/// Numeric strings stay strings.
pub fn infer_type(value: &Value) -> ParameterType {
    match value {
        Value::Bool(_) => ParameterType::Boolean,
        Value::Number(_) => ParameterType::Number,
        _ => ParameterType::String,
    }
}

/// Infers the semantic group a field belongs to.
///
/// Buckets are scanned in priority order (`Identity Data`, `Constraints`,
/// `Other`, `parameters`); the first containing the field wins. A field only
/// present at the top level is `General`; a field found nowhere is
/// `Parameters`.
pub fn infer_group(raw: &RawElement, field: &str) -> String {
    for bucket in KNOWN_BUCKETS {
        if bucket_contains(raw, bucket, field) {
            return bucket_group_name(bucket).to_string();
        }
    }
    if raw.get(field).is_some() {
        GENERAL_GROUP.to_string()
    } else {
        PARAMETERS_GROUP.to_string()
    }
}

/// Display name of a structural bucket.
pub fn bucket_group_name(bucket: &str) -> &str {
    if bucket == PARAMETERS {
        PARAMETERS_GROUP
    } else {
        bucket
    }
}

fn bucket_contains(raw: &RawElement, bucket: &str, field: &str) -> bool {
    let Some(map) = raw.bucket(bucket) else {
        return false;
    };
    if map.contains_key(field) {
        return true;
    }
    // Speckle-style parameter entries: { "<id>": { "name": "...", "value": ... } }
    bucket == PARAMETERS
        && map.values().any(|entry| {
            entry
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name == field)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawElement {
        RawElement::decode(value, 0).unwrap()
    }

    #[test]
    fn boolean_before_number_before_string() {
        assert_eq!(infer_type(&json!(false)), ParameterType::Boolean);
        assert_eq!(infer_type(&json!(12)), ParameterType::Number);
        assert_eq!(infer_type(&json!(0.5)), ParameterType::Number);
        assert_eq!(infer_type(&json!("12")), ParameterType::String);
        assert_eq!(infer_type(&json!(null)), ParameterType::String);
    }

    #[test]
    fn group_follows_bucket_priority() {
        let r = raw(json!({
            "Identity Data": { "Comments": "a" },
            "Other": { "Comments": "b", "Phase": "New" },
            "Constraints": { "Host": "W1" }
        }));
        assert_eq!(infer_group(&r, "Comments"), "Identity Data");
        assert_eq!(infer_group(&r, "Host"), "Constraints");
        assert_eq!(infer_group(&r, "Phase"), "Other");
    }

    #[test]
    fn group_falls_back_to_general_then_parameters() {
        let r = raw(json!({ "Width": 200, "parameters": { "Fire Rating": "EI60" } }));
        assert_eq!(infer_group(&r, "Width"), GENERAL_GROUP);
        assert_eq!(infer_group(&r, "Fire Rating"), PARAMETERS_GROUP);
        assert_eq!(infer_group(&r, "Missing"), PARAMETERS_GROUP);
    }

    #[test]
    fn group_sees_named_parameter_entries() {
        let r = raw(json!({
            "parameters": { "ALL_MODEL_MARK": { "name": "Mark", "value": "D1" } }
        }));
        assert_eq!(infer_group(&r, "Mark"), PARAMETERS_GROUP);
    }
}
