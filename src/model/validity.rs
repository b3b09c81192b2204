use super::Value;
use crate::host::Liveness;

/// Whether `value` counts as "not set".
///
/// Nil, tagged values without a type tag and handles whose target is no
/// longer live are unset; a tagged value with a payload is judged by its
/// payload. Everything else is set.
pub fn is_unset<L: Liveness + ?Sized>(value: &Value, liveness: &L) -> bool {
    match value {
        Value::Nil => true,
        Value::Variant(None) => true,
        Value::Variant(Some(inner)) => is_unset(inner, liveness),
        Value::Object(id) => !liveness.is_live(*id),
        Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_)
        | Value::Opaque(_)
        | Value::Array(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectId;
    use std::collections::HashSet;

    struct LiveSet(HashSet<ObjectId>);

    impl Liveness for LiveSet {
        fn is_live(&self, id: ObjectId) -> bool {
            self.0.contains(&id)
        }
    }

    fn live(ids: &[u64]) -> LiveSet {
        LiveSet(ids.iter().copied().map(ObjectId::new).collect())
    }

    #[test]
    fn test_nil_is_unset() {
        assert!(is_unset(&Value::Nil, &live(&[])));
    }

    #[test]
    fn test_live_handle_is_set() {
        let value = Value::Object(ObjectId::new(1));
        assert!(!is_unset(&value, &live(&[1])));
    }

    #[test]
    fn test_dangling_handle_is_unset() {
        // Non-null handle whose target was freed
        let value = Value::Object(ObjectId::new(2));
        assert!(is_unset(&value, &live(&[1])));
    }

    #[test]
    fn test_tagged_values() {
        let liveness = live(&[1]);
        assert!(is_unset(&Value::Variant(None), &liveness));
        assert!(is_unset(&Value::tagged(Value::Nil), &liveness));
        assert!(is_unset(&Value::tagged(Value::Object(ObjectId::new(9))), &liveness));
        assert!(!is_unset(&Value::tagged(Value::Object(ObjectId::new(1))), &liveness));
        assert!(!is_unset(&Value::tagged(Value::Int(0)), &liveness));
    }

    #[test]
    fn test_plain_values_are_set() {
        let liveness = live(&[]);
        assert!(!is_unset(&Value::Bool(false), &liveness));
        assert!(!is_unset(&Value::Str(String::new()), &liveness));
        assert!(!is_unset(&Value::Array(Vec::new()), &liveness));
        assert!(!is_unset(&Value::Opaque("Vector2(0, 0)".into()), &liveness));
    }
}
