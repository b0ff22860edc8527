//! Query results
//!
//! The service answers every query with a JSON `result` whose shape depends
//! on what was asked: a bare number for a simple count, a list of buckets
//! keyed by `result` for a group-by, a list of `{timeframe, value}` buckets
//! for an interval, or both nested (intervals of group-bys).
//!
//! [`QueryResult::decode`] rebuilds a typed tree from that value. The shape
//! is only unambiguous together with what the query requested, so the
//! group-by and interval flags of the originating query are passed down
//! explicitly and cleared once the matching bucket layer has consumed them.

use super::timeframe::{Timeframe, TIMEFRAME_KEY};
use serde_json::{Map, Value};

const RESULT_KEY: &str = "result";
const VALUE_KEY: &str = "value";

/// A decoded query result, at any nesting depth
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Integer(i64),
    Double(f64),
    String(String),
    List(Vec<QueryResult>),
    GroupBy(GroupBy),
    Interval(Interval),
    /// Free-form payload, kept verbatim (select-unique values, extractions, ...)
    Opaque(Value),
}

/// One bucket of a grouped aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    /// Group-by property name to the bucket's value for it
    pub properties: Map<String, Value>,
    pub result: Box<QueryResult>,
}

/// One bucket of a time-windowed aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub timeframe: Timeframe,
    pub value: Box<QueryResult>,
}

impl QueryResult {
    /// Classify a raw result value.
    ///
    /// `group_by` and `interval` describe the originating query, not the
    /// current nesting level. A mapping that matches neither bucket shape
    /// is kept as [`QueryResult::Opaque`].
    pub fn decode(raw: &Value, group_by: bool, interval: bool) -> Self {
        match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    // u64 beyond i64::MAX lands here too
                    Self::Double(f)
                } else {
                    Self::Opaque(raw.clone())
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(|item| Self::decode(item, group_by, interval))
                    .collect(),
            ),
            Value::Object(map) => Self::decode_bucket(map, group_by, interval)
                .unwrap_or_else(|| Self::Opaque(raw.clone())),
            Value::Null | Value::Bool(_) => Self::Opaque(raw.clone()),
        }
    }

    fn decode_bucket(map: &Map<String, Value>, group_by: bool, interval: bool) -> Option<Self> {
        if interval {
            if let Some(bucket) = Self::decode_interval(map, group_by) {
                return Some(bucket);
            }
        }

        if group_by {
            let result = map.get(RESULT_KEY)?;
            let properties = map
                .iter()
                .filter(|(key, _)| key.as_str() != RESULT_KEY)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            return Some(Self::GroupBy(GroupBy {
                properties,
                result: Box::new(Self::decode(result, false, false)),
            }));
        }

        None
    }

    fn decode_interval(map: &Map<String, Value>, group_by: bool) -> Option<Self> {
        let timeframe = Timeframe::from_value(map.get(TIMEFRAME_KEY)?)?;
        let value = map.get(VALUE_KEY)?;

        // Intervals do not nest; a group-by may sit inside one
        Some(Self::Interval(Interval {
            timeframe,
            value: Box::new(Self::decode(value, group_by, false)),
        }))
    }

    /// Rebuild the wire shape of this result
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Double(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::GroupBy(bucket) => {
                let mut map = bucket.properties.clone();
                map.insert(RESULT_KEY.to_string(), bucket.result.to_value());
                Value::Object(map)
            }
            Self::Interval(bucket) => {
                let mut map = Map::new();
                map.insert(TIMEFRAME_KEY.to_string(), bucket.timeframe.to_value());
                map.insert(VALUE_KEY.to_string(), bucket.value.to_value());
                Value::Object(map)
            }
            Self::Opaque(value) => value.clone(),
        }
    }

    /// Short name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::GroupBy(_) => "group_by",
            Self::Interval(_) => "interval",
            Self::Opaque(_) => "object",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Self::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn is_group_by(&self) -> bool {
        matches!(self, Self::GroupBy(_))
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, Self::Interval(_))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, widening integers
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[QueryResult]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_group_by(&self) -> Option<&GroupBy> {
        match self {
            Self::GroupBy(bucket) => Some(bucket),
            _ => None,
        }
    }

    pub fn as_interval(&self) -> Option<&Interval> {
        match self {
            Self::Interval(bucket) => Some(bucket),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Value> {
        match self {
            Self::Opaque(value) => Some(value),
            _ => None,
        }
    }
}

impl GroupBy {
    /// Value of one group-by property in this bucket
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(QueryResult::decode(&json!(5), false, false), QueryResult::Integer(5));
        assert_eq!(QueryResult::decode(&json!(-5), true, true), QueryResult::Integer(-5));
        assert_eq!(QueryResult::decode(&json!(3.14), false, false), QueryResult::Double(3.14));
        assert_eq!(
            QueryResult::decode(&json!("shoes"), false, false),
            QueryResult::String("shoes".to_string())
        );
    }

    #[test]
    fn test_whole_float_stays_double() {
        assert_eq!(QueryResult::decode(&json!(7.0), false, false), QueryResult::Double(7.0));
    }

    #[test]
    fn test_null_and_bool_are_opaque() {
        assert_eq!(
            QueryResult::decode(&Value::Null, false, false),
            QueryResult::Opaque(Value::Null)
        );
        assert_eq!(
            QueryResult::decode(&json!(true), false, false),
            QueryResult::Opaque(json!(true))
        );
    }

    #[test]
    fn test_interval_absolute() {
        let raw = json!({
            "timeframe": {"start": "2020-01-01T00:00:00Z", "end": "2020-01-02T00:00:00Z"},
            "value": 7
        });
        let decoded = QueryResult::decode(&raw, false, true);

        assert_eq!(
            decoded,
            QueryResult::Interval(Interval {
                timeframe: Timeframe::absolute("2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z"),
                value: Box::new(QueryResult::Integer(7)),
            })
        );
    }

    #[test]
    fn test_interval_relative() {
        let raw = json!({"timeframe": "this_day", "value": 2.5});
        let bucket = QueryResult::decode(&raw, false, true);
        let bucket = bucket.as_interval().unwrap();

        assert_eq!(bucket.timeframe, Timeframe::relative("this_day"));
        assert_eq!(*bucket.value, QueryResult::Double(2.5));
    }

    #[test]
    fn test_interval_missing_value_is_opaque() {
        let raw = json!({"timeframe": "this_day"});
        assert_eq!(QueryResult::decode(&raw, false, true), QueryResult::Opaque(raw));
    }

    #[test]
    fn test_interval_shape_without_flag_is_opaque() {
        let raw = json!({"timeframe": "this_day", "value": 1});
        assert_eq!(QueryResult::decode(&raw, false, false), QueryResult::Opaque(raw.clone()));
        assert_eq!(QueryResult::decode(&raw, true, false), QueryResult::Opaque(raw));
    }

    #[test]
    fn test_group_by_bucket() {
        let raw = json!({"result": 3, "category": "shoes"});
        let decoded = QueryResult::decode(&raw, true, false);

        let mut properties = Map::new();
        properties.insert("category".to_string(), json!("shoes"));
        assert_eq!(
            decoded,
            QueryResult::GroupBy(GroupBy {
                properties,
                result: Box::new(QueryResult::Integer(3)),
            })
        );
    }

    #[test]
    fn test_group_by_list_preserves_order() {
        let raw = json!([{"result": 1, "a": "x"}, {"result": 2, "a": "y"}]);
        let decoded = QueryResult::decode(&raw, true, false);
        let items = decoded.as_list().unwrap();

        assert_eq!(items.len(), 2);
        let first = items[0].as_group_by().unwrap();
        let second = items[1].as_group_by().unwrap();
        assert_eq!(first.property("a"), Some(&json!("x")));
        assert_eq!(*first.result, QueryResult::Integer(1));
        assert_eq!(second.property("a"), Some(&json!("y")));
        assert_eq!(*second.result, QueryResult::Integer(2));
    }

    #[test]
    fn test_result_key_without_group_by_is_opaque() {
        // A user field that happens to be called "result"
        let raw = json!({"result": 3, "category": "shoes"});
        assert_eq!(QueryResult::decode(&raw, false, false), QueryResult::Opaque(raw));
    }

    #[test]
    fn test_group_by_result_is_not_reinterpreted() {
        // The bucket's own result is decoded with both flags cleared
        let raw = json!({"result": {"result": 1, "b": 2}, "a": "x"});
        let decoded = QueryResult::decode(&raw, true, false);
        let bucket = decoded.as_group_by().unwrap();

        assert_eq!(*bucket.result, QueryResult::Opaque(json!({"result": 1, "b": 2})));
    }

    #[test]
    fn test_interval_of_group_bys() {
        let raw = json!([
            {
                "timeframe": {"start": "2020-01-01T00:00:00Z", "end": "2020-01-02T00:00:00Z"},
                "value": [{"result": 4, "country": "NZ"}, {"result": 6, "country": "AU"}]
            }
        ]);
        let decoded = QueryResult::decode(&raw, true, true);
        let bucket = decoded.as_list().unwrap()[0].as_interval().unwrap();
        let groups = bucket.value.as_list().unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].as_group_by().unwrap().property("country"), Some(&json!("AU")));
        assert_eq!(*groups[1].as_group_by().unwrap().result, QueryResult::Integer(6));
    }

    #[test]
    fn test_group_by_bucket_with_both_flags() {
        let raw = json!({"result": 3, "category": "shoes"});
        let decoded = QueryResult::decode(&raw, true, true);
        let bucket = decoded.as_group_by().unwrap();

        assert_eq!(bucket.property("category"), Some(&json!("shoes")));
        assert_eq!(*bucket.result, QueryResult::Integer(3));

        // Unusable interval timeframe, but still a group-by bucket
        let raw = json!({"timeframe": 5, "value": 1, "result": 2});
        assert!(QueryResult::decode(&raw, true, true).is_group_by());
    }

    #[test]
    fn test_interval_does_not_nest() {
        let raw = json!({"timeframe": "this_day", "value": {"timeframe": "this_hour", "value": 1}});
        let decoded = QueryResult::decode(&raw, false, true);
        let bucket = decoded.as_interval().unwrap();

        assert_eq!(
            *bucket.value,
            QueryResult::Opaque(json!({"timeframe": "this_hour", "value": 1}))
        );
    }

    #[test]
    fn test_opaque_round_trips() {
        let raw = json!({"foo": "bar"});
        let decoded = QueryResult::decode(&raw, false, false);
        assert_eq!(decoded, QueryResult::Opaque(raw.clone()));
        assert_eq!(decoded.to_value(), raw);
    }

    #[test]
    fn test_to_value_rebuilds_wire_shape() {
        let raw = json!([
            {"timeframe": {"start": "s", "end": "e"}, "value": [{"category": "shoes", "result": 3}]}
        ]);
        assert_eq!(QueryResult::decode(&raw, true, true).to_value(), raw);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(QueryResult::Integer(4).as_double(), Some(4.0));
        assert_eq!(QueryResult::Double(4.5).as_integer(), None);
        assert_eq!(QueryResult::String("x".into()).as_str(), Some("x"));
        assert_eq!(QueryResult::Opaque(json!({})).type_name(), "object");
        assert!(QueryResult::List(vec![]).is_list());
    }
}
