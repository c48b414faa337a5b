//! CloudFormation value tokens.
//!
//! A [`Token`] is a property value as it will appear in a template: a plain
//! literal, a nested list or map, or one of the intrinsic functions the
//! provisioning engine resolves at deploy time (`Ref`, `Fn::GetAtt`,
//! `Fn::ImportValue`, ...).
//!
//! Values that cross a stack boundary are always [`Token::Import`]. An import
//! remembers the stack that exports it so the owning [`Stack`](crate::stack::Stack)
//! can refuse to render a reference to a producer it has not declared a
//! dependency on.

use indexmap::IndexMap;
use serde_json::{json, Value};

/// A template property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal scalar (string, number, bool)
    Literal(Value),
    /// Ordered list of values
    List(Vec<Token>),
    /// Ordered map of values
    Map(IndexMap<String, Token>),
    /// `Ref` to a local resource, parameter, or pseudo parameter
    Ref(String),
    /// `Fn::GetAtt` on a local resource
    GetAtt(String, String),
    /// `Fn::ImportValue` of another stack's export
    Import {
        /// Stack that owns the export
        producer: String,
        /// Export name
        export_name: String,
    },
    /// `Fn::Join`
    Join(String, Vec<Token>),
    /// `Fn::Select`
    Select(usize, Box<Token>),
    /// `Fn::GetAZs` for the current region
    AvailabilityZones,
    /// `Fn::Base64`
    Base64(Box<Token>),
}

impl Token {
    /// String literal.
    pub fn str(value: impl Into<String>) -> Self {
        Token::Literal(Value::String(value.into()))
    }

    /// `Ref` to a logical id.
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    /// `Fn::GetAtt` on a logical id.
    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt(logical_id.into(), attribute.into())
    }

    /// Map from key/value pairs, keeping insertion order.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Token)>,
    {
        Token::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// List from values.
    pub fn list(items: impl IntoIterator<Item = Token>) -> Self {
        Token::List(items.into_iter().collect())
    }

    /// The current region as a pseudo parameter.
    pub fn region() -> Self {
        Token::Ref("AWS::Region".to_string())
    }

    /// Returns the literal string value, if this token is one.
    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            Token::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Stacks this token imports from, in order of appearance.
    pub fn producers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_producers(&mut out);
        out
    }

    fn collect_producers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Token::Import { producer, .. } => out.push(producer),
            Token::List(items) | Token::Join(_, items) => {
                for item in items {
                    item.collect_producers(out);
                }
            }
            Token::Map(entries) => {
                for value in entries.values() {
                    value.collect_producers(out);
                }
            }
            Token::Select(_, inner) | Token::Base64(inner) => inner.collect_producers(out),
            Token::Literal(_) | Token::Ref(_) | Token::GetAtt(..) | Token::AvailabilityZones => {}
        }
    }

    /// Logical ids referenced locally through `Ref` or `Fn::GetAtt`.
    pub fn local_references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_local(&mut out);
        out
    }

    fn collect_local<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Token::Ref(id) if !id.starts_with("AWS::") => out.push(id),
            Token::GetAtt(id, _) => out.push(id),
            Token::List(items) | Token::Join(_, items) => {
                for item in items {
                    item.collect_local(out);
                }
            }
            Token::Map(entries) => {
                for value in entries.values() {
                    value.collect_local(out);
                }
            }
            Token::Select(_, inner) | Token::Base64(inner) => inner.collect_local(out),
            _ => {}
        }
    }

    /// Render into template JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Token::Literal(v) => v.clone(),
            Token::List(items) => Value::Array(items.iter().map(Token::to_json).collect()),
            Token::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Token::Ref(id) => json!({ "Ref": id }),
            Token::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
            Token::Import { export_name, .. } => json!({ "Fn::ImportValue": export_name }),
            Token::Join(sep, items) => {
                let parts: Vec<Value> = items.iter().map(Token::to_json).collect();
                json!({ "Fn::Join": [sep, parts] })
            }
            Token::Select(index, inner) => json!({ "Fn::Select": [index, inner.to_json()] }),
            Token::AvailabilityZones => json!({ "Fn::GetAZs": "" }),
            Token::Base64(inner) => json!({ "Fn::Base64": inner.to_json() }),
        }
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::str(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(Value::String(value))
    }
}

impl From<bool> for Token {
    fn from(value: bool) -> Self {
        Token::Literal(Value::Bool(value))
    }
}

impl From<u16> for Token {
    fn from(value: u16) -> Self {
        Token::Literal(Value::from(value))
    }
}

impl From<i32> for Token {
    fn from(value: i32) -> Self {
        Token::Literal(Value::from(value))
    }
}

/// Standard CloudFormation `Tags` list with a single `Name` tag.
pub fn name_tags(name: impl Into<String>) -> Token {
    tags([("Name".to_string(), name.into())])
}

/// CloudFormation `Tags` list from key/value pairs.
pub fn tags(pairs: impl IntoIterator<Item = (String, String)>) -> Token {
    Token::list(
        pairs
            .into_iter()
            .map(|(k, v)| Token::map([("Key", Token::from(k)), ("Value", Token::from(v))])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intrinsics_render() {
        assert_eq!(Token::reference("Vpc").to_json(), json!({"Ref": "Vpc"}));
        assert_eq!(
            Token::get_att("Host", "PrivateIp").to_json(),
            json!({"Fn::GetAtt": ["Host", "PrivateIp"]})
        );
        assert_eq!(
            Token::Select(0, Box::new(Token::AvailabilityZones)).to_json(),
            json!({"Fn::Select": [0, {"Fn::GetAZs": ""}]})
        );
    }

    #[test]
    fn test_import_renders_export_name_only() {
        let token = Token::Import {
            producer: "net".to_string(),
            export_name: "net-VPCId".to_string(),
        };
        assert_eq!(token.to_json(), json!({"Fn::ImportValue": "net-VPCId"}));
        assert_eq!(token.producers(), vec!["net"]);
    }

    #[test]
    fn test_producers_found_in_nested_values() {
        let token = Token::map([(
            "SecurityGroupIds",
            Token::list([
                Token::get_att("Sg", "GroupId"),
                Token::Import {
                    producer: "bastion".to_string(),
                    export_name: "bastion-Sg".to_string(),
                },
            ]),
        )]);
        assert_eq!(token.producers(), vec!["bastion"]);
        assert_eq!(token.local_references(), vec!["Sg"]);
    }

    #[test]
    fn test_pseudo_parameters_are_not_local_references() {
        let token = Token::Join(
            String::new(),
            vec![Token::str("com.amazonaws."), Token::region(), Token::str(".s3")],
        );
        assert!(token.local_references().is_empty());
    }

    #[test]
    fn test_name_tags() {
        assert_eq!(
            name_tags("web").to_json(),
            json!([{"Key": "Name", "Value": "web"}])
        );
    }
}
