use bytes::Bytes;

/// Valor usado tanto como dado armazenado quanto como payload do protocolo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(Bytes),
    Integer(i64),
    Error(String),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    /// Helper: cria um Value::String a partir de &str.
    pub fn string(s: &str) -> Value {
        Value::String(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn ok() -> Value {
        Value::string("OK")
    }

    /// Helper: cria um Array de strings a partir de &[&str].
    pub fn array_from_strs(strs: &[&str]) -> Value {
        Value::Array(strs.iter().map(|s| Value::string(s)).collect())
    }

    /// Interpreta o valor como inteiro: `Integer` nativo ou `String` que seja
    /// um decimal i64 completo.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::String(data) => std::str::from_utf8(data).ok()?.parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::String(data)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}
