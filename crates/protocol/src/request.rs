use bytes::Bytes;
use driftdb_common::CommandError;

use crate::{Parse, Value};

/// Modo do sufixo de expiração do SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryMode {
    /// Segundos a partir de agora.
    Ex,
    /// Milissegundos a partir de agora.
    Px,
    /// Timestamp Unix absoluto em segundos.
    ExAt,
    /// Timestamp Unix absoluto em milissegundos.
    PxAt,
}

impl ExpiryMode {
    fn from_token(token: &str) -> Option<ExpiryMode> {
        match token.to_uppercase().as_str() {
            "EX" => Some(ExpiryMode::Ex),
            "PX" => Some(ExpiryMode::Px),
            "EXAT" => Some(ExpiryMode::ExAt),
            "PXAT" => Some(ExpiryMode::PxAt),
            _ => None,
        }
    }

    fn token(&self) -> &'static str {
        match self {
            ExpiryMode::Ex => "EX",
            ExpiryMode::Px => "PX",
            ExpiryMode::ExAt => "EXAT",
            ExpiryMode::PxAt => "PXAT",
        }
    }
}

/// Expiração pedida por um SET, ainda não resolvida para um instante.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
    pub mode: ExpiryMode,
    pub amount: i64,
}

impl Expiration {
    /// Converte para um instante absoluto em milissegundos Unix.
    pub fn resolve(&self, now_ms: i64) -> i64 {
        match self.mode {
            ExpiryMode::Ex => now_ms.saturating_add(self.amount.saturating_mul(1000)),
            ExpiryMode::Px => now_ms.saturating_add(self.amount),
            ExpiryMode::ExAt => self.amount.saturating_mul(1000),
            ExpiryMode::PxAt => self.amount,
        }
    }
}

/// Requisições de cliente suportadas.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Echo(Bytes),
    Get(String),
    Set {
        key: String,
        value: Bytes,
        expiration: Option<Expiration>,
    },
    Exists(String),
    Del(String),
    Incr(String),
    Decr(String),
    LPush {
        key: String,
        value: Bytes,
    },
    RPush {
        key: String,
        value: Bytes,
    },
    Save,
}

impl Request {
    /// Valida e converte um Value decodificado em uma Request.
    /// Toda validação acontece aqui, antes de qualquer mutação.
    pub fn from_value(value: Value) -> Result<Request, CommandError> {
        let mut parse = Parse::new(value)?;
        let name = parse.command_name()?;

        let request = match name.as_str() {
            "PING" => {
                parse.expect_arity("PING", &[0])?;
                Request::Ping
            }
            "ECHO" => {
                parse.expect_arity("ECHO", &[1])?;
                Request::Echo(parse.next_bytes()?)
            }
            "GET" => {
                parse.expect_arity("GET", &[1])?;
                Request::Get(parse.next_string()?)
            }
            "SET" => parse_set(&mut parse)?,
            "EXISTS" => {
                parse.expect_arity("EXISTS", &[1])?;
                Request::Exists(parse.next_string()?)
            }
            "DEL" => {
                parse.expect_arity("DEL", &[1])?;
                Request::Del(parse.next_string()?)
            }
            "INCR" => {
                parse.expect_arity("INCR", &[1])?;
                Request::Incr(parse.next_string()?)
            }
            "DECR" => {
                parse.expect_arity("DECR", &[1])?;
                Request::Decr(parse.next_string()?)
            }
            "LPUSH" => {
                parse.expect_arity("LPUSH", &[2])?;
                let key = parse.next_string()?;
                let value = parse.next_bytes()?;
                Request::LPush { key, value }
            }
            "RPUSH" => {
                parse.expect_arity("RPUSH", &[2])?;
                let key = parse.next_string()?;
                let value = parse.next_bytes()?;
                Request::RPush { key, value }
            }
            "SAVE" => {
                parse.expect_arity("SAVE", &[0])?;
                Request::Save
            }
            _ => return Err(CommandError::InvalidCommand(name)),
        };

        Ok(request)
    }

    /// Encoda a requisição como Value para envio pelo fio.
    pub fn to_value(&self) -> Value {
        match self {
            Request::Ping => Value::array_from_strs(&["PING"]),
            Request::Echo(msg) => {
                Value::Array(vec![Value::string("ECHO"), Value::String(msg.clone())])
            }
            Request::Get(key) => Value::array_from_strs(&["GET", key.as_str()]),
            Request::Set {
                key,
                value,
                expiration,
            } => {
                let mut parts = vec![
                    Value::string("SET"),
                    Value::string(key),
                    Value::String(value.clone()),
                ];
                if let Some(exp) = expiration {
                    parts.push(Value::string(exp.mode.token()));
                    parts.push(Value::string(&exp.amount.to_string()));
                }
                Value::Array(parts)
            }
            Request::Exists(key) => Value::array_from_strs(&["EXISTS", key.as_str()]),
            Request::Del(key) => Value::array_from_strs(&["DEL", key.as_str()]),
            Request::Incr(key) => Value::array_from_strs(&["INCR", key.as_str()]),
            Request::Decr(key) => Value::array_from_strs(&["DECR", key.as_str()]),
            Request::LPush { key, value } => Value::Array(vec![
                Value::string("LPUSH"),
                Value::string(key),
                Value::String(value.clone()),
            ]),
            Request::RPush { key, value } => Value::Array(vec![
                Value::string("RPUSH"),
                Value::string(key),
                Value::String(value.clone()),
            ]),
            Request::Save => Value::array_from_strs(&["SAVE"]),
        }
    }
}

fn parse_set(parse: &mut Parse) -> Result<Request, CommandError> {
    parse.expect_arity("SET", &[2, 4])?;

    let key = parse.next_string()?;
    let value = parse.next_bytes()?;

    let expiration = if parse.has_remaining() {
        let mode = parse.next_string()?;
        let amount = parse.next_string()?;
        let amount = amount
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidTimeoutValue(amount.clone()))?;
        let mode = ExpiryMode::from_token(&mode)
            .ok_or(CommandError::UnrecognizedTimeoutMode(mode))?;
        Some(Expiration { mode, amount })
    } else {
        None
    };

    Ok(Request::Set {
        key,
        value,
        expiration,
    })
}
