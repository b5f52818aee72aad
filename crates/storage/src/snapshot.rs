//! Formato do snapshot do keyspace.
//!
//! O blob é um único `Value` codificado com o próprio codec do protocolo:
//!
//! ```text
//! *3
//!   $16 DRIFTDB-SNAPSHOT
//!   :1
//!   *N
//!     *3  key  value  (:expires_at | $-1)
//! ```
//!
//! Expirações são gravadas como instantes absolutos, então um dump carregado
//! mais tarde tem naturalmente menos tempo de vida restante.

use bytes::{Bytes, BytesMut};
use driftdb_common::PersistenceError;
use driftdb_protocol::Value;

use crate::keyspace::Keyspace;

const MAGIC: &str = "DRIFTDB-SNAPSHOT";
const VERSION: i64 = 1;

/// Serializa as entradas vivas em `now_ms`.
pub fn encode(keyspace: &Keyspace, now_ms: i64) -> Bytes {
    let entries = keyspace
        .live_entries(now_ms)
        .map(|(key, entry)| {
            let expires_at = entry.expires_at.map_or(Value::Nil, Value::Integer);
            Value::Array(vec![Value::string(key), entry.value.clone(), expires_at])
        })
        .collect();

    let snapshot = Value::Array(vec![
        Value::string(MAGIC),
        Value::Integer(VERSION),
        Value::Array(entries),
    ]);

    let mut buf = BytesMut::new();
    snapshot.encode(&mut buf);
    buf.freeze()
}

/// Preenche `keyspace` (vazio) a partir do blob. Entradas já expiradas em
/// `now_ms` são descartadas. Qualquer parte inválida descarta o resultado
/// inteiro.
pub fn decode(
    blob: &[u8],
    now_ms: i64,
    mut keyspace: Keyspace,
) -> Result<Keyspace, PersistenceError> {
    let (value, consumed) = Value::decode(blob).map_err(|e| corrupt(e.to_string()))?;
    if consumed != blob.len() {
        return Err(corrupt(format!(
            "{} bytes extras após o snapshot",
            blob.len() - consumed
        )));
    }

    let Value::Array(parts) = value else {
        return Err(corrupt("raiz não é um array"));
    };
    let [magic, version, entries]: [Value; 3] = parts
        .try_into()
        .map_err(|_| corrupt("cabeçalho deve ter 3 elementos"))?;

    if magic != Value::string(MAGIC) {
        return Err(corrupt("assinatura desconhecida"));
    }
    if version != Value::Integer(VERSION) {
        return Err(corrupt(format!("versão não suportada: {version:?}")));
    }
    let Value::Array(entries) = entries else {
        return Err(corrupt("lista de entradas ausente"));
    };

    for entry in entries {
        let (key, value, expires_at) = decode_entry(entry)?;
        if expires_at.is_some_and(|at| at <= now_ms) {
            continue;
        }
        keyspace.set(key, value, expires_at);
    }
    Ok(keyspace)
}

fn decode_entry(entry: Value) -> Result<(String, Value, Option<i64>), PersistenceError> {
    let Value::Array(fields) = entry else {
        return Err(corrupt("entrada não é um array"));
    };
    let [key, value, expires_at]: [Value; 3] = fields
        .try_into()
        .map_err(|_| corrupt("entrada deve ter 3 elementos"))?;

    let key = match key {
        Value::String(data) => String::from_utf8(data.to_vec())
            .map_err(|_| corrupt("chave não é UTF-8"))?,
        _ => return Err(corrupt("chave não é string")),
    };

    if matches!(value, Value::Error(_) | Value::Nil) {
        return Err(corrupt(format!("valor inválido para '{key}'")));
    }

    let expires_at = match expires_at {
        Value::Integer(at) => Some(at),
        Value::Nil => None,
        _ => return Err(corrupt(format!("expiração inválida para '{key}'"))),
    };

    Ok((key, value, expires_at))
}

fn corrupt(reason: impl Into<String>) -> PersistenceError {
    PersistenceError::CorruptSnapshot(reason.into())
}
