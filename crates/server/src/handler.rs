use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use driftdb_common::{CommandError, ConnectionError, PersistenceError, StorageError, epoch_millis};
use driftdb_protocol::{Request, Value};
use driftdb_storage::Db;

use crate::Connection;

/// Loop principal de tratamento de uma conexão.
pub async fn handle_connection(
    mut conn: Connection,
    db: Db,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    loop {
        let request = tokio::select! {
            result = conn.read_request() => result?,
            _ = shutdown.recv() => {
                return Ok(());
            }
        };

        let request = match request {
            Some(r) => r,
            None => return Ok(()), // EOF
        };

        let reply = handle_request(&db, &request).await;
        conn.write_reply(&reply).await?;
    }
}

/// Bytes de uma requisição completa → bytes da resposta.
/// Decodifica, valida, executa na engine e codifica. Nunca entra em pânico:
/// entrada inválida vira uma resposta de erro.
pub async fn handle_request(db: &Db, data: &[u8]) -> Bytes {
    let reply = match Value::decode(data) {
        Ok((value, _)) => dispatch(db, value).await,
        Err(e) => {
            debug!("requisição não decodificada: {e}");
            error_reply(CommandError::from(e).code())
        }
    };
    reply.to_bytes()
}

/// Valida um Value já decodificado e executa a requisição.
pub async fn dispatch(db: &Db, value: Value) -> Value {
    match Request::from_value(value) {
        Ok(request) => {
            debug!("comando recebido: {request:?}");
            execute(db, request).await
        }
        Err(e) => {
            debug!("requisição rejeitada: {e}");
            error_reply(e.code())
        }
    }
}

/// Executa uma requisição validada e retorna o Value de resposta.
pub async fn execute(db: &Db, request: Request) -> Value {
    match request {
        Request::Ping => Value::string("PONG"),
        Request::Echo(msg) => Value::from(msg),
        Request::Get(key) => reply(db.get(&key).await, |value| value.unwrap_or(Value::Nil)),
        Request::Set {
            key,
            value,
            expiration,
        } => {
            let expires_at = expiration.map(|exp| exp.resolve(epoch_millis()));
            reply(db.set(key, Value::String(value), expires_at).await, |()| {
                Value::ok()
            })
        }
        Request::Exists(key) => reply(db.exists(&key).await, flag),
        Request::Del(key) => reply(db.del(&key).await, flag),
        Request::Incr(key) => reply(db.incr(&key).await, Value::from),
        Request::Decr(key) => reply(db.decr(&key).await, Value::from),
        Request::LPush { key, value } => {
            reply(db.lpush(&key, Value::String(value)).await, |()| Value::ok())
        }
        Request::RPush { key, value } => {
            reply(db.rpush(&key, Value::String(value)).await, |()| Value::ok())
        }
        Request::Save => match db.save().await {
            Ok(()) => Value::ok(),
            Err(PersistenceError::Storage(e)) => error_reply(e.code()),
            Err(e) => {
                warn!("SAVE falhou: {e}");
                Value::string("FAILED")
            }
        },
    }
}

fn reply<T>(result: Result<T, StorageError>, on_ok: impl FnOnce(T) -> Value) -> Value {
    match result {
        Ok(v) => on_ok(v),
        Err(e) => error_reply(e.code()),
    }
}

fn flag(b: bool) -> Value {
    Value::Integer(b as i64)
}

fn error_reply(code: &str) -> Value {
    Value::Error(code.to_string())
}
