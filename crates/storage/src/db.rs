use driftdb_common::{COMMAND_QUEUE_CAPACITY, PersistenceError, StorageError, epoch_millis};
use driftdb_protocol::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::keyspace::{ExpireOutcome, Keyspace, ListEnd};
use crate::persist::Persistor;
use crate::snapshot;

/// Maior espera de um único timer. Expirações mais distantes são re-armadas
/// quando o timer dispara.
const MAX_TIMER_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Mensagens aceitas pela engine. Cada uma carrega o canal de resposta.
#[derive(Debug)]
enum Command {
    Get {
        key: String,
        reply: oneshot::Sender<Option<Value>>,
    },
    Set {
        key: String,
        value: Value,
        expires_at: Option<i64>,
        reply: oneshot::Sender<()>,
    },
    Exists {
        key: String,
        reply: oneshot::Sender<bool>,
    },
    Del {
        key: String,
        reply: oneshot::Sender<bool>,
    },
    IncrBy {
        key: String,
        delta: i64,
        reply: oneshot::Sender<Result<i64, StorageError>>,
    },
    Push {
        key: String,
        value: Value,
        end: ListEnd,
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Save {
        reply: oneshot::Sender<Result<(), PersistenceError>>,
    },
    Load {
        reply: oneshot::Sender<Result<usize, PersistenceError>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    /// Enviado pelos timers de expiração ativa; não tem resposta.
    Expire { key: String, generation: u64 },
}

/// Handle para a engine do keyspace.
///
/// Uma única task é dona do mapa; os handles apenas enfileiram comandos e
/// aguardam a resposta. Comandos são aplicados na ordem de chegada, um por
/// vez. A engine termina quando o último handle é descartado.
#[derive(Debug, Clone)]
pub struct Db {
    tx: mpsc::Sender<Command>,
}

impl Db {
    /// Inicia a engine numa task própria. Deve ser chamado dentro de um
    /// runtime tokio.
    pub fn start<P: Persistor>(persistor: P) -> Db {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let engine = Engine {
            keyspace: Keyspace::new(),
            persistor,
            rx,
            timer_tx: tx.downgrade(),
        };
        tokio::spawn(engine.run());
        Db { tx }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let key = key.to_string();
        self.request(|reply| Command::Get { key, reply }).await
    }

    /// `expires_at` em milissegundos Unix absolutos.
    pub async fn set(
        &self,
        key: String,
        value: Value,
        expires_at: Option<i64>,
    ) -> Result<(), StorageError> {
        self.request(|reply| Command::Set {
            key,
            value,
            expires_at,
            reply,
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();
        self.request(|reply| Command::Exists { key, reply }).await
    }

    pub async fn del(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();
        self.request(|reply| Command::Del { key, reply }).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, 1).await
    }

    pub async fn decr(&self, key: &str) -> Result<i64, StorageError> {
        self.incr_by(key, -1).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let key = key.to_string();
        self.request(|reply| Command::IncrBy { key, delta, reply })
            .await?
    }

    pub async fn lpush(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.push(key, value, ListEnd::Front).await
    }

    pub async fn rpush(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.push(key, value, ListEnd::Back).await
    }

    async fn push(&self, key: &str, value: Value, end: ListEnd) -> Result<(), StorageError> {
        let key = key.to_string();
        self.request(|reply| Command::Push {
            key,
            value,
            end,
            reply,
        })
        .await?
    }

    /// Grava o keyspace inteiro pelo gateway de persistência.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        self.request(|reply| Command::Save { reply }).await?
    }

    /// Substitui o keyspace pelo snapshot do gateway e retorna quantas chaves
    /// foram carregadas. Sem snapshot, nada muda. Em caso de erro o keyspace
    /// atual é mantido.
    pub async fn load(&self) -> Result<usize, PersistenceError> {
        self.request(|reply| Command::Load { reply }).await?
    }

    /// Número de chaves residentes (inclui expiradas ainda não removidas).
    pub async fn len(&self) -> Result<usize, StorageError> {
        self.request(|reply| Command::Len { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| StorageError::EngineClosed)?;
        rx.await.map_err(|_| StorageError::EngineClosed)
    }
}

struct Engine<P> {
    keyspace: Keyspace,
    persistor: P,
    rx: mpsc::Receiver<Command>,
    /// Timers não mantêm a engine viva.
    timer_tx: mpsc::WeakSender<Command>,
}

impl<P: Persistor> Engine<P> {
    async fn run(mut self) {
        debug!("engine do keyspace iniciada");
        while let Some(command) = self.rx.recv().await {
            self.apply(command).await;
        }
        debug!("engine do keyspace encerrada");
    }

    async fn apply(&mut self, command: Command) {
        let now = epoch_millis();

        // Falha no envio da resposta significa que o cliente desistiu.
        match command {
            Command::Get { key, reply } => {
                let _ = reply.send(self.keyspace.get(&key, now));
            }
            Command::Set {
                key,
                value,
                expires_at,
                reply,
            } => {
                let generation = self.keyspace.set(key.clone(), value, expires_at);
                if let Some(at) = expires_at {
                    self.arm_timer(key, generation, at, now);
                }
                let _ = reply.send(());
            }
            Command::Exists { key, reply } => {
                let _ = reply.send(self.keyspace.exists(&key, now));
            }
            Command::Del { key, reply } => {
                let _ = reply.send(self.keyspace.del(&key, now));
            }
            Command::IncrBy { key, delta, reply } => {
                let _ = reply.send(self.keyspace.incr_by(&key, delta, now));
            }
            Command::Push {
                key,
                value,
                end,
                reply,
            } => {
                let _ = reply.send(self.keyspace.push(&key, value, end, now));
            }
            Command::Save { reply } => {
                let _ = reply.send(self.save(now).await);
            }
            Command::Load { reply } => {
                let _ = reply.send(self.load().await);
            }
            Command::Len { reply } => {
                let _ = reply.send(self.keyspace.len());
            }
            Command::Expire { key, generation } => {
                match self.keyspace.expire(&key, generation, now) {
                    ExpireOutcome::Removed => debug!(key = %key, "chave expirada removida"),
                    ExpireOutcome::Pending(at) => self.arm_timer(key, generation, at, now),
                    ExpireOutcome::Stale => {}
                }
            }
        }
    }

    async fn save(&self, now: i64) -> Result<(), PersistenceError> {
        let blob = snapshot::encode(&self.keyspace, now);
        let size = blob.len();
        match self.persistor.save(blob).await {
            Ok(()) => {
                info!(keys = self.keyspace.len(), bytes = size, "snapshot gravado");
                Ok(())
            }
            Err(e) => {
                error!("falha ao gravar snapshot: {e}");
                Err(e.into())
            }
        }
    }

    async fn load(&mut self) -> Result<usize, PersistenceError> {
        let Some(blob) = self.persistor.load().await? else {
            debug!("nenhum snapshot encontrado");
            return Ok(0);
        };

        // Relê o relógio: a leitura pode ter demorado.
        let now = epoch_millis();
        let fresh = self.keyspace.successor();
        let keyspace = snapshot::decode(&blob, now, fresh).inspect_err(|e| {
            warn!("snapshot rejeitado, keyspace mantido: {e}");
        })?;
        self.keyspace = keyspace;

        let timed: Vec<(String, u64, i64)> = self
            .keyspace
            .live_entries(now)
            .filter_map(|(key, entry)| {
                entry
                    .expires_at
                    .map(|at| (key.clone(), entry.generation, at))
            })
            .collect();
        for (key, generation, at) in timed {
            self.arm_timer(key, generation, at, now);
        }

        info!(keys = self.keyspace.len(), "snapshot carregado");
        Ok(self.keyspace.len())
    }

    /// Agenda um `Expire` para `expires_at`. O timer segura apenas um sender
    /// fraco; se a engine já terminou, ele não faz nada.
    fn arm_timer(&self, key: String, generation: u64, expires_at: i64, now: i64) {
        let wait = expires_at.saturating_sub(now).max(0) as u64;
        let delay = Duration::from_millis(wait).min(MAX_TIMER_DELAY);
        let timer_tx = self.timer_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(Command::Expire { key, generation }).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersistor;
    use bytes::Bytes;

    fn start() -> Db {
        Db::start(MemoryPersistor::new())
    }

    #[tokio::test]
    async fn set_get_basic() {
        let db = start();
        db.set("bla".into(), Value::string("bli"), None)
            .await
            .unwrap();
        assert_eq!(db.get("bla").await.unwrap(), Some(Value::string("bli")));
        assert_eq!(db.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let db = start();
        db.set("k".into(), Value::string("v"), None).await.unwrap();
        let first = db.get("k").await.unwrap();
        let second = db.get("k").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(db.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn del_and_exists() {
        let db = start();
        assert!(!db.del("bla").await.unwrap());
        db.set("bla".into(), Value::string("x"), None).await.unwrap();
        assert!(db.exists("bla").await.unwrap());
        assert!(db.del("bla").await.unwrap());
        assert!(!db.exists("bla").await.unwrap());
        assert_eq!(db.get("bla").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_decr_inverse() {
        let db = start();
        assert_eq!(db.incr("cnt").await.unwrap(), 1);
        assert_eq!(db.incr("cnt").await.unwrap(), 2);
        assert_eq!(db.decr("cnt").await.unwrap(), 1);

        db.set("n".into(), Value::string("-7"), None).await.unwrap();
        db.incr("n").await.unwrap();
        db.decr("n").await.unwrap();
        assert_eq!(db.get("n").await.unwrap(), Some(Value::string("-7")));
    }

    #[tokio::test]
    async fn incr_not_numeric() {
        let db = start();
        db.set("k".into(), Value::string("abc"), None).await.unwrap();
        assert_eq!(
            db.incr("k").await,
            Err(StorageError::NotNumericOrOverflow)
        );
    }

    #[tokio::test]
    async fn list_pushes_keep_order() {
        let db = start();
        for v in ["a", "b", "c"] {
            db.lpush("l", Value::string(v)).await.unwrap();
            db.rpush("r", Value::string(v)).await.unwrap();
        }
        assert_eq!(
            db.get("l").await.unwrap(),
            Some(Value::array_from_strs(&["c", "b", "a"]))
        );
        assert_eq!(
            db.get("r").await.unwrap(),
            Some(Value::array_from_strs(&["a", "b", "c"]))
        );
    }

    #[tokio::test]
    async fn push_on_string_fails() {
        let db = start();
        db.set("k".into(), Value::string("v"), None).await.unwrap();
        assert_eq!(
            db.lpush("k", Value::string("x")).await,
            Err(StorageError::NotAList)
        );
    }

    #[tokio::test]
    async fn concurrent_increments_are_serialized() {
        let db = start();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.incr("hits").await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(db.get("hits").await.unwrap(), Some(Value::string("50")));
    }

    #[tokio::test]
    async fn expired_key_is_absent_on_read() {
        let db = start();
        let past = epoch_millis() - 1;
        db.set("k".into(), Value::string("v"), Some(past))
            .await
            .unwrap();
        assert_eq!(db.get("k").await.unwrap(), None);
        assert!(!db.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn active_expiry_removes_idle_key() {
        let db = start();
        let at = epoch_millis() + 50;
        db.set("k".into(), Value::string("v"), Some(at))
            .await
            .unwrap();
        assert_eq!(db.len().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        // sem leituras: só o timer pode ter removido
        assert_eq!(db.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_timer_keeps_overwritten_key() {
        let db = start();
        let at = epoch_millis() + 50;
        db.set("k".into(), Value::string("old"), Some(at))
            .await
            .unwrap();
        db.set("k".into(), Value::string("new"), None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(db.get("k").await.unwrap(), Some(Value::string("new")));
    }

    #[tokio::test]
    async fn save_and_load_into_fresh_engine() {
        let persistor = MemoryPersistor::new();
        let db = Db::start(persistor.clone());
        db.set("s".into(), Value::string("hello"), None)
            .await
            .unwrap();
        db.incr("cnt").await.unwrap();
        db.rpush("list", Value::string("a")).await.unwrap();
        db.save().await.unwrap();
        assert!(persistor.blob().await.is_some());

        let fresh = Db::start(persistor);
        assert_eq!(fresh.load().await.unwrap(), 3);
        assert_eq!(
            fresh.get("s").await.unwrap(),
            Some(Value::string("hello"))
        );
        assert_eq!(fresh.incr("cnt").await.unwrap(), 2);
        assert_eq!(
            fresh.get("list").await.unwrap(),
            Some(Value::array_from_strs(&["a"]))
        );
    }

    #[tokio::test]
    async fn loaded_keys_expire_actively() {
        let persistor = MemoryPersistor::new();
        let db = Db::start(persistor.clone());
        db.set("k".into(), Value::string("v"), Some(epoch_millis() + 80))
            .await
            .unwrap();
        db.save().await.unwrap();

        let fresh = Db::start(persistor);
        assert_eq!(fresh.load().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fresh.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn load_without_snapshot_is_noop() {
        let db = start();
        db.set("k".into(), Value::string("v"), None).await.unwrap();
        assert_eq!(db.load().await.unwrap(), 0);
        assert_eq!(db.get("k").await.unwrap(), Some(Value::string("v")));
    }

    #[tokio::test]
    async fn corrupt_snapshot_keeps_resident_data() {
        let db = Db::start(MemoryPersistor::with_blob(Bytes::from("garbage")));
        db.set("k".into(), Value::string("v"), None).await.unwrap();

        assert!(matches!(
            db.load().await,
            Err(PersistenceError::CorruptSnapshot(_))
        ));
        assert_eq!(db.get("k").await.unwrap(), Some(Value::string("v")));
    }

    #[tokio::test]
    async fn closed_engine_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let db = Db { tx };
        assert_eq!(db.get("k").await, Err(StorageError::EngineClosed));
        assert!(matches!(
            db.save().await,
            Err(PersistenceError::Storage(StorageError::EngineClosed))
        ));
    }
}
