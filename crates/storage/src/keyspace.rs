use std::collections::HashMap;

use bytes::Bytes;
use driftdb_common::StorageError;
use driftdb_protocol::Value;

use crate::entry::StoredEntry;

/// Extremidade da lista onde um push insere o valor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Front,
    Back,
}

/// Resultado de um pedido de expiração vindo de um timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// A entrada era a mesma que armou o timer e foi removida.
    Removed,
    /// Mesma entrada, mas o instante ainda não chegou (relógio de parede
    /// atrás do timer). O timer deve ser re-armado para este instante.
    Pending(i64),
    /// Chave ausente ou sobrescrita desde que o timer foi armado.
    Stale,
}

/// Mapa de chaves exclusivo da engine. Todas as operações recebem o instante
/// atual e aplicam expiração preguiçosa antes de consultar a entrada.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<String, StoredEntry>,
    generation: u64,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyspace vazio cujos carimbos continuam após os deste. Timers armados
    /// antes de uma troca de keyspace nunca casam com as entradas novas.
    pub fn successor(&self) -> Keyspace {
        Keyspace {
            entries: HashMap::new(),
            generation: self.generation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitui a entrada incondicionalmente e retorna o novo carimbo.
    pub fn set(&mut self, key: String, value: Value, expires_at: Option<i64>) -> u64 {
        let generation = self.next_generation();
        self.entries
            .insert(key, StoredEntry::new(value, expires_at, generation));
        generation
    }

    pub fn get(&mut self, key: &str, now_ms: i64) -> Option<Value> {
        self.evict_expired(key, now_ms);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn exists(&mut self, key: &str, now_ms: i64) -> bool {
        self.evict_expired(key, now_ms);
        self.entries.contains_key(key)
    }

    /// Remove a chave; retorna se havia uma entrada viva.
    pub fn del(&mut self, key: &str, now_ms: i64) -> bool {
        self.evict_expired(key, now_ms);
        self.entries.remove(key).is_some()
    }

    /// Soma `delta` ao inteiro armazenado (ausente conta como 0). O resultado
    /// é gravado na forma decimal e a expiração é mantida.
    pub fn incr_by(&mut self, key: &str, delta: i64, now_ms: i64) -> Result<i64, StorageError> {
        self.evict_expired(key, now_ms);

        if let Some(entry) = self.entries.get_mut(key) {
            let current = entry
                .value
                .as_integer()
                .ok_or(StorageError::NotNumericOrOverflow)?;
            let next = current
                .checked_add(delta)
                .ok_or(StorageError::NotNumericOrOverflow)?;
            entry.value = decimal(next);
            return Ok(next);
        }

        let generation = self.next_generation();
        self.entries.insert(
            key.to_string(),
            StoredEntry::new(decimal(delta), None, generation),
        );
        Ok(delta)
    }

    /// Insere `value` numa extremidade da lista. Chave ausente começa uma
    /// lista vazia; qualquer outro tipo falha sem alterar a entrada.
    pub fn push(
        &mut self,
        key: &str,
        value: Value,
        end: ListEnd,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        self.evict_expired(key, now_ms);

        match self.entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::Array(items) => {
                    match end {
                        ListEnd::Front => items.insert(0, value),
                        ListEnd::Back => items.push(value),
                    }
                    Ok(())
                }
                _ => Err(StorageError::NotAList),
            },
            None => {
                let generation = self.next_generation();
                self.entries.insert(
                    key.to_string(),
                    StoredEntry::new(Value::Array(vec![value]), None, generation),
                );
                Ok(())
            }
        }
    }

    /// Aplica um pedido de expiração ativa. Só remove a entrada que armou o
    /// timer, identificada pelo carimbo.
    pub fn expire(&mut self, key: &str, generation: u64, now_ms: i64) -> ExpireOutcome {
        let Some(entry) = self.entries.get(key) else {
            return ExpireOutcome::Stale;
        };
        if entry.generation != generation {
            return ExpireOutcome::Stale;
        }
        match entry.expires_at {
            Some(at) if at <= now_ms => {
                self.entries.remove(key);
                ExpireOutcome::Removed
            }
            Some(at) => ExpireOutcome::Pending(at),
            None => ExpireOutcome::Stale,
        }
    }

    /// Entradas ainda vivas em `now_ms`.
    pub fn live_entries(&self, now_ms: i64) -> impl Iterator<Item = (&String, &StoredEntry)> {
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now_ms))
    }

    fn evict_expired(&mut self, key: &str, now_ms: i64) {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now_ms))
        {
            self.entries.remove(key);
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

fn decimal(n: i64) -> Value {
    Value::String(Bytes::from(n.to_string()))
}
