use bytes::Bytes;
use driftdb_common::CommandError;

use crate::Value;

/// Cursor sobre uma requisição (array de strings) para extrair argumentos
/// sequencialmente.
#[derive(Debug)]
pub struct Parse {
    parts: Vec<Bytes>,
    pos: usize,
}

impl Parse {
    /// Cria um Parse a partir de um Value. A requisição deve ser um array não
    /// vazio contendo apenas strings.
    pub fn new(value: Value) -> Result<Parse, CommandError> {
        let values = match value {
            Value::Array(values) if !values.is_empty() => values,
            _ => return Err(CommandError::UnexpectedArgumentType),
        };

        let parts = values
            .into_iter()
            .map(|v| match v {
                Value::String(data) => Ok(data),
                _ => Err(CommandError::UnexpectedArgumentType),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Parse { parts, pos: 0 })
    }

    /// Nome do comando em maiúsculas. Deve ser chamado antes dos argumentos.
    pub fn command_name(&mut self) -> Result<String, CommandError> {
        Ok(self.next_string()?.to_uppercase())
    }

    /// Número de argumentos após o nome do comando.
    pub fn arity(&self) -> usize {
        self.parts.len() - 1
    }

    /// Falha com `InvalidArgumentsCount` se a aridade não estiver em `allowed`.
    pub fn expect_arity(&self, name: &str, allowed: &[usize]) -> Result<(), CommandError> {
        if allowed.contains(&self.arity()) {
            Ok(())
        } else {
            Err(CommandError::InvalidArgumentsCount(name.to_string()))
        }
    }

    /// Retorna o próximo elemento como String UTF-8.
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        let data = self.next()?;
        String::from_utf8(data.to_vec()).map_err(|_| CommandError::UnexpectedArgumentType)
    }

    /// Retorna o próximo elemento como Bytes, sem interpretar.
    pub fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        self.next()
    }

    /// Verifica se ainda há argumentos restantes.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.parts.len()
    }

    fn next(&mut self) -> Result<Bytes, CommandError> {
        let data = self
            .parts
            .get(self.pos)
            .cloned()
            .ok_or(CommandError::UnexpectedArgumentType)?;
        self.pos += 1;
        Ok(data)
    }
}
