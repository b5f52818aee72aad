use bytes::{Bytes, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use driftdb_common::{ConnectionError, INITIAL_BUFFER_CAPACITY, MAX_FRAME_SIZE, ProtocolError};
use driftdb_protocol::Value;

/// Wrapper sobre TcpStream que recorta requisições completas do buffer de
/// leitura e escreve respostas já codificadas.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Lê os bytes de uma requisição completa. Retorna None no EOF.
    pub async fn read_request(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        loop {
            if let Some(request) = self.take_request() {
                return Ok(Some(request));
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ConnectionError::ConnectionReset);
            }
        }
    }

    /// Escreve a resposta como recebida.
    pub async fn write_reply(&mut self, reply: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(reply).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Recorta o próximo frame completo. Um buffer que nunca vai formar um
    /// frame válido é entregue inteiro (o handler responde com erro) e
    /// descartado, para a conexão continuar atendendo.
    fn take_request(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        match Value::check(&mut cursor) {
            Ok(()) => {
                let len = cursor.position() as usize;
                Some(self.buffer.split_to(len).freeze())
            }
            Err(ProtocolError::Incomplete) if self.buffer.len() <= MAX_FRAME_SIZE => None,
            Err(_) => Some(self.buffer.split().freeze()),
        }
    }
}
