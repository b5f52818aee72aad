use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use driftdb_common::{MAX_FRAME_SIZE, ProtocolError};

use crate::Value;

/// Profundidade máxima de arrays aninhados aceita pelo decoder.
const MAX_NESTING: usize = 128;

impl Value {
    /// Verifica se um frame completo está disponível no buffer sem alocar.
    /// Retorna Ok(()) se completo, Err(Incomplete) se precisa mais dados.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), ProtocolError> {
        check_at(src, 0)
    }

    /// Decodifica um frame do início de `src`, retornando o valor e quantos
    /// bytes foram consumidos. Bytes após o frame são ignorados.
    pub fn decode(src: &[u8]) -> Result<(Value, usize), ProtocolError> {
        let mut cursor = Cursor::new(src);
        let value = Value::parse(&mut cursor)?;
        Ok((value, cursor.position() as usize))
    }

    /// Faz o parse de um frame a partir do cursor. Nunca lê além do buffer:
    /// entrada truncada resulta em `Incomplete`.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Value, ProtocolError> {
        parse_at(src, 0)
    }

    /// Encoda o valor no buffer de saída.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Value::String(data) => {
                dst.put_u8(b'$');
                dst.put(data.len().to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
                dst.put(data.as_ref());
                dst.put(&b"\r\n"[..]);
            }
            Value::Integer(n) => {
                dst.put_u8(b':');
                dst.put(n.to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Value::Error(msg) => {
                dst.put_u8(b'-');
                dst.put(msg.as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Value::Array(values) => {
                dst.put_u8(b'*');
                dst.put(values.len().to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
                for value in values {
                    value.encode(dst);
                }
            }
            Value::Nil => {
                dst.put(&b"$-1\r\n"[..]);
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn check_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<(), ProtocolError> {
    if depth > MAX_NESTING {
        return Err(ProtocolError::MalformedFrame(
            "arrays aninhados demais".into(),
        ));
    }

    match get_u8(src)? {
        b'+' | b'-' => {
            get_line(src)?;
            Ok(())
        }
        b':' => {
            get_decimal(src)?;
            Ok(())
        }
        b'$' => match get_length(src)? {
            None => Ok(()),
            Some(len) => {
                get_payload(src, len)?;
                Ok(())
            }
        },
        b'*' => {
            if let Some(count) = get_length(src)? {
                for _ in 0..count {
                    check_at(src, depth + 1)?;
                }
            }
            Ok(())
        }
        byte => Err(ProtocolError::UnrecognizedType(byte)),
    }
}

fn parse_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Value, ProtocolError> {
    if depth > MAX_NESTING {
        return Err(ProtocolError::MalformedFrame(
            "arrays aninhados demais".into(),
        ));
    }

    match get_u8(src)? {
        b'+' => {
            let line = get_line(src)?;
            Ok(Value::String(Bytes::copy_from_slice(line)))
        }
        b'-' => {
            let line = get_line(src)?;
            let msg = String::from_utf8(line.to_vec())
                .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
            Ok(Value::Error(msg))
        }
        b':' => Ok(Value::Integer(get_decimal(src)?)),
        b'$' => match get_length(src)? {
            None => Ok(Value::Nil),
            Some(len) => {
                let data = get_payload(src, len)?;
                Ok(Value::String(Bytes::copy_from_slice(data)))
            }
        },
        b'*' => match get_length(src)? {
            None => Ok(Value::Nil),
            Some(count) => {
                // A contagem declarada não é confiável; limita a pré-alocação.
                let mut values = Vec::with_capacity(count.min(src.remaining()));
                for _ in 0..count {
                    values.push(parse_at(src, depth + 1)?);
                }
                Ok(Value::Array(values))
            }
        },
        byte => Err(ProtocolError::UnrecognizedType(byte)),
    }
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    if !src.has_remaining() {
        return Err(ProtocolError::Incomplete);
    }
    Ok(src.get_u8())
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ProtocolError> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    for i in start..end.saturating_sub(1) {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }

    Err(ProtocolError::Incomplete)
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, ProtocolError> {
    let line = get_line(src)?;
    let s = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::MalformedFrame("inteiro com bytes inválidos".into()))?;
    s.parse::<i64>()
        .map_err(|_| ProtocolError::MalformedFrame(format!("inteiro inválido: '{s}'")))
}

/// Lê o cabeçalho de comprimento de `$` e `*`. `-1` significa nil.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, ProtocolError> {
    match get_decimal(src)? {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::MalformedFrame(format!(
            "comprimento inválido: {len}"
        ))),
        len if len as u64 > MAX_FRAME_SIZE as u64 => {
            Err(ProtocolError::FrameTooLarge(len as usize))
        }
        len => Ok(Some(len as usize)),
    }
}

/// Lê exatamente `len` bytes seguidos de `\r\n`.
fn get_payload<'a>(src: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], ProtocolError> {
    if src.remaining() < len + 2 {
        return Err(ProtocolError::Incomplete);
    }
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    if &buf[start + len..start + len + 2] != b"\r\n" {
        return Err(ProtocolError::MalformedFrame(
            "bulk string sem terminador".into(),
        ));
    }
    src.set_position((start + len + 2) as u64);
    Ok(&buf[start..start + len])
}
