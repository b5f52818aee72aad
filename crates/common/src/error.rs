/// Erros de decodificação do formato de fio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// O buffer termina antes do fim do frame (terminador ou payload ausente).
    #[error("frame incompleto")]
    Incomplete,
    #[error("frame malformado: {0}")]
    MalformedFrame(String),
    #[error("byte de tipo não reconhecido: {0:#x}")]
    UnrecognizedType(u8),
    #[error("frame excede tamanho máximo ({0} bytes)")]
    FrameTooLarge(usize),
}

/// Erros de validação de requisições de clientes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("falha ao desserializar a requisição: {0}")]
    FailedDeserialization(#[from] ProtocolError),
    #[error("requisição deve ser um array não vazio de strings")]
    UnexpectedArgumentType,
    #[error("número errado de argumentos para '{0}'")]
    InvalidArgumentsCount(String),
    #[error("comando desconhecido: {0}")]
    InvalidCommand(String),
    #[error("modo de expiração não reconhecido: {0}")]
    UnrecognizedTimeoutMode(String),
    #[error("valor de expiração inválido: {0}")]
    InvalidTimeoutValue(String),
}

impl CommandError {
    /// Texto estável enviado ao cliente como reply de erro.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::FailedDeserialization(_) => "ERR FAILED-DESERIALIZING",
            CommandError::UnexpectedArgumentType => "ERR UNEXPECTED-ARGUMENT-TYPE",
            CommandError::InvalidArgumentsCount(_) => "ERR INVALID-ARGUMENTS-NUMBER",
            CommandError::InvalidCommand(_) => "ERR INVALID-COMMAND",
            CommandError::UnrecognizedTimeoutMode(_) => "ERR UNRECOGNIZED-TIMEOUT-MODE",
            CommandError::InvalidTimeoutValue(_) => "ERR INVALID-TIMEOUT-VALUE",
        }
    }
}

/// Erros da engine de dados.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("valor não é numérico ou o limite de i64 foi atingido")]
    NotNumericOrOverflow,
    #[error("valor armazenado não é uma lista")]
    NotAList,
    #[error("engine encerrada, comando não pode ser entregue")]
    EngineClosed,
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotNumericOrOverflow => "ERR VALUE-NOT-NUMERIC-OR-MAX-REACHED",
            StorageError::NotAList => "ERR VALUE-NOT-A-LIST",
            StorageError::EngineClosed => "ERR ENGINE-UNAVAILABLE",
        }
    }
}

/// Erros de persistência de snapshots.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot corrompido: {0}")]
    CorruptSnapshot(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Erros de conexão TCP.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("conexão resetada pelo peer")]
    ConnectionReset,
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Erro top-level do DriftDB.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result type alias.
pub type DriftResult<T> = Result<T, DriftError>;

// Conversão implícita de io::Error → DriftError (via ConnectionError)
impl From<std::io::Error> for DriftError {
    fn from(e: std::io::Error) -> Self {
        DriftError::Connection(ConnectionError::Io(e))
    }
}
