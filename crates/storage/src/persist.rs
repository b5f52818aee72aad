use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Gateway de persistência: grava e lê o blob inteiro do snapshot.
/// A engine trata `Ok(None)` (nenhum snapshot ainda) como carga vazia.
pub trait Persistor: Send + Sync + 'static {
    fn save(&self, blob: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    fn load(&self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;
}

/// Snapshot em arquivo único. A escrita vai para `<path>.tmp` e só então é
/// renomeada sobre o dump, então um crash nunca deixa um dump pela metade.
#[derive(Debug, Clone)]
pub struct FilePersistor {
    path: PathBuf,
}

impl FilePersistor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl Persistor for FilePersistor {
    async fn save(&self, blob: Bytes) -> io::Result<()> {
        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&blob).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await
    }

    async fn load(&self) -> io::Result<Option<Bytes>> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Slot de blob em memória. Usado com a persistência desligada e nos testes.
/// Clones compartilham o mesmo slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistor {
    slot: Arc<Mutex<Option<Bytes>>>,
}

impl MemoryPersistor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Bytes) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(blob))),
        }
    }

    pub async fn blob(&self) -> Option<Bytes> {
        self.slot.lock().await.clone()
    }
}

impl Persistor for MemoryPersistor {
    async fn save(&self, blob: Bytes) -> io::Result<()> {
        *self.slot.lock().await = Some(blob);
        Ok(())
    }

    async fn load(&self) -> io::Result<Option<Bytes>> {
        Ok(self.slot.lock().await.clone())
    }
}
