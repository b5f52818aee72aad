use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{Semaphore, broadcast};
use tracing::{error, info, warn};

use driftdb_common::{DEFAULT_DUMP_FILE, DEFAULT_HOST, DEFAULT_PORT, MAX_CONNECTIONS};
use driftdb_server::{Connection, handle_connection};
use driftdb_storage::{Db, FilePersistor, MemoryPersistor};

#[derive(Parser, Debug)]
#[command(name = "driftdb-server", about = "DriftDB: key-value store em memória")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Arquivo de snapshot usado por SAVE e carregado na inicialização.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_DUMP_FILE)]
    dump_file: PathBuf,
    /// Mantém snapshots apenas em memória.
    #[arg(long)]
    no_persistence: bool,
    /// Executa um SAVE final ao receber o sinal de shutdown.
    #[arg(long)]
    save_on_shutdown: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftdb_server=info,driftdb_storage=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let db = if args.no_persistence {
        info!("persistência em disco desligada");
        Db::start(MemoryPersistor::new())
    } else {
        Db::start(FilePersistor::new(&args.dump_file))
    };

    // Dump corrompido aborta: um SAVE posterior o sobrescreveria.
    db.load()
        .await
        .with_context(|| format!("falha ao carregar {}", args.dump_file.display()))?;
    info!("{} chaves residentes após a carga", db.len().await?);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("falha ao escutar em {addr}"))?;
    info!("DriftDB escutando em {addr}");

    let semaphore = Arc::new(Semaphore::new(args.max_connections));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    loop {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => permit?,
            _ = signal::ctrl_c() => {
                info!("shutdown signal recebido");
                break;
            }
        };

        let (socket, addr) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(v) => v,
                    Err(e) => {
                        error!("erro ao aceitar conexão: {e}");
                        continue;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("shutdown signal recebido");
                break;
            }
        };

        info!("nova conexão: {addr}");
        let db = db.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let conn = Connection::new(socket);
            if let Err(e) = handle_connection(conn, db, &mut shutdown_rx).await {
                error!("erro na conexão {addr}: {e}");
            }
            info!("conexão encerrada: {addr}");
            drop(permit);
        });
    }

    // Fecha o canal: todas as conexões recebem o aviso.
    drop(shutdown_tx);

    if args.save_on_shutdown {
        match db.save().await {
            Ok(()) => info!("snapshot final gravado"),
            Err(e) => warn!("snapshot final falhou: {e}"),
        }
    }

    Ok(())
}
