use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use facestore::FaceStore;
use facestore::server::FaceServer;
use facestore::manager::{self, RuntimeProfile};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Address to serve the HTTP API on
    #[clap(long, default_value = "localhost:8080")]
    addr: String,

    /// Tokio worker threads (defaults to the number of cores)
    #[clap(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
    .with_env_filter(manager::log_filter(directives.as_deref()))
    .with_target(false)
    .with_level(true)
    .init();

    let profile = RuntimeProfile::detect().with_workers(args.workers);
    tracing::info!(
        cores = profile.logical_cores,
        workers = profile.worker_threads,
        "starting FaceStore"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
    .worker_threads(profile.worker_threads)
    .enable_all()
    .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> ExitCode {
    let addr = match resolve(&args.addr).await {
        Some(addr) => addr,
        None => {
            tracing::error!("could not resolve listen address {}", args.addr);
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(FaceStore::new());
    let server = FaceServer::new(store);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    };

    match server.run(addr, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("could not serve on {}: {}", addr, e);
            ExitCode::FAILURE
        }
    }
}

async fn resolve(addr: &str) -> Option<SocketAddr> {
    match tokio::net::lookup_host(addr).await {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            tracing::error!("lookup of {} failed: {}", addr, e);
            None
        }
    }
}
