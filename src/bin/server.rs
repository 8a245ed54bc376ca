use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use log::{error, info};
use structopt::StructOpt;

use txseq::config::{self, Settings};
use txseq::server::{Identity, Server, Shutdown};
use txseq::server_common::{Engine, Pool, Result};
use txseq::thread_pool::*;
use txseq::with_store;
use txseq::TransactionalStore;

#[derive(Debug, StructOpt)]
#[structopt(name = "txseq-server",
about = env!("CARGO_PKG_DESCRIPTION"),
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct ServerOpt {
    /// the settings file, searched in /etc/txseq, ~/.txseq and . when omitted.
    #[structopt(long = "--config", parse(from_os_str))]
    config: Option<PathBuf>,
    /// overrides `addr` of the settings.
    #[structopt(long = "--addr")]
    addr: Option<SocketAddr>,
    /// overrides `engine` of the settings: log, sled or memory.
    #[structopt(long = "--engine")]
    engine: Option<Engine>,
    /// overrides `pool` of the settings: shared_queue, rayon or naive.
    #[structopt(long = "--pool")]
    pool: Option<Pool>,
    /// overrides `data_dir` of the settings.
    #[structopt(long = "--dir", parse(from_os_str))]
    dir: Option<PathBuf>,
}

impl ServerOpt {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(addr) = self.addr {
            settings.addr = addr;
        }
        if let Some(engine) = self.engine {
            settings.engine = engine;
        }
        if let Some(pool) = self.pool {
            settings.pool = pool;
        }
        if let Some(dir) = self.dir.as_ref() {
            settings.data_dir = dir.clone();
        }
        Ok(settings)
    }
}

fn serve<S: TransactionalStore, P: ThreadPool>(
    store: S,
    pool: P,
    listener: TcpListener,
    shutdown: &Shutdown,
    identity: Identity,
    drain: Duration,
) -> Result<()> {
    Server::new(store, pool)
        .identify(identity)
        .serve(listener, shutdown, drain)
}

fn run(opt: ServerOpt) -> Result<()> {
    let settings = opt.settings()?;
    config::log4rs::init(&settings.log)?;
    error!(target: "app::error", "=== app::error === [txseq version {}, listen on {}]", env!("CARGO_PKG_VERSION"), settings.addr);
    info!(target: "app::request", "=== app::request === [txseq version {}, listen on {}]", env!("CARGO_PKG_VERSION"), settings.addr);
    info!("config: {:?}", settings);

    let listener = TcpListener::bind(settings.addr)?;
    let shutdown = Shutdown::new(listener.local_addr()?);
    let handler = {
        let shutdown = shutdown.clone();
        move || {
            info!("Shutdown server");
            shutdown.trigger();
        }
    };
    if let Err(err) = ctrlc::set_handler(handler) {
        error!(target: "app::error", "failed to install the signal handler, only a kill stops us: {}", err);
    }

    let identity = Identity {
        name: settings.name.clone(),
        version: settings.version.clone(),
    };
    let threads = settings.threads;
    let drain = settings.shutdown_timeout();
    with_store!(settings.engine, &settings.data_dir, |store| match settings.pool {
        Pool::Naive => serve(store, NaiveThreadPool::new(threads)?, listener, &shutdown, identity, drain),
        Pool::Rayon => serve(store, RayonThreadPool::new(threads)?, listener, &shutdown, identity, drain),
        Pool::SharedQueue => serve(store, SharedQueueThreadPool::new(threads)?, listener, &shutdown, identity, drain),
    })
}

fn main() {
    let opt = ServerOpt::from_args();
    if let Err(err) = run(opt) {
        error!(target: "app::error", "server stopped: {}", err);
        eprintln!("{}", err);
        exit(1);
    }
}
