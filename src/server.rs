use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info, warn};

use crate::contract::{self, Request, Response};
use crate::engines::engine::TransactionalStore;
use crate::sequence::run_sequence;
use crate::server_common::{Result, ServerError};
use crate::thread_pool::ThreadPool;

/// What the server answers to a `version` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub version: String,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// A cloneable trigger that stops the accept loop of `Server::serve`.
#[derive(Clone, Debug)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    wake: SocketAddr,
}

impl Shutdown {
    /// a trigger for the server listening on `listening_on`.
    pub fn new(listening_on: SocketAddr) -> Self {
        let mut wake = listening_on;
        if wake.ip().is_unspecified() {
            wake.set_ip(match wake.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        Shutdown {
            triggered: Arc::new(AtomicBool::new(false)),
            wake,
        }
    }

    /// Stop accepting connections. Idempotent.
    /// The blocked `accept` is woken by a connection to the listener itself.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            if let Err(err) = TcpStream::connect(self.wake) {
                warn!("failed to wake up the listener at {}: {}", self.wake, err);
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// Counts requests being handled, so shutdown can wait for them.
#[derive(Clone, Default)]
struct InFlight(Arc<(Mutex<usize>, Condvar)>);

struct InFlightToken(InFlight);

impl InFlight {
    fn enter(&self) -> InFlightToken {
        let mut count = (self.0).0.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        InFlightToken(self.clone())
    }

    fn count(&self) -> usize {
        *(self.0).0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// block until no request is in flight, or `timeout` elapses. true if idle.
    fn wait_idle(&self, timeout: Duration) -> bool {
        let (lock, idle) = &*self.0;
        let count = lock.lock().unwrap_or_else(PoisonError::into_inner);
        match idle.wait_timeout_while(count, timeout, |count| *count > 0) {
            Ok((count, _)) => *count == 0,
            Err(poisoned) => *poisoned.into_inner().0 == 0,
        }
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        let (lock, idle) = &*(self.0).0;
        let mut count = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        idle.notify_all();
    }
}

/// Answer one request against `store`.
pub fn dispatch<S: TransactionalStore>(request: Request, store: &S, identity: &Identity) -> Response {
    match request {
        Request::Run { operations } => match run_sequence(store, &operations) {
            Ok(committed) => Response::Committed {
                effects: committed.effects,
            },
            Err(failure) => {
                error!(target: "app::error", "sequence aborted: {}", failure);
                Response::from(&failure)
            }
        },
        Request::Get { key } => match store.get(key) {
            Ok(value) => Response::Value { value },
            Err(err) => Response::Error {
                reason: format!("{}", err),
            },
        },
        Request::Version => Response::Version {
            name: identity.name.clone(),
            version: identity.version.clone(),
        },
    }
}

fn handle_request<S: TransactionalStore>(
    mut stream: TcpStream,
    store: S,
    identity: &Identity,
) -> Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let request: Request = contract::parse(&mut stream)?;
    info!(target: "app::request", "handling request {:?}.", &request);
    let response = dispatch(request, &store, identity);
    stream.write_all(contract::to_binary(&response)?.as_slice())?;
    stream.shutdown(std::net::Shutdown::Write)?;
    Ok(())
}

/// The threaded server: every connection carries one request,
/// handled on the pool against a clone of the store.
pub struct Server<S, P> {
    store: S,
    pool: P,
    identity: Arc<Identity>,
    in_flight: InFlight,
}

impl<S, P> Server<S, P>
where
    S: TransactionalStore,
    P: ThreadPool,
{
    pub fn new(store: S, pool: P) -> Self {
        Server {
            store,
            pool,
            identity: Arc::new(Identity::default()),
            in_flight: InFlight::default(),
        }
    }

    /// answer `version` requests with this identity.
    pub fn identify(mut self, identity: Identity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    /// Serve `listener` until `shutdown` is triggered,
    /// then wait at most `drain` for the requests in flight.
    ///
    /// # Error
    ///
    /// `ShutdownTimeout` when requests are still running after `drain`.
    pub fn serve(self, listener: TcpListener, shutdown: &Shutdown, drain: Duration) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("succeed to bind to {}, listening incoming requests.", addr);
        for stream in listener.incoming() {
            if shutdown.is_triggered() {
                break;
            }
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    error!(target: "app::error", "failed to accept a connection: {}", err);
                    continue;
                }
            };
            let token = self.in_flight.enter();
            let store = self.store.clone();
            let identity = self.identity.clone();
            self.pool.spawn(move || {
                let _token = token;
                let peer_addr = stream
                    .peer_addr()
                    .map(|addr| format!("{}", addr))
                    .unwrap_or_else(|_| "UNKNOWN".to_owned());
                if let Err(err) = handle_request(stream, store, &identity) {
                    error!(target: "app::error", "An error: {} occurs during processing... with peer: {}", err, peer_addr);
                }
            });
        }

        info!("shutting down the server on {}", addr);
        if self.in_flight.wait_idle(drain) {
            info!("server exit");
            Ok(())
        } else {
            Err(ServerError::ShutdownTimeout(self.in_flight.count()))
        }
    }
}
