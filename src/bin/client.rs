use std::fs::File;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::exit;

use structopt::StructOpt;

use txseq::contract::{self, Request, Response};
use txseq::Operation;

#[derive(Debug, StructOpt)]
#[structopt(name = "txseq-client",
about = env!("CARGO_PKG_DESCRIPTION"),
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
enum ClientOpt {
    /// run the operations listed in a JSON file as one transactional sequence.
    Run {
        /// a JSON array of operations.
        #[structopt(parse(from_os_str))]
        file: PathBuf,
        /// the server
        #[structopt(
        name = "addr",
        long = "--addr",
        default_value = "127.0.0.1:4000"
        )]
        server: SocketAddr,
    },
    /// read a committed value.
    Get {
        /// a key string to get.
        key: String,
        #[structopt(
        name = "addr",
        long = "--addr",
        default_value = "127.0.0.1:4000"
        )]
        server: SocketAddr,
    },
    /// print the name and version of the server.
    Version {
        #[structopt(
        name = "addr",
        long = "--addr",
        default_value = "127.0.0.1:4000"
        )]
        server: SocketAddr,
    },
}

fn send_to(request: &Request, addr: SocketAddr) -> Result<Response, failure::Error> {
    let bin = contract::to_binary(request)?;
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(bin.as_slice())?;
    stream.shutdown(std::net::Shutdown::Write)?;
    Ok(contract::parse(stream)?)
}

impl ClientOpt {
    fn send(self) -> Result<Response, failure::Error> {
        match self {
            ClientOpt::Run { file, server } => {
                let operations: Vec<Operation> = contract::parse(File::open(&file)?)?;
                send_to(&Request::Run { operations }, server)
            }
            ClientOpt::Get { key, server } => send_to(&Request::Get { key }, server),
            ClientOpt::Version { server } => send_to(&Request::Version, server),
        }
    }
}

fn main() {
    let opt = ClientOpt::from_args();
    let response = match opt.send() {
        Ok(response) => response,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };
    match response {
        Response::Committed { effects } => {
            println!("committed {} operation(s), effects {:?}", effects.len(), effects);
        }
        Response::Value { value: Some(value) } => println!("{}", value),
        Response::Value { value: None } => println!("Key not found"),
        Response::Version { name, version } => println!("{} {}", name, version),
        Response::Failed { reason, .. } => {
            eprintln!("{}", reason);
            exit(1);
        }
        Response::Error { reason } => {
            eprintln!("{}", reason);
            exit(1);
        }
    }
}
