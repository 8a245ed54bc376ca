use std::fs::File;
use std::path::PathBuf;
use std::process::exit;

use structopt::StructOpt;

use txseq::config::{self, LogSettings};
use txseq::contract;
use txseq::server_common::Engine;
use txseq::with_store;
use txseq::{run_sequence, Operation, TransactionalStore};

#[derive(Debug, StructOpt)]
#[structopt(name = "txseq",
about = env!("CARGO_PKG_DESCRIPTION"),
author = env!("CARGO_PKG_AUTHORS"),
version = env!("CARGO_PKG_VERSION"))]
struct Opt {
    /// the engine of the working directory: log, sled or memory.
    #[structopt(long = "--engine", default_value = "log")]
    engine: Engine,
    /// the working directory.
    #[structopt(long = "--dir", default_value = ".", parse(from_os_str))]
    dir: PathBuf,
    /// log at debug level.
    #[structopt(short = "v", long = "--verbose")]
    verbose: bool,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// run the operations listed in a JSON file as one transactional sequence.
    Run {
        /// a JSON array of operations.
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },
    /// read a committed value.
    Get {
        /// a key string to get.
        key: String,
    },
}

/// run `command`, returning the exit code.
fn execute<S: TransactionalStore>(store: S, command: Command) -> Result<i32, failure::Error> {
    match command {
        Command::Run { file } => {
            let operations: Vec<Operation> = contract::parse(File::open(&file)?)?;
            match run_sequence(&store, &operations) {
                Ok(committed) => {
                    println!("committed {} operation(s)", committed.effects.len());
                    Ok(0)
                }
                Err(failure) => {
                    eprintln!("{}", failure);
                    Ok(1)
                }
            }
        }
        Command::Get { key } => {
            match store.get(key)? {
                Some(value) => println!("{}", value),
                None => println!("Key not found"),
            }
            Ok(0)
        }
    }
}

fn run(opt: Opt) -> Result<i32, failure::Error> {
    if opt.verbose {
        config::log4rs::init(&LogSettings {
            level: "debug".to_owned(),
            ..LogSettings::default()
        })?;
    }
    let command = opt.command;
    with_store!(opt.engine, &opt.dir, |store| execute(store, command))
}

fn main() {
    let opt = Opt::from_args();
    match run(opt) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    }
}
