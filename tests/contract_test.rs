use std::io;

use txseq::contract::{self, Request, Response};
use txseq::engines::memory::MemoryStore;
use txseq::sequence::{run_sequence, FailureKind, Operation};

#[test]
fn make_and_parse() {
    let c = Request::Run {
        operations: vec![
            Operation::update_one("user:1:age", "20"),
            Operation::delete_one("user:3"),
        ],
    };
    let bc = contract::to_binary(&c).unwrap();
    let reader = io::Cursor::new(bc.as_slice());
    let cr: Request = contract::parse(reader).expect("Failed to parse.");
    assert_eq!(c, cr);
}

#[test]
fn requests_are_tagged_by_type() {
    let request: Request = contract::parse(&br#"{"type": "version"}"#[..]).unwrap();
    assert_eq!(request, Request::Version);
    let request: Request = contract::parse(&br#"{"type": "get", "key": "score"}"#[..]).unwrap();
    assert_eq!(
        request,
        Request::Get {
            key: "score".to_owned()
        }
    );
}

#[test]
fn garbage_is_malformed() {
    match contract::parse::<Request>(&b"set score 100"[..]) {
        Err(contract::Error::MalformedBinary) => (),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn failures_become_failed_responses() {
    let store = MemoryStore::new();
    let failure = run_sequence(&store, &[Operation::update_one("user:2:age", "20")]).unwrap_err();
    match Response::from(&failure) {
        Response::Failed {
            kind,
            position,
            reason,
        } => {
            assert_eq!(kind, FailureKind::EffectMismatch);
            assert_eq!(position, Some(1));
            assert!(reason.contains("rolled back"));
        }
        other => panic!("unexpected response {:?}", other),
    }
}
