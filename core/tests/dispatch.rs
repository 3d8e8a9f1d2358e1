//! End-to-end tests of the protocol dispatcher over an in-memory channel
//! and an in-memory storage driver -- no sockets, no filesystem.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use storage_protocol_core::channel::{Channel, MemoryChannel};
use storage_protocol_core::error::{Error, Result};
use storage_protocol_core::storage::{feature, ReadHandle, StorageDriver, WriteHandle, WriteOptions};
use storage_protocol_core::{ProtocolServer, SessionConfig, Value};

type Files = Rc<RefCell<HashMap<String, Vec<u8>>>>;

#[derive(Clone)]
struct MemoryDriver {
    files: Files,
}

impl MemoryDriver {
    fn new() -> Self {
        MemoryDriver {
            files: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn seed(&self, path: &str, contents: &[u8]) {
        self.files.borrow_mut().insert(path.to_string(), contents.to_vec());
    }
}

// The test driver is only ever used from one thread; `Rc` is not `Send`,
// but nothing here actually sends it across threads.
unsafe impl Send for MemoryDriver {}

impl StorageDriver for MemoryDriver {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.borrow().contains_key(path))
    }

    fn feature(&self) -> u64 {
        feature::ATOMIC
    }

    fn list(&self, path: &str, _expression: Option<&str>) -> Result<Vec<String>> {
        let prefix = format!("{path}/");
        let mut names: Vec<String> = self
            .files
            .borrow()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn path_exists(&self, _path: &str) -> Result<Option<bool>> {
        Ok(None)
    }

    fn path_create(&self, _path: &str, _error_on_exists: bool, _no_parent_create: bool, _mode: Option<u32>) -> Result<()> {
        Ok(())
    }

    fn path_remove(&self, _path: &str, _recursive: bool) -> Result<bool> {
        Ok(true)
    }

    fn path_sync(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, path: &str, error_on_missing: bool) -> Result<()> {
        match self.files.borrow_mut().remove(path) {
            Some(_) => Ok(()),
            None if !error_on_missing => Ok(()),
            None => Err(Error::PathMissing(path.to_string())),
        }
    }

    fn new_read(&self, path: &str, ignore_missing: bool) -> Result<Option<Box<dyn ReadHandle>>> {
        match self.files.borrow().get(path) {
            Some(contents) => Ok(Some(Box::new(Cursor::new(contents.clone())))),
            None if ignore_missing => Ok(None),
            None => Err(Error::FileOpen(path.to_string())),
        }
    }

    fn new_write(&self, path: &str, _options: WriteOptions) -> Result<Box<dyn WriteHandle>> {
        Ok(Box::new(MemoryWriteHandle {
            files: self.files.clone(),
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }
}

struct MemoryWriteHandle {
    files: Files,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriteHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl WriteHandle for MemoryWriteHandle {
    fn commit(self: Box<Self>) -> Result<()> {
        self.files.borrow_mut().insert(self.path, self.buffer);
        Ok(())
    }

    fn abandon(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn run(driver: MemoryDriver, requests: &[&str]) -> Vec<String> {
    let mut input = Vec::new();
    for line in requests {
        input.extend_from_slice(line.as_bytes());
        input.push(b'\n');
    }
    let mut channel = MemoryChannel::new(input);
    let server = ProtocolServer::new(driver, SessionConfig::default()).unwrap();
    server.serve(&mut channel).unwrap();
    String::from_utf8(channel.outbound)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn exists_reports_true_for_a_seeded_file() {
    let driver = MemoryDriver::new();
    driver.seed("/a/b.txt", b"hello");
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/exists","params":["/a/b.txt"]}"#]);
    assert_eq!(responses, vec![r#"{"ok":true}"#]);
}

#[test]
fn feature_reports_the_driver_bitmask() {
    let driver = MemoryDriver::new();
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/feature","params":[]}"#]);
    assert_eq!(responses, vec![format!(r#"{{"ok":{}}}"#, feature::ATOMIC)]);
}

#[test]
fn list_returns_names_under_a_path() {
    let driver = MemoryDriver::new();
    driver.seed("/dir/one.txt", b"1");
    driver.seed("/dir/two.txt", b"2");
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/list","params":["/dir",null]}"#]);
    assert_eq!(responses, vec![r#"{"ok":["one.txt","two.txt"]}"#]);
}

#[test]
fn path_exists_is_a_protocol_error_when_the_driver_does_not_support_it() {
    let driver = MemoryDriver::new();
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/pathExists","params":["/x"]}"#]);
    assert_eq!(responses.len(), 1);
    assert!(responses[0].contains(r#""kind":"ProtocolError""#));
}

#[test]
fn open_read_streams_a_small_file_with_no_filters() {
    let driver = MemoryDriver::new();
    driver.seed("/page.bin", b"database page contents");
    let responses = run(
        driver.clone(),
        &[r#"{"cmd":"storage/openRead","params":["/page.bin",false,null]}"#],
    );
    // found=true, one payload block, BLOCK0, then the (empty) filter result.
    assert_eq!(responses[0], r#"{"ok":true}"#);
    assert_eq!(responses[1], "BLOCK22");
    assert_eq!(responses[2], "database page contents");
    assert_eq!(responses[3], "BLOCK0");
    assert_eq!(responses[4], r#"{"ok":{}}"#);
}

#[test]
fn open_read_reports_false_and_no_filter_result_when_the_file_is_missing() {
    let driver = MemoryDriver::new();
    let responses = run(
        driver.clone(),
        &[r#"{"cmd":"storage/openRead","params":["/missing.bin",true,null]}"#],
    );
    assert_eq!(responses, vec![r#"{"ok":false}"#]);
}

#[test]
fn open_write_then_read_round_trips_with_a_size_filter() {
    let driver = MemoryDriver::new();
    let payload = b"twelve bytes";
    let request = r#"{"cmd":"storage/openWrite","params":["/out.bin",null,null,null,null,null,false,false,false,false,[{"size":[]}]]}"#;
    let responses = run(
        driver.clone(),
        &[
            request,
            &format!("BLOCK{}", payload.len()),
            std::str::from_utf8(payload).unwrap(),
            "BLOCK0",
        ],
    );
    assert_eq!(responses[0], r#"{"ok":null}"#);
    assert_eq!(responses[1], r#"{"ok":{"size":12}}"#);
    assert_eq!(driver.files.borrow().get("/out.bin").unwrap(), payload);
}

#[test]
fn open_write_abort_does_not_commit_and_responds_with_null() {
    let driver = MemoryDriver::new();
    let request = r#"{"cmd":"storage/openWrite","params":["/aborted.bin",null,null,null,null,null,false,false,false,false,null]}"#;
    let responses = run(driver.clone(), &[request, "BLOCK4", "data", "BLOCK-1"]);
    assert_eq!(responses[0], r#"{"ok":null}"#);
    assert_eq!(responses[1], r#"{"ok":null}"#);
    assert!(!driver.files.borrow().contains_key("/aborted.bin"));
}

#[test]
fn remove_with_error_on_missing_reports_path_missing_error() {
    let driver = MemoryDriver::new();
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/remove","params":["/gone.bin"]}"#]);
    assert_eq!(responses.len(), 1);
    assert!(responses[0].contains(r#""kind":"PathMissingError""#));
}

#[test]
fn unknown_command_is_reported_as_a_protocol_error() {
    let driver = MemoryDriver::new();
    let responses = run(driver.clone(), &[r#"{"cmd":"storage/bogus","params":[]}"#]);
    assert_eq!(responses.len(), 1);
    assert!(responses[0].contains(r#""kind":"ProtocolError""#));
}
