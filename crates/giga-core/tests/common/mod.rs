#![allow(dead_code)]

pub mod range_server;
pub mod scripted;

use std::fs;
use std::io;
use std::sync::Mutex;

use giga_core::postprocess::RemuxTool;

/// Deterministic test body.
pub fn body(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Remux stand-in: concatenates every `-i` input into the last argument.
#[derive(Default)]
pub struct ConcatTool {
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl ConcatTool {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RemuxTool for ConcatTool {
    fn execute(&self, args: &[String]) -> io::Result<i32> {
        self.calls.lock().unwrap().push(args.to_vec());
        let mut out = Vec::new();
        for pair in args.windows(2) {
            if pair[0] == "-i" {
                out.extend(fs::read(&pair[1])?);
            }
        }
        fs::write(args.last().unwrap(), out)?;
        Ok(0)
    }
}
