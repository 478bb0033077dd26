// Shared trace builders for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A file-access record with no link target
pub fn access(op: char, path: &str) -> String {
    access_with_link(op, "", path)
}

/// A file-access record; `link` goes in the %XX-encoded link slot
pub fn access_with_link(op: char, link: &str, path: &str) -> String {
    format!(
        "{},open,1700000000.000000,4242,2,4241,4242,pc1,cc1,f,ext4,1700000000.000000,512,644,dev42,{},{}",
        op, link, path
    )
}

/// A command record that ran in `rwd`
pub fn command(rwd: &str, cmd: &str) -> String {
    format!(
        "7,4242,2,4241,1700000000.000000,12,buildhost,,/usr/bin/cc,{},pc1,cc1,pathcode,{}",
        rwd, cmd
    )
}

/// The canonical single-compile trace under `/src`
pub fn compile_trace() -> String {
    [
        command("/src", "cc -c a.c -o out.o"),
        access('R', "a.c"),
        access('W', "out.o"),
    ]
    .join("\n")
}

/// Write `lines` as a trace file inside `dir`
pub fn write_trace(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("{}\n", text)).expect("write trace fixture");
    path
}
