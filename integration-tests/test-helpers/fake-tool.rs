// Copyright (c) The ktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for the converter, interpreter, prover and runner collaborators.
//!
//! The first argument is the role, followed by the arguments ktest appends for that role. The
//! tool's behavior comes from `key=value` directives in the file it's handed:
//!
//! - `stdout=TEXT` / `stderr=TEXT`: print a line.
//! - `output=TEXT`: write a line to the interpreter's `--output-file`.
//! - `sleep=SECS`: sleep before exiting.
//! - `signal-parent=N`: send signal `N` to ktest, then carry on (unix only).
//! - `exit=N`: exit code (default 0).
//! - `convert-exit=N`: exit code for the converter, which otherwise copies the file to stdout.
//! - `args`: print the arguments to stderr.

use std::{io::Write, time::Duration};

#[derive(Default)]
struct Directives {
    stdout: Vec<String>,
    stderr: Vec<String>,
    output: Vec<String>,
    sleep: Option<Duration>,
    signal_parent: Option<i32>,
    exit: i32,
    convert_exit: i32,
    print_args: bool,
}

impl Directives {
    fn parse(contents: &str) -> Self {
        let mut directives = Self::default();
        for line in contents.lines() {
            match line.split_once('=') {
                Some(("stdout", text)) => directives.stdout.push(text.to_owned()),
                Some(("stderr", text)) => directives.stderr.push(text.to_owned()),
                Some(("output", text)) => directives.output.push(text.to_owned()),
                Some(("sleep", secs)) => {
                    directives.sleep = Some(Duration::from_secs_f64(
                        secs.parse().expect("sleep is a number of seconds"),
                    ));
                }
                Some(("signal-parent", signo)) => {
                    directives.signal_parent =
                        Some(signo.parse().expect("signal-parent is a signal number"));
                }
                Some(("exit", code)) => directives.exit = code.parse().expect("exit is an integer"),
                Some(("convert-exit", code)) => {
                    directives.convert_exit = code.parse().expect("convert-exit is an integer")
                }
                None if line == "args" => directives.print_args = true,
                _ => {}
            }
        }
        directives
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (role, rest) = args.split_first().expect("role is the first argument");

    // Position of the input file among the arguments ktest appends for each role.
    let input = match role.as_str() {
        // <file>
        "convert" => &rest[0],
        // <definition> <input> --schedule .. --mode .. --output-file ..
        "interpret" => &rest[1],
        // --directory <dir> <spec> ..
        "prove" => &rest[2],
        // --directory <dir> -cSCHEDULE=.. -cMODE=.. <program> ..
        "run" => &rest[4],
        other => panic!("unknown role {other}"),
    };
    let contents = std::fs::read_to_string(input).expect("input file is readable");
    let directives = Directives::parse(&contents);

    if directives.print_args {
        eprintln!("[fake-{role}] {}", rest.join(" "));
    }

    if role == "convert" {
        print!("{contents}");
        std::process::exit(directives.convert_exit);
    }

    let mut stdout = std::io::stdout().lock();
    for line in &directives.stdout {
        writeln!(stdout, "{line}").expect("wrote stdout");
    }
    stdout.flush().expect("flushed stdout");
    for line in &directives.stderr {
        eprintln!("{line}");
    }

    if role == "interpret" {
        let pos = rest
            .iter()
            .position(|arg| arg == "--output-file")
            .expect("--output-file is passed");
        let mut output = directives.output.join("\n");
        if !output.is_empty() {
            output.push('\n');
        }
        std::fs::write(&rest[pos + 1], output).expect("wrote output file");
    }

    if let Some(signo) = directives.signal_parent {
        signal_parent(signo);
    }

    if let Some(sleep) = directives.sleep {
        std::thread::sleep(sleep);
    }
    std::process::exit(directives.exit);
}

#[cfg(unix)]
fn signal_parent(signo: i32) {
    let ppid = std::os::unix::process::parent_id();
    // SAFETY: sending a signal to the process that spawned us.
    let ret = unsafe { libc::kill(ppid as libc::pid_t, signo) };
    assert_eq!(ret, 0, "sent signal {signo} to {ppid}");
}

#[cfg(not(unix))]
fn signal_parent(_signo: i32) {
    panic!("signal-parent is only supported on unix");
}
