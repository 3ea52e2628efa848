use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::mpsc;

/// Black-box command runner for the transcoding engine. Every line the
/// engine prints goes to `on_log`; the return value is its exit code.
pub trait CommandExecutor {
    fn exec(&mut self, args: &[String], on_log: &mut dyn FnMut(&str)) -> Result<i32>;
}

/// Runs an external ffmpeg binary.
pub struct FfmpegExecutor {
    program: String,
}

impl FfmpegExecutor {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for FfmpegExecutor {
    fn exec(&mut self, args: &[String], on_log: &mut dyn FnMut(&str)) -> Result<i32> {
        log::debug!("exec {} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        let stdout = child.stdout.take().context("stdout not captured")?;
        let stderr = child.stderr.take().context("stderr not captured")?;

        // stdout is drained on its own thread so neither pipe can fill up
        // and stall the child.
        let (tx, rx) = mpsc::channel::<String>();
        let reader = std::thread::spawn(move || {
            for_each_line(BufReader::new(stdout), |line| tx.send(line).is_ok());
        });

        for_each_line(BufReader::new(stderr), |line| {
            on_log(&line);
            for out in rx.try_iter() {
                on_log(&out);
            }
            true
        });

        if reader.join().is_err() {
            log::warn!("stdout reader for {} panicked", self.program);
        }
        for out in rx.try_iter() {
            on_log(&out);
        }

        let status = child.wait().context("Failed to wait for engine")?;
        // Killed by a signal: no code, report as failure.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Feed each line of `reader` to `f` until EOF, a read error, or `f`
/// returning false. Bytes that are not UTF-8 are replaced, not fatal.
fn for_each_line<R: BufRead>(mut reader: R, mut f: impl FnMut(String) -> bool) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) => {
                log::warn!("Stopped reading engine output: {}", err);
                return;
            }
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if !f(String::from_utf8_lossy(&buf).into_owned()) {
            return;
        }
    }
}
