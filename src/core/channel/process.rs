use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::{within_deadline, ChannelOutput, Termination};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Close to the deadline the exit is polled much more often, so a command
/// that finishes just before its timeout is not reported as timed out.
const FINAL_WINDOW: Duration = Duration::from_millis(100);
const FINAL_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long to keep draining output after the process is gone. Background
/// children that inherited the pipe can hold it open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Spawn `cmd` with stdout and stderr sharing one pipe and wait at most
/// `timeout` for it.
///
/// On timeout the local process is killed. Whatever it started on the far
/// side of a transport keeps running.
///
/// The exit is observed by polling. Runtime includes the detection latency,
/// at most `FINAL_POLL_INTERVAL` inside the last `FINAL_WINDOW` before the
/// deadline.
///
/// Returns `Err` only when the process could not be spawned.
pub(super) fn run(
    mut cmd: Command,
    stdin_file: Option<&Path>,
    timeout: Duration,
) -> io::Result<ChannelOutput> {
    match stdin_file {
        Some(path) => match File::open(path) {
            Ok(file) => {
                cmd.stdin(file);
            }
            Err(err) => {
                return Ok(ChannelOutput {
                    termination: Termination::Exited(-1),
                    output: format!("Failed to open stdin file {}: {}", path.display(), err),
                    duration: Duration::ZERO,
                });
            }
        },
        None => {
            cmd.stdin(Stdio::null());
        }
    }

    let (reader, writer) = io::pipe()?;
    cmd.stdout(writer.try_clone()?);
    cmd.stderr(writer);

    let started = Instant::now();
    let mut child = cmd.spawn()?;
    // The Command still owns write ends of the pipe; the reader only sees EOF
    // once they are closed.
    drop(cmd);

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let drained = spawn_reader(reader, Arc::clone(&buffer));

    let termination = loop {
        if let Some(status) = child.try_wait()? {
            if within_deadline(started.elapsed(), timeout) {
                break Termination::Exited(status.code().unwrap_or(-1));
            }
            break Termination::TimedOut;
        }

        let elapsed = started.elapsed();
        if !within_deadline(elapsed, timeout) {
            let _ = child.kill();
            let _ = child.wait();
            break Termination::TimedOut;
        }

        thread::sleep(poll_interval(timeout - elapsed));
    };
    let duration = started.elapsed();

    let _ = drained.recv_timeout(DRAIN_GRACE);
    let output = match buffer.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).to_string(),
    };

    Ok(ChannelOutput {
        termination,
        output,
        duration,
    })
}

fn poll_interval(remaining: Duration) -> Duration {
    let interval = if remaining <= FINAL_WINDOW {
        FINAL_POLL_INTERVAL
    } else {
        POLL_INTERVAL
    };
    interval.min(remaining)
}

fn spawn_reader(mut reader: io::PipeReader, buffer: Arc<Mutex<Vec<u8>>>) -> mpsc::Receiver<()> {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if let Ok(mut bytes) = buffer.lock() {
                        bytes.extend_from_slice(&chunk[..n]);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done_tx.send(());
    });
    done_rx
}

#[cfg(test)]
mod interval_tests {
    use super::*;

    #[test]
    fn polls_finely_near_the_deadline() {
        assert_eq!(poll_interval(Duration::from_secs(5)), POLL_INTERVAL);
        assert_eq!(poll_interval(Duration::from_millis(80)), FINAL_POLL_INTERVAL);
        assert_eq!(poll_interval(Duration::from_micros(300)), Duration::from_micros(300));
    }
}
