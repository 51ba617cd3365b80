//! Sequential-I/O detection over captured execution traces.
//!
//! Traces are strace-style text: one call per line, optionally prefixed with
//! `[pid N]`, e.g. `transmit(1, 0x4347c000, 1, 0xbaaaaffc) = 0`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Direction of a data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Transmit,
    Receive,
}

/// One event of interest in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Transfer { direction: Direction, size: u64 },
    Exit,
}

/// The longest offending run found in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequentialRun {
    pub direction: Direction,
    pub length: usize,
    /// 1-based line on which the run crossed the threshold.
    pub line: usize,
}

fn transfer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\[pid\s+\d+\]\s+)?(transmit|receive)\(\s*\d+\s*,\s*[^,]*,\s*(\d+)")
            .expect("valid transfer regex")
    })
}

/// Parse one trace line.
pub fn parse_line(line: &str) -> Option<TraceEvent> {
    let line = line.trim();
    if line.contains("_terminate(") || line.contains("+++ exited") {
        return Some(TraceEvent::Exit);
    }
    let caps = transfer_re().captures(line)?;
    let direction = match &caps[1] {
        "transmit" => Direction::Transmit,
        _ => Direction::Receive,
    };
    let size = caps[2].parse().ok()?;
    Some(TraceEvent::Transfer { direction, size })
}

/// Find the first run of more than `threshold` consecutive same-direction
/// transfers of at most one byte, with no larger transfer or exit between.
pub fn find_sequential_run(trace: &str, threshold: usize) -> Option<SequentialRun> {
    let mut current: Option<Direction> = None;
    let mut length = 0usize;

    for (index, line) in trace.lines().enumerate() {
        match parse_line(line) {
            Some(TraceEvent::Transfer { direction, size }) if size <= 1 => {
                if current == Some(direction) {
                    length += 1;
                } else {
                    current = Some(direction);
                    length = 1;
                }
                if length > threshold {
                    return Some(SequentialRun {
                        direction,
                        length,
                        line: index + 1,
                    });
                }
            }
            Some(_) => {
                current = None;
                length = 0;
            }
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls(direction: &str, size: u64, n: usize) -> String {
        (0..n)
            .map(|_| format!("{direction}(1, 0x4347c000, {size}, 0xbaaaaffc) = 0\n"))
            .collect()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("transmit(1, 0x4347c000, 1, 0xbaaaaffc) = 0"),
            Some(TraceEvent::Transfer {
                direction: Direction::Transmit,
                size: 1
            })
        );
        assert_eq!(
            parse_line("[pid  4242] receive(0, 0xbaaaaf00, 128, 0xbaaaaefc) = 0"),
            Some(TraceEvent::Transfer {
                direction: Direction::Receive,
                size: 128
            })
        );
        assert_eq!(parse_line("_terminate(0)"), Some(TraceEvent::Exit));
        assert_eq!(parse_line("+++ exited with 0 +++"), Some(TraceEvent::Exit));
        assert_eq!(parse_line("allocate(4096, 0, 0xbaaaaffc) = 0"), None);
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(find_sequential_run(&calls("transmit", 1, 25), 25).is_none());

        let run = find_sequential_run(&calls("transmit", 1, 26), 25).expect("run over threshold");
        assert_eq!(run.direction, Direction::Transmit);
        assert_eq!(run.length, 26);
        assert_eq!(run.line, 26);
    }

    #[test]
    fn test_larger_transfer_resets() {
        let trace = format!(
            "{}{}{}",
            calls("receive", 1, 20),
            calls("receive", 64, 1),
            calls("receive", 1, 20)
        );
        assert!(find_sequential_run(&trace, 25).is_none());
    }

    #[test]
    fn test_exit_resets() {
        let trace = format!("{}_terminate(0)\n{}", calls("receive", 0, 20), calls("receive", 1, 20));
        assert!(find_sequential_run(&trace, 25).is_none());
    }

    #[test]
    fn test_direction_change_restarts() {
        let trace = format!("{}{}", calls("transmit", 1, 20), calls("receive", 1, 20));
        assert!(find_sequential_run(&trace, 25).is_none());
    }

    #[test]
    fn test_unrelated_lines_do_not_reset() {
        let mut trace = calls("transmit", 1, 13);
        trace.push_str("fdwait(1, 0xbaaaaf00, 0, 0, 0) = 0\n");
        trace.push_str(&calls("transmit", 1, 13));
        assert!(find_sequential_run(&trace, 25).is_some());
    }
}
