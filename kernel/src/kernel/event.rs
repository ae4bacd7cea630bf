// kernel/src/kernel/event.rs
//
// 抽象イベントログ（リングバッファ）
// - 満杯になったら古いものから上書きする（最新 EVENT_LOG_CAP 件が残る）
// - fatal 直前に直近分をダンプする

use crate::kernel::trap::Trap;
use crate::logging;
use crate::mem::addr::VirtAddr;
use crate::types::{Pid, ProgramId};

pub const EVENT_LOG_CAP: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogEvent {
    ProcessSetup { pid: Pid, program: ProgramId },
    Ran(Pid),
    Trapped { pid: Pid, trap: Trap },
    Tick(u64),
    Broken { pid: Pid, addr: VirtAddr },
    Halted,
}

pub struct EventLog {
    buf: [Option<LogEvent>; EVENT_LOG_CAP],
    head: usize, // 次に書く位置
    len: usize,
}

impl EventLog {
    pub const fn new() -> Self {
        EventLog {
            buf: [None; EVENT_LOG_CAP],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, ev: LogEvent) {
        self.buf[self.head] = Some(ev);
        self.head = (self.head + 1) % EVENT_LOG_CAP;
        if self.len < EVENT_LOG_CAP {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 古い順
    pub fn iter(&self) -> impl Iterator<Item = LogEvent> + '_ {
        let start = (self.head + EVENT_LOG_CAP - self.len) % EVENT_LOG_CAP;
        (0..self.len).filter_map(move |i| self.buf[(start + i) % EVENT_LOG_CAP])
    }

    pub fn last(&self) -> Option<LogEvent> {
        if self.len == 0 {
            return None;
        }
        self.buf[(self.head + EVENT_LOG_CAP - 1) % EVENT_LOG_CAP]
    }

    /// 直近 n 件をログに出す
    pub fn dump_recent(&self, n: usize) {
        logging::info("=== Event Log (recent) ===");
        for ev in self.iter().skip(self.len.saturating_sub(n)) {
            log_event(ev);
        }
        logging::info("=== End of Event Log ===");
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(ev: LogEvent) {
    match ev {
        LogEvent::ProcessSetup { pid, program } => {
            logging::info("EVENT: ProcessSetup");
            logging::info_u64(" pid", pid.as_u64());
            logging::info_u64(" program", program.0 as u64);
        }
        LogEvent::Ran(pid) => {
            logging::info("EVENT: Ran");
            logging::info_u64(" pid", pid.as_u64());
        }
        LogEvent::Trapped { pid, trap } => {
            logging::info("EVENT: Trapped");
            logging::info_u64(" pid", pid.as_u64());
            logging::info_u64(" intno", trap.intno());
        }
        LogEvent::Tick(n) => {
            logging::info("EVENT: Tick");
            logging::info_u64(" tick", n);
        }
        LogEvent::Broken { pid, addr } => {
            logging::info("EVENT: Broken");
            logging::info_u64(" pid", pid.as_u64());
            logging::info_u64(" addr", addr.as_u64());
        }
        LogEvent::Halted => logging::info("EVENT: Halted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_most_recent_events_in_order() {
        let mut log = EventLog::new();
        for n in 0..(EVENT_LOG_CAP as u64 + 3) {
            log.push(LogEvent::Tick(n));
        }

        assert_eq!(log.len(), EVENT_LOG_CAP);
        let ticks: Vec<u64> = log
            .iter()
            .map(|ev| match ev {
                LogEvent::Tick(n) => n,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ticks.first(), Some(&3));
        assert_eq!(ticks.last(), Some(&(EVENT_LOG_CAP as u64 + 2)));
        assert_eq!(log.last(), Some(LogEvent::Tick(EVENT_LOG_CAP as u64 + 2)));
    }

    #[test]
    fn empty_log_has_no_last() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.last(), None);
    }
}
