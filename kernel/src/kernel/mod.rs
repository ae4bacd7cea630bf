// src/kernel/mod.rs
//
// trapkernel: 単一コア・固定プロセス表・循環スケジューラの trap/process コア
//
// - Process: Pid + ProcState + Registers + page_table(root)
// - Kernel<P>: プロセス表 + current + tick + イベントログ + Platform
// - すべての kernel 入口は exception()（trap）か start()（boot）で、
//   どちらも run() で user に戻る（= 戻り値の無い `-> !`）。
//
// [設計上の不変条件]
//
// 1. procs[pid].pid == pid（reset 後、全スロット）
// 2. pid 0 は生きたプロセスにならない
// 3. current を書き換えるのは run() だけ（boot の reset で None に戻す以外）。
//    外には読み取り専用で見せる。
// 4. kernel コードは割り込み禁止で走る（単一の制御フロー）。
//    → プロセス表 / current / ticks にロックは要らない。
//
// これらは debug_check_invariants() によってログ出力ベースで検証される。

pub mod boot;
pub mod event;
pub mod exception;
pub mod fatal;
pub mod platform;
pub mod process;
pub mod registers;
pub mod run;
pub mod scheduler;
pub mod setup;
pub mod trace;
pub mod trap;

#[cfg(test)]
pub(crate) mod testing;

use crate::logging;
use crate::mem::addr::PhysFrame;
use crate::types::Pid;

use self::event::{EventLog, LogEvent};
use self::fatal::Fatal;
use self::platform::Platform;
use self::process::{ProcState, Process, ProcessTable};

/// fatal 直前にダンプするイベント数
const EVENTS_DUMPED_ON_FATAL: usize = 16;

pub struct Kernel<P: Platform> {
    platform: P,

    procs: ProcessTable,

    // run() だけが書く。lookup 用（所有はしない）
    current: Option<Pid>,

    // タイマ割り込み回数（診断用。スケジューリングには使わない）
    ticks: u64,

    kernel_page_table: PhysFrame,

    events: EventLog,
}

impl<P: Platform> Kernel<P> {
    pub fn new(platform: P) -> Self {
        let kernel_page_table = platform.kernel_page_table();

        Kernel {
            platform,
            procs: ProcessTable::new(),
            current: None,
            ticks: 0,
            kernel_page_table,
            events: EventLog::new(),
        }
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid)
    }

    /// 現在（または直近に trap した）プロセス
    pub fn current(&self) -> Option<&Process> {
        self.current.map(|pid| &self.procs[pid])
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn kernel_page_table(&self) -> PhysFrame {
        self.kernel_page_table
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// 中断要求（Ctrl-C）が来ていればマシンごと終了する
    fn poll_abort(&mut self) {
        if self.platform.check_abort() {
            logging::info("abort requested; powering off");
            self.platform.poweroff();
        }
    }

    /// 回復不能。診断を出して止まる。
    fn fatal(&mut self, reason: Fatal) -> ! {
        logging::error_fmt(format_args!("PANIC: {}", reason));
        self.events.push(LogEvent::Halted);
        self.events.dump_recent(EVENTS_DUMPED_ON_FATAL);
        self.platform.halt(&reason)
    }

    //
    // 簡易的な不変条件チェック（デバッグ用）
    //
    pub fn debug_check_invariants(&self) -> bool {
        let mut ok = true;

        // 1. pid == index
        for (idx, p) in self.procs.iter().enumerate() {
            if p.pid != Pid(idx) {
                logging::error("INVARIANT VIOLATION: procs[idx].pid != idx");
                logging::info_u64(" idx", idx as u64);
                logging::info_u64(" pid", p.pid.as_u64());
                ok = false;
            }
        }

        // 2. pid 0 は予約
        if self.procs[Pid(0)].state != ProcState::Free {
            logging::error("INVARIANT VIOLATION: pid 0 is live");
            ok = false;
        }

        // 3. current は生きたスロットを指す
        if let Some(pid) = self.current {
            if !pid.is_assignable() || self.procs[pid].state == ProcState::Free {
                logging::error("INVARIANT VIOLATION: current points at a free slot");
                logging::info_u64(" current", pid.as_u64());
                ok = false;
            }
        }

        // 4. Runnable なら page table を持つ
        for p in self.procs.iter() {
            if p.state == ProcState::Runnable && p.page_table.is_none() {
                logging::error("INVARIANT VIOLATION: runnable process without page table");
                logging::info_u64(" pid", p.pid.as_u64());
                ok = false;
            }
        }

        ok
    }
}
