// kernel/src/kernel/exception.rs
//
// 例外ディスパッチャ（割り込み・trap・fault すべての入口）
//
// 入口の段取り:
// 1. entry stub が保存したレジスタを current の記述子へコピー
// 2. 常にカーネルのページテーブルに切り替える（どのプロセスが trap しても同じ）
// 3. 中断要求を見る（来ていれば原因に関係なく終了）
// 4. 原因ごとに遷移: resume current / reschedule / fatal
//
// #PF の扱い:
// - kernel モード由来 → kernel のバグ。fatal
// - user モード由来 → そのプロセスだけ Broken にして reschedule（マシンは止めない）

use super::event::LogEvent;
use super::fatal::{Fatal, PanicMessage, PANIC_MESSAGE_CAP};
use super::platform::Platform;
use super::process::ProcState;
use super::registers::Registers;
use super::trace;
use super::trap::Trap;
use super::Kernel;
use crate::logging;
use crate::mem::addr::VirtAddr;
use crate::types::Pid;

impl<P: Platform> Kernel<P> {
    pub fn exception(&mut self, regs: &Registers) -> ! {
        let Some(pid) = self.current else {
            self.fatal(Fatal::NoCurrentProcess { intno: regs.intno });
        };

        self.procs[pid].registers = *regs;
        self.platform.set_page_table(self.kernel_page_table);

        trace::trace_exception(pid, regs.intno);

        self.poll_abort();

        let trap = Trap::from_intno(regs.intno);
        self.events.push(LogEvent::Trapped { pid, trap });

        match trap {
            Trap::Panic => {
                let message = self.read_panic_message(pid, regs.rdi);
                self.fatal(Fatal::ProcessPanic { pid, message });
            }

            Trap::GetPid => {
                self.procs[pid].registers.set_return_value(pid.as_u64());
            }

            Trap::Yield => self.schedule(),

            Trap::PageAlloc => self.fatal(Fatal::NotImplemented {
                what: "INT_SYS_PAGE_ALLOC",
            }),

            Trap::Timer => {
                self.ticks += 1;
                self.events.push(LogEvent::Tick(self.ticks));
                self.schedule();
            }

            Trap::PageFault => self.handle_page_fault(pid, regs),

            Trap::Unexpected(intno) => self.fatal(Fatal::UnexpectedTrap { intno }),
        }

        // current へ戻る（もう走れないなら次へ）
        if self.procs[pid].state == ProcState::Runnable {
            self.run(pid)
        } else {
            self.schedule()
        }
    }

    fn handle_page_fault(&mut self, pid: Pid, regs: &Registers) {
        let addr = self.platform.fault_address();
        let code = regs.fault_code();

        if !code.is_user() {
            self.fatal(Fatal::KernelPageFault {
                addr,
                code,
                rip: regs.rip,
            });
        }

        logging::error_fmt(format_args!(
            "Process {} page fault for {} ({} {}, rip={:#x})!",
            pid,
            addr,
            code.operation(),
            code.problem(),
            regs.rip
        ));

        self.procs[pid].state = ProcState::Broken;
        self.events.push(LogEvent::Broken { pid, addr });
    }

    /// rdi == 0 はメッセージ無し。読めない場合も無し扱い。
    fn read_panic_message(&self, pid: Pid, user_ptr: u64) -> Option<PanicMessage> {
        if user_ptr == 0 {
            return None;
        }
        let table = self.procs[pid].page_table?;

        let mut buf = [0u8; PANIC_MESSAGE_CAP];
        let len = self
            .platform
            .read_user_str(table, VirtAddr(user_ptr), &mut buf)?;
        Some(PanicMessage::from_bytes(&buf[..len.min(PANIC_MESSAGE_CAP)]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{booted, drive, trap_regs, Exit};
    use super::*;
    use crate::kernel::trap::{
        INT_PAGEFAULT, INT_SYS_FORK, INT_SYS_GETPID, INT_SYS_PAGE_ALLOC, INT_SYS_PANIC,
        INT_SYS_YIELD, INT_TIMER,
    };
    use crate::mem::paging::FaultCode;
    use crate::types::NPROC;

    #[test]
    fn getpid_writes_pid_into_return_slot_and_resumes() {
        let mut k = booted(None);
        k.current = Some(Pid(3));
        let regs = trap_regs(&k, INT_SYS_GETPID);

        let exit = drive(|| k.exception(&regs));

        let Exit::Resumed(resumed) = exit else {
            panic!("expected resume, got {:?}", exit);
        };
        assert_eq!(resumed.rax, 3);
        assert_eq!(k.processes()[Pid(3)].registers.rax, 3);
        assert_eq!(k.current_pid(), Some(Pid(3)));
    }

    #[test]
    fn exception_saves_snapshot_and_switches_to_kernel_table() {
        let mut k = booted(None);
        let mut regs = trap_regs(&k, INT_SYS_GETPID);
        regs.rbx = 0xfeed;
        regs.rip = 0x10_0042;

        let _ = drive(|| k.exception(&regs));

        assert_eq!(k.processes()[Pid(1)].registers.rbx, 0xfeed);
        assert_eq!(k.processes()[Pid(1)].registers.rip, 0x10_0042);
        let kt = k.kernel_page_table();
        let acts = &k.platform().activations;
        // exception 入口で kernel table、run で process table（既定では同じもの）
        assert_eq!(acts[acts.len() - 2..], [kt, kt]);
    }

    #[test]
    fn yield_moves_to_another_runnable_process() {
        let mut k = booted(None);
        for _ in 0..8 {
            let before = k.current_pid().expect("current");
            let regs = trap_regs(&k, INT_SYS_YIELD);
            let exit = drive(|| k.exception(&regs));
            assert!(matches!(exit, Exit::Resumed(_)));
            assert_ne!(k.current_pid(), Some(before));
        }
    }

    #[test]
    fn yield_with_single_runnable_process_reselects_it() {
        let mut k = booted(Some("fork"));
        let regs = trap_regs(&k, INT_SYS_YIELD);

        let exit = drive(|| k.exception(&regs));

        assert!(matches!(exit, Exit::Resumed(_)));
        assert_eq!(k.current_pid(), Some(Pid(1)));
    }

    #[test]
    fn timer_counts_tick_and_preempts() {
        let mut k = booted(None);
        let regs = trap_regs(&k, INT_TIMER);

        let _ = drive(|| k.exception(&regs));
        assert_eq!(k.ticks(), 1);
        assert_eq!(k.current_pid(), Some(Pid(2)));

        let regs = trap_regs(&k, INT_TIMER);
        let _ = drive(|| k.exception(&regs));
        assert_eq!(k.ticks(), 2);
        assert_eq!(k.current_pid(), Some(Pid(3)));
    }

    #[test]
    fn user_page_fault_breaks_only_the_faulting_process() {
        let mut k = booted(None);
        k.current = Some(Pid(2));
        k.platform_mut().fault_addr = VirtAddr(0x18_2000);
        let mut regs = trap_regs(&k, INT_PAGEFAULT);
        regs.err = (FaultCode::USER | FaultCode::WRITE).bits();
        let _ = crate::logging::take_captured();

        let exit = drive(|| k.exception(&regs));

        assert!(matches!(exit, Exit::Resumed(_)));
        assert_eq!(k.processes()[Pid(2)].state, ProcState::Broken);
        for pid in [1, 3, 4] {
            assert_eq!(k.processes()[Pid(pid)].state, ProcState::Runnable);
        }
        assert_eq!(k.current_pid(), Some(Pid(3)));

        let log = crate::logging::take_captured();
        assert!(
            log.contains("Process 2 page fault for 0x182000 (write missing page"),
            "log was: {}",
            log
        );
    }

    #[test]
    fn broken_process_is_never_scheduled_again() {
        let mut k = booted(None);
        let mut regs = trap_regs(&k, INT_PAGEFAULT);
        regs.err = (FaultCode::USER | FaultCode::PRESENT).bits();
        let _ = drive(|| k.exception(&regs));
        assert_eq!(k.processes()[Pid(1)].state, ProcState::Broken);

        for _ in 0..(3 * NPROC) {
            let regs = trap_regs(&k, INT_TIMER);
            let _ = drive(|| k.exception(&regs));
            assert_ne!(k.current_pid(), Some(Pid(1)));
        }
    }

    #[test]
    fn kernel_page_fault_is_fatal_for_any_current() {
        for pid in 1..=4 {
            let mut k = booted(None);
            k.current = Some(Pid(pid));
            k.platform_mut().fault_addr = VirtAddr(0x8);
            let mut regs = trap_regs(&k, INT_PAGEFAULT);
            regs.err = FaultCode::empty().bits();
            regs.rip = 0x20_1234;

            let exit = drive(|| k.exception(&regs));

            assert_eq!(
                exit,
                Exit::Halted(Fatal::KernelPageFault {
                    addr: VirtAddr(0x8),
                    code: FaultCode::empty(),
                    rip: 0x20_1234,
                })
            );
            assert_eq!(k.processes()[Pid(pid)].state, ProcState::Runnable);
        }
    }

    #[test]
    fn page_alloc_is_not_implemented() {
        let mut k = booted(None);
        let regs = trap_regs(&k, INT_SYS_PAGE_ALLOC);

        let exit = drive(|| k.exception(&regs));

        assert_eq!(
            exit,
            Exit::Halted(Fatal::NotImplemented {
                what: "INT_SYS_PAGE_ALLOC"
            })
        );
    }

    #[test]
    fn unknown_cause_is_fatal_with_raw_code() {
        let mut k = booted(None);
        let regs = trap_regs(&k, INT_SYS_FORK);
        let _ = crate::logging::take_captured();

        let exit = drive(|| k.exception(&regs));

        assert_eq!(exit, Exit::Halted(Fatal::UnexpectedTrap { intno: 52 }));
        // platform の halt は理由を出さないので、診断は halt 前にここで出ている
        let log = crate::logging::take_captured();
        assert!(
            log.contains("[ERROR] PANIC: Unexpected exception 52!"),
            "log was: {}",
            log
        );
    }

    #[test]
    fn panic_without_message() {
        let mut k = booted(None);
        let mut regs = trap_regs(&k, INT_SYS_PANIC);
        regs.rdi = 0;

        let exit = drive(|| k.exception(&regs));

        assert_eq!(
            exit,
            Exit::Halted(Fatal::ProcessPanic {
                pid: Pid(1),
                message: None
            })
        );
    }

    #[test]
    fn panic_carries_process_message() {
        let mut k = booted(None);
        k.platform_mut()
            .user_strings
            .push((VirtAddr(0x10_0800), "assertion failed: p1 >= 0"));
        let mut regs = trap_regs(&k, INT_SYS_PANIC);
        regs.rdi = 0x10_0800;

        let exit = drive(|| k.exception(&regs));

        let Exit::Halted(Fatal::ProcessPanic {
            pid,
            message: Some(m),
        }) = exit
        else {
            panic!("expected process panic, got {:?}", exit);
        };
        assert_eq!(pid, Pid(1));
        assert_eq!(m.as_str(), "assertion failed: p1 >= 0");
    }

    #[test]
    fn abort_request_wins_over_any_cause() {
        let mut k = booted(None);
        k.platform_mut().abort_now = true;
        let regs = trap_regs(&k, INT_SYS_GETPID);

        let exit = drive(|| k.exception(&regs));

        assert_eq!(exit, Exit::PoweredOff);
        assert_eq!(k.processes()[Pid(1)].registers.rax, 0);
    }

    #[test]
    fn trap_before_any_process_ran_is_fatal() {
        let mut k = super::super::Kernel::new(super::super::testing::MockPlatform::new());
        let regs = Registers {
            intno: INT_TIMER,
            ..Registers::zeroed()
        };

        let exit = drive(|| k.exception(&regs));

        assert_eq!(
            exit,
            Exit::Halted(Fatal::NoCurrentProcess { intno: INT_TIMER })
        );
    }
}
