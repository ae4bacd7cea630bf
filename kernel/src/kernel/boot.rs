// kernel/src/kernel/boot.rs
//
// 起動シーケンス（1 回だけ）
//
// 1. ハードウェア初期化（timer は HZ）
// 2. 仮想ページ 0 を PRESENT のみで map（null 参照は kernel モードでも fault）
// 3. プロセス表を reset
// 4. シナリオに応じてプロセスを setup（失敗は fatal）
// 5. pid 1 を run（戻らない）

use super::fatal::Fatal;
use super::platform::Platform;
use super::Kernel;
use crate::logging;
use crate::mem::addr::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::mem::paging::PageFlags;
use crate::types::{Pid, ProgramId, HZ};

/// 起動時に作るプロセスの組
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootScenario {
    /// pid 1..=4 が program 0..=3
    AllPrograms,
    /// pid 1 だけが program 4
    Fork,
    /// pid 1 だけが program 5
    ForkExit,
}

impl BootScenario {
    /// 未知の command は既定シナリオ扱い
    pub fn from_command(command: Option<&str>) -> BootScenario {
        match command {
            Some("fork") => BootScenario::Fork,
            Some("forkexit") => BootScenario::ForkExit,
            _ => BootScenario::AllPrograms,
        }
    }

    pub fn processes(self) -> &'static [(Pid, ProgramId)] {
        match self {
            BootScenario::AllPrograms => &[
                (Pid(1), ProgramId(0)),
                (Pid(2), ProgramId(1)),
                (Pid(3), ProgramId(2)),
                (Pid(4), ProgramId(3)),
            ],
            BootScenario::Fork => &[(Pid(1), ProgramId(4))],
            BootScenario::ForkExit => &[(Pid(1), ProgramId(5))],
        }
    }
}

const FIRST_PID: Pid = Pid(1);

impl<P: Platform> Kernel<P> {
    /// self はこの時点で最終的な置き場所にあること（trap 入口がここを参照する）
    pub fn start(&mut self, command: Option<&str>) -> ! {
        self.platform.init_hardware(HZ);
        logging::info("trapkernel: starting");

        if let Err(cause) = self.platform.map(
            self.kernel_page_table,
            VirtAddr(0),
            PhysAddr(0),
            PAGE_SIZE,
            PageFlags::PRESENT,
        ) {
            self.fatal(Fatal::BootMapFailed { cause });
        }

        self.procs.reset();
        self.current = None;

        let scenario = BootScenario::from_command(command);
        logging::info_fmt(format_args!("boot scenario: {:?}", scenario));

        for &(pid, program) in scenario.processes() {
            if let Err(cause) = self.process_setup(pid, program) {
                self.fatal(Fatal::SetupFailed {
                    pid,
                    program,
                    cause,
                });
            }
        }

        if !self.debug_check_invariants() {
            logging::error("boot: invariant check failed");
        }

        self.run(FIRST_PID)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fatal::SetupError;
    use super::super::platform::{LoadError, MapError};
    use super::super::process::ProcState;
    use super::super::testing::{booted, drive, mock_entry, Exit, MockPlatform};
    use super::*;
    use crate::mem::layout;

    #[test]
    fn command_selects_scenario() {
        assert_eq!(BootScenario::from_command(None), BootScenario::AllPrograms);
        assert_eq!(BootScenario::from_command(Some("fork")), BootScenario::Fork);
        assert_eq!(
            BootScenario::from_command(Some("forkexit")),
            BootScenario::ForkExit
        );
        assert_eq!(
            BootScenario::from_command(Some("bogus")),
            BootScenario::AllPrograms
        );
    }

    #[test]
    fn default_boot_runs_four_programs_from_pid_one() {
        let mut k = Kernel::new(MockPlatform::new());
        let exit = drive(|| k.start(None));

        let Exit::Resumed(regs) = exit else {
            panic!("expected resume, got {:?}", exit);
        };
        assert_eq!(k.current_pid(), Some(Pid(1)));
        assert_eq!(regs, k.processes()[Pid(1)].registers);
        assert_eq!(k.platform().hz, Some(HZ));

        assert_eq!(k.processes().count_in(ProcState::Runnable), 4);
        for i in 0..4usize {
            let pid = Pid(i + 1);
            let p = &k.processes()[pid];
            assert_eq!(p.state, ProcState::Runnable);
            assert_eq!(p.registers.rip, mock_entry(ProgramId(i)).as_u64());
            assert_eq!(p.registers.rsp, layout::stack_top(pid).as_u64());
        }
        let loaded: std::vec::Vec<_> = k.platform().loads.iter().map(|(_, p)| *p).collect();
        assert_eq!(
            loaded,
            [ProgramId(0), ProgramId(1), ProgramId(2), ProgramId(3)]
        );
    }

    #[test]
    fn default_boot_gives_distinct_stacks() {
        let k = booted(None);
        let stacks: std::collections::BTreeSet<u64> =
            (1..=4).map(|i| k.processes()[Pid(i)].registers.rsp).collect();
        assert_eq!(stacks.len(), 4);

        for i in 1..=4 {
            let pid = Pid(i);
            let page = layout::stack_page(pid);
            let maps = k.platform().maps_at(page);
            assert_eq!(maps.len(), 1, "stack of pid {}", pid);
            assert_eq!(maps[0].pa, page.identity());
            assert_eq!(maps[0].len, PAGE_SIZE);
            assert_eq!(maps[0].flags, PageFlags::USER_RW);
            assert_eq!(maps[0].table, k.kernel_page_table());
        }
    }

    #[test]
    fn fork_boot_runs_only_program_four() {
        let k = booted(Some("fork"));

        assert_eq!(k.processes().count_in(ProcState::Runnable), 1);
        assert_eq!(k.processes()[Pid(1)].state, ProcState::Runnable);
        assert_eq!(k.platform().loads, [(k.kernel_page_table(), ProgramId(4))]);
        assert_eq!(k.current_pid(), Some(Pid(1)));
    }

    #[test]
    fn forkexit_boot_runs_only_program_five() {
        let k = booted(Some("forkexit"));

        assert_eq!(k.processes().count_in(ProcState::Runnable), 1);
        assert_eq!(k.platform().loads, [(k.kernel_page_table(), ProgramId(5))]);
    }

    #[test]
    fn boot_maps_null_page_present_only() {
        let k = booted(None);

        let maps = k.platform().maps_at(VirtAddr(0));
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].flags, PageFlags::PRESENT);
        assert_eq!(maps[0].table, k.kernel_page_table());
        assert!(k.debug_check_invariants());
    }

    #[test]
    fn null_page_map_failure_is_fatal() {
        let mut p = MockPlatform::new();
        p.fail_map_at = Some(VirtAddr(0));
        let mut k = Kernel::new(p);

        let exit = drive(|| k.start(None));

        assert_eq!(
            exit,
            Exit::Halted(Fatal::BootMapFailed {
                cause: MapError::FrameAllocationFailed
            })
        );
    }

    #[test]
    fn loader_failure_is_fatal() {
        let mut p = MockPlatform::new();
        p.known_programs = 2;
        let mut k = Kernel::new(p);

        let exit = drive(|| k.start(None));

        assert_eq!(
            exit,
            Exit::Halted(Fatal::SetupFailed {
                pid: Pid(3),
                program: ProgramId(2),
                cause: SetupError::Load(LoadError::UnknownProgram),
            })
        );
        assert_eq!(k.current_pid(), None);
    }
}
