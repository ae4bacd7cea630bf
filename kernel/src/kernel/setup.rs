// kernel/src/kernel/setup.rs
//
// 役割:
// - boot 時に 1 つのプロセス記述子を program image から組み立てる。
//
// やること:
// - レジスタを初期化し、user モード既定値（segment / IF）を入れる
// - page table はカーネルと共有（記述子ごとの参照は残しておく）
// - loader に image をロードさせ、エントリ rip を受け取る
// - スタックページ（ウィンドウ末尾の 1 ページ）をゼロクリアして P|W|U で identity map
//
// やらないこと:
// - 失敗時の巻き戻し。失敗したら boot が fatal にする。
//   state を Runnable にするのは最後なので、失敗した記述子は Free のまま。

use super::event::LogEvent;
use super::fatal::SetupError;
use super::platform::Platform;
use super::process::ProcState;
use super::registers::Registers;
use super::Kernel;
use crate::logging;
use crate::mem::addr::PAGE_SIZE;
use crate::mem::layout;
use crate::mem::paging::PageFlags;
use crate::types::{Pid, ProgramId};

impl<P: Platform> Kernel<P> {
    pub fn process_setup(&mut self, pid: Pid, program: ProgramId) -> Result<(), SetupError> {
        if !pid.is_assignable() {
            return Err(SetupError::InvalidPid);
        }

        let table = self.kernel_page_table;

        let mut regs = Registers::zeroed();
        self.platform.init_user_registers(&mut regs);

        let entry = self
            .platform
            .load_program(table, program)
            .map_err(SetupError::Load)?;
        regs.rip = entry.as_u64();
        regs.rsp = layout::stack_top(pid).as_u64();

        let stack = layout::stack_page(pid);
        self.platform.zero_page(stack.identity());
        self.platform
            .map(table, stack, stack.identity(), PAGE_SIZE, PageFlags::USER_RW)
            .map_err(SetupError::Map)?;

        let p = &mut self.procs[pid];
        p.registers = regs;
        p.page_table = Some(table);
        p.state = ProcState::Runnable;

        self.events.push(LogEvent::ProcessSetup { pid, program });
        logging::info_fmt(format_args!(
            "process_setup: pid={} program={} rip={:#x} rsp={:#x}",
            pid, program, regs.rip, regs.rsp
        ));

        Ok(())
    }
}
