// kernel/src/kernel/run.rs
//
// run(pid): kernel → プロセスへの制御移譲。
// - current を設定し、プロセスのページテーブルを有効にして、
//   保存済みレジスタを trampoline に渡す。
// - 呼び出し元には決して戻らない。kernel に戻る道は次の trap だけ。

use super::event::LogEvent;
use super::fatal::Fatal;
use super::platform::Platform;
use super::process::ProcState;
use super::Kernel;
use crate::types::Pid;

impl<P: Platform> Kernel<P> {
    pub fn run(&mut self, pid: Pid) -> ! {
        let state = self.procs[pid].state;
        if state != ProcState::Runnable {
            // 呼び出し側のバグ（回復させない）
            self.fatal(Fatal::NotRunnable { pid, state });
        }

        let Some(table) = self.procs[pid].page_table else {
            self.fatal(Fatal::NoPageTable { pid });
        };

        self.current = Some(pid);
        self.events.push(LogEvent::Ran(pid));

        self.platform.set_page_table(table);
        self.platform.exception_return(&self.procs[pid].registers)
    }
}
