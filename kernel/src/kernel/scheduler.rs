// kernel/src/kernel/scheduler.rs
//
// 循環スケジューラ
// - current の次の pid から NPROC で wrap しながら走査し、最初の Runnable を run する。
// - 優先度・公平性・affinity は無い。順序は固定の循環順だけ。
// - Runnable が 1 つも無ければ永遠に回り続ける（idle / hlt 状態は無い）。
//   その間も 1 周ごとに中断要求を見るので、オペレータはマシンを止められる。

use super::platform::Platform;
use super::process::ProcessTable;
use super::Kernel;
use crate::types::{Pid, NPROC};

/// `after` の次から 1 周（after 自身を最後に含む）走査して、最初の Runnable を返す。
pub fn next_runnable(procs: &ProcessTable, after: Pid) -> Option<Pid> {
    core::iter::successors(Some(after.next()), |pid| Some(pid.next()))
        .take(NPROC)
        .find(|&pid| procs[pid].is_runnable())
}

impl<P: Platform> Kernel<P> {
    pub fn schedule(&mut self) -> ! {
        let after = self.current.unwrap_or(Pid(0));

        loop {
            if let Some(next) = next_runnable(&self.procs, after) {
                self.run(next);
            }

            // kernel 内は割り込み禁止なので、ここで状態が変わることは無い。
            // 抜け道は中断要求だけ。
            self.poll_abort();
        }
    }
}
