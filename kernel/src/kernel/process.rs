// kernel/src/kernel/process.rs
//
// プロセス記述子と固定容量のプロセス表。
//
// [不変条件]
// 1. procs[i].pid == Pid(i)（reset 後ずっと）
// 2. procs[0] は予約。生きたプロセスにはならない（state は常に Free）
// 3. Free → Runnable は setup のみ、Runnable → Broken は dispatcher のみ。
//    Free に戻る遷移は無い（exit / reap が無いので free-list も不要）。

use core::ops::{Index, IndexMut};

use crate::kernel::registers::Registers;
use crate::mem::addr::PhysFrame;
use crate::types::{Pid, NPROC};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcState {
    /// 未使用スロット
    Free,
    /// スケジュール対象
    Runnable,
    /// 終端状態。二度とスケジュールされない
    Broken,
}

#[derive(Clone, Copy, Debug)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcState,

    /// trap のたびに保存し、run のたびに復元するスナップショット
    pub registers: Registers,

    /// このプロセスが走るページテーブルの root。
    /// 既定では全員カーネルのテーブルを共有する（分離は無い）。
    pub page_table: Option<PhysFrame>,
}

impl Process {
    const fn free(pid: Pid) -> Self {
        Process {
            pid,
            state: ProcState::Free,
            registers: Registers::zeroed(),
            page_table: None,
        }
    }

    pub fn is_runnable(&self) -> bool {
        self.state == ProcState::Runnable
    }
}

pub struct ProcessTable {
    procs: [Process; NPROC],
}

impl ProcessTable {
    pub const fn new() -> Self {
        let mut procs = [Process::free(Pid(0)); NPROC];
        let mut i = 0;
        while i < NPROC {
            procs[i].pid = Pid(i);
            i += 1;
        }
        ProcessTable { procs }
    }

    /// 全記述子をゼロにし、pid = index / state = Free に戻す。
    pub fn reset(&mut self) {
        for (i, p) in self.procs.iter_mut().enumerate() {
            *p = Process::free(Pid(i));
        }
    }

    /// 範囲外の pid には None を返す（Index は panic する）
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.procs.iter()
    }

    pub fn count_in(&self, state: ProcState) -> usize {
        self.procs.iter().filter(|p| p.state == state).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Pid> for ProcessTable {
    type Output = Process;

    fn index(&self, pid: Pid) -> &Process {
        &self.procs[pid.0]
    }
}

impl IndexMut<Pid> for ProcessTable {
    fn index_mut(&mut self, pid: Pid) -> &mut Process {
        &mut self.procs[pid.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_assigns_index_as_pid_and_frees_every_slot() {
        let mut table = ProcessTable::new();
        table[Pid(3)].state = ProcState::Broken;
        table[Pid(3)].registers.rax = 99;
        table[Pid(5)].pid = Pid(9);

        table.reset();

        for (i, p) in table.iter().enumerate() {
            assert_eq!(p.pid, Pid(i));
            assert_eq!(p.state, ProcState::Free);
            assert_eq!(p.registers, Registers::zeroed());
            assert!(p.page_table.is_none());
        }
    }

    #[test]
    fn get_rejects_pid_outside_table() {
        let table = ProcessTable::new();
        assert_eq!(table.get(Pid(NPROC - 1)).map(|p| p.pid), Some(Pid(NPROC - 1)));
        assert!(table.get(Pid(NPROC)).is_none());
    }

    #[test]
    fn new_table_matches_reset_table() {
        let table = ProcessTable::new();
        assert_eq!(table.count_in(ProcState::Free), NPROC);
        assert_eq!(table[Pid(NPROC - 1)].pid, Pid(NPROC - 1));
    }
}
