// kernel/src/mem/layout.rs
//
// プロセス用の仮想アドレスレイアウト（カーネルと tooling で共有する契約）
//
//  +-----+--------------------+----------------+--------------------+---------/
//  |     | Kernel      Kernel |       :    I/O | Proc 1      Proc 1 | Proc 2
//  |     | Code + Data  Stack |  ...  : Memory | Code + Data  Stack | Code ...
//  +-----+--------------------+----------------+--------------------+---------/
//  0  0x40000              0x80000 0xA0000 0x100000             0x140000
//                                              ^
//                                              | \___ PROC_SIZE ___/
//                                       PROC_START_ADDR
//
// - pid p は [PROC_START_ADDR + PROC_SIZE*(p-1), PROC_START_ADDR + PROC_SIZE*p) を占有する。
// - スタックはウィンドウ末尾から下に伸びる（初期 rsp = ウィンドウ末尾）。
// - pid 0 は存在しないので、ウィンドウも持たない。

use crate::mem::addr::{VirtAddr, PAGE_SIZE};
use crate::types::Pid;

pub const PROC_START_ADDR: u64 = 0x10_0000;
pub const PROC_SIZE: u64 = 0x4_0000;

/// pid の初期スタックポインタ（ウィンドウ末尾）
pub const fn stack_top(pid: Pid) -> VirtAddr {
    VirtAddr(PROC_START_ADDR + PROC_SIZE * pid.0 as u64)
}

/// pid に与える唯一のスタックページの先頭
pub const fn stack_page(pid: Pid) -> VirtAddr {
    VirtAddr(stack_top(pid).0 - PAGE_SIZE)
}

/// pid が占有するウィンドウ [start, end)
pub const fn process_window(pid: Pid) -> (VirtAddr, VirtAddr) {
    let end = stack_top(pid).0;
    (VirtAddr(end - PROC_SIZE), VirtAddr(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NPROC;

    #[test]
    fn windows_do_not_overlap() {
        for a in 1..NPROC {
            for b in (a + 1)..NPROC {
                let (_, end_a) = process_window(Pid(a));
                let (start_b, _) = process_window(Pid(b));
                assert!(end_a <= start_b, "pid {} overlaps pid {}", a, b);
            }
        }
    }

    #[test]
    fn first_window_starts_at_proc_start() {
        assert_eq!(process_window(Pid(1)).0, VirtAddr(PROC_START_ADDR));
        assert_eq!(stack_top(Pid(1)), VirtAddr(0x14_0000));
        assert_eq!(stack_page(Pid(1)), VirtAddr(0x13_f000));
    }
}
