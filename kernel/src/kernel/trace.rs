// kernel/src/kernel/trace.rs
//
// 低コスト trace（観測性）を 1 箇所に集約する。
// - trap_trace feature: dispatcher 入口で "proc N: exception M" を 1 行出す
// - feature off でも関数は常に存在させる（呼び出し側に cfg を撒かない）

use crate::types::Pid;

#[inline(always)]
pub fn trace_exception(pid: Pid, intno: u64) {
    #[cfg(feature = "trap_trace")]
    crate::logging::info_fmt(format_args!("proc {}: exception {}", pid, intno));
    #[cfg(not(feature = "trap_trace"))]
    {
        let _ = pid;
        let _ = intno;
    }
}
