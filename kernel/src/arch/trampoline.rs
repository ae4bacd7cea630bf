// kernel/src/arch/trampoline.rs
//
// 役割:
// - 保存済み Registers から user へ戻る唯一の glue（iretq）。
//
// 前提:
// - Registers のレイアウトは entry stub が積んだフレームと同一
//   （rax..r15, intno, err, rip, cs, rflags, rsp, ss）。
// - rsp を Registers そのものに向け、pop で復元 → intno/err を捨てて iretq。
// - CR3 は呼び出し側（run）で切替済み。

use crate::kernel::registers::Registers;

/// regs を復元して user へ戻る（戻らない）
///
/// # Safety
/// - regs は iretq 完了まで有効な場所（プロセス記述子）にあること
/// - cs/ss は GDT 上の user selector、rip/rsp は現在の page table で user から見えること
pub unsafe fn exception_return(regs: *const Registers) -> ! {
    core::arch::asm!(
        "mov rsp, {regs}",
        "pop rax",
        "pop rcx",
        "pop rdx",
        "pop rbx",
        "pop rbp",
        "pop rsi",
        "pop rdi",
        "pop r8",
        "pop r9",
        "pop r10",
        "pop r11",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        // intno / err
        "add rsp, 16",
        "iretq",
        regs = in(reg) regs,
        options(noreturn)
    );
}
