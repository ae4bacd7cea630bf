// kernel/src/arch/mod.rs
//
// アーキ依存部（x86_64 ベアメタル）。unsafe をできるだけここに閉じ込める方針。
// - gdt: GDT / TSS（user セグメントと RSP0）
// - interrupts: IDT・entry stub・PIC/PIT・キーボード poll
// - trampoline: Registers から user へ戻る iretq
// - paging: OffsetPageTable による map / CR2 / CR3
// - programs: 組み込みの user プログラム image
// - platform: 以上を束ねた Platform 実装
// - state_ref: trap 入口から Kernel に届くための登録口

pub mod gdt;
pub mod interrupts;
pub mod paging;
pub mod platform;
pub mod programs;
pub mod state_ref;
pub mod trampoline;

use x86_64::instructions::{hlt, interrupts as cpu_interrupts};

/// CPU を停止させるループ（割り込みも止める）
pub fn halt_loop() -> ! {
    cpu_interrupts::disable();
    loop {
        hlt();
    }
}
