// kernel/src/kernel/registers.rs
//
// 役割:
// - trap 時に保存されるレジスタ一式（= プロセス記述子のスナップショット）の型。
//
// 重要:
// - フィールド順は arch 側の entry stub が push する順序と完全に一致させる。
//   （rax が最下位アドレス、ss が最上位アドレス）
// - intno / err は stub が積む。rip 以降はハードウェアが積む iretq フレーム。

use crate::mem::paging::FaultCode;

/// RFLAGS.IF（user に戻ったら割り込み許可）
pub const RFLAGS_IF: u64 = 1 << 9;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,

    /// 割り込みベクタ番号（trap の原因コード）
    pub intno: u64,
    /// エラーコード（#PF など。無い例外では 0）
    pub err: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

// entry stub / exception_return の asm が前提にしているオフセット
const _: () = assert!(core::mem::offset_of!(Registers, intno) == 15 * 8);
const _: () = assert!(core::mem::offset_of!(Registers, rip) == 17 * 8);
const _: () = assert!(core::mem::size_of::<Registers>() == 22 * 8);

impl Registers {
    pub const fn zeroed() -> Self {
        Registers {
            rax: 0,
            rcx: 0,
            rdx: 0,
            rbx: 0,
            rbp: 0,
            rsi: 0,
            rdi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            intno: 0,
            err: 0,
            rip: 0,
            cs: 0,
            rflags: 0,
            rsp: 0,
            ss: 0,
        }
    }

    /// #PF のエラーコードとして解釈する（未知のビットは捨てる）
    pub fn fault_code(&self) -> FaultCode {
        FaultCode::from_bits_truncate(self.err)
    }

    /// syscall の戻り値スロット
    pub fn set_return_value(&mut self, value: u64) {
        self.rax = value;
    }
}
