// kernel/src/kernel/trap.rs
//
// trap 原因コード（割り込みベクタ番号）の ABI と、その型付き表現。
//
// 設計方針:
// - dispatcher は整数ではなく Trap を exhaustive に match する。
// - 知らないベクタは Unexpected(intno) として残し、fatal 側で番号を出す。
// - fork は番号だけ予約されている（ハンドラは無い = Unexpected）。

pub const INT_PAGEFAULT: u64 = 14;
pub const INT_TIMER: u64 = 32;

pub const INT_SYS_PANIC: u64 = 48;
pub const INT_SYS_GETPID: u64 = 49;
pub const INT_SYS_YIELD: u64 = 50;
pub const INT_SYS_PAGE_ALLOC: u64 = 51;
pub const INT_SYS_FORK: u64 = 52;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trap {
    /// プロセスからの明示的な panic 要求（rdi = メッセージ or 0）
    Panic,
    GetPid,
    Yield,
    /// ページ確保 syscall（未実装）
    PageAlloc,
    Timer,
    PageFault,
    Unexpected(u64),
}

impl Trap {
    pub const fn from_intno(intno: u64) -> Trap {
        match intno {
            INT_SYS_PANIC => Trap::Panic,
            INT_SYS_GETPID => Trap::GetPid,
            INT_SYS_YIELD => Trap::Yield,
            INT_SYS_PAGE_ALLOC => Trap::PageAlloc,
            INT_TIMER => Trap::Timer,
            INT_PAGEFAULT => Trap::PageFault,
            other => Trap::Unexpected(other),
        }
    }

    pub const fn intno(self) -> u64 {
        match self {
            Trap::Panic => INT_SYS_PANIC,
            Trap::GetPid => INT_SYS_GETPID,
            Trap::Yield => INT_SYS_YIELD,
            Trap::PageAlloc => INT_SYS_PAGE_ALLOC,
            Trap::Timer => INT_TIMER,
            Trap::PageFault => INT_PAGEFAULT,
            Trap::Unexpected(n) => n,
        }
    }
}
