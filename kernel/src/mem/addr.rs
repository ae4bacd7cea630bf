// src/mem/addr.rs
//
// 役割:
// - 物理アドレス / 仮想アドレス / フレームなど、メモリ関連の基本型を定義する。
// やること:
// - u64 の生アドレス値に対して、物理と仮想を型で区別できるようにする。
// やらないこと:
// - CPU の CR3 や PTE などを直接触る処理は書かない（それは arch 側で行う）。

use core::fmt;

/// ページサイズ（4KiB 固定）
pub const PAGE_SIZE: u64 = 4096;

/// 物理アドレス（バイト単位）
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysAddr(pub u64);

/// 仮想アドレス（バイト単位）
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtAddr(pub u64);

/// 物理フレーム（4KiB ごとの番号）
///
/// ページテーブルの root もこの型で持つ（root = L4 テーブルが入っているフレーム）。
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysFrame {
    pub number: u64, // frame index = phys_addr / PAGE_SIZE
}

impl PhysAddr {
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    /// このアドレスが含まれる物理フレームを返す。
    pub const fn frame(self) -> PhysFrame {
        PhysFrame {
            number: self.0 / PAGE_SIZE,
        }
    }
}

impl VirtAddr {
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE == 0
    }

    /// identity map 前提で、同じ値の物理アドレスとして扱う。
    /// （プロセスのスタックページは va == pa でマップする）
    pub const fn identity(self) -> PhysAddr {
        PhysAddr(self.0)
    }
}

impl PhysFrame {
    /// フレーム先頭の物理アドレスを返す。
    pub const fn start_address(self) -> PhysAddr {
        PhysAddr(self.number * PAGE_SIZE)
    }

    /// インデックスから直接フレームを作る（テスト用途など）。
    pub const fn from_index(number: u64) -> Self {
        PhysFrame { number }
    }
}

// --- Debug / Display（ログで見やすくするため） ---

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame({:#x})", self.start_address().0)
    }
}
