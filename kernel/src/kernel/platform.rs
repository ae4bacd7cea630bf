// kernel/src/kernel/platform.rs
//
// 役割:
// - trap/process コアが外部（ハードウェア・ページング・ローダ・trampoline）に
//   要求するものを 1 つの trait にまとめる。
//
// やること:
// - コアが呼ぶ操作の型シグネチャと、その失敗型を定義する。
//
// やらないこと:
// - 実装（ベアメタルは arch::platform、テストは kernel::testing）。
//
// 設計方針:
// - 戻らない操作（exception_return / poweroff / halt）は `-> !` で型に出す。
// - ページテーブルは root フレーム（PhysFrame）をハンドルとして渡す。

use core::fmt;

use crate::kernel::fatal::Fatal;
use crate::kernel::registers::Registers;
use crate::mem::addr::{PhysAddr, PhysFrame, VirtAddr};
use crate::mem::paging::PageFlags;
use crate::types::ProgramId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadError {
    UnknownProgram,
    ImageTooLarge,
    Map(MapError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnknownProgram => write!(f, "unknown program"),
            LoadError::ImageTooLarge => write!(f, "image too large"),
            LoadError::Map(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapError {
    Misaligned,
    FrameAllocationFailed,
    ParentEntryHugePage,
    /// 上書きのための unmap が効かなかった
    AlreadyMapped,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Misaligned => write!(f, "misaligned range"),
            MapError::FrameAllocationFailed => write!(f, "frame allocation failed"),
            MapError::ParentEntryHugePage => write!(f, "parent entry is a huge page"),
            MapError::AlreadyMapped => write!(f, "page already mapped"),
        }
    }
}

pub trait Platform {
    /// console / timer / keyboard を初期化する（timer は hz で割り込む）
    fn init_hardware(&mut self, hz: u32);

    /// カーネル自身が使うページテーブルの root
    fn kernel_page_table(&self) -> PhysFrame;

    /// [va, va+len) を [pa, pa+len) に flags でマップする（既存マップは上書き）
    fn map(
        &mut self,
        table: PhysFrame,
        va: VirtAddr,
        pa: PhysAddr,
        len: u64,
        flags: PageFlags,
    ) -> Result<(), MapError>;

    /// program のコード/データを table にロードし、エントリ rip を返す
    fn load_program(&mut self, table: PhysFrame, program: ProgramId) -> Result<VirtAddr, LoadError>;

    /// 物理ページ 1 枚をゼロクリアする
    fn zero_page(&mut self, pa: PhysAddr);

    /// table をアクティブにする（CR3 切替）
    fn set_page_table(&mut self, table: PhysFrame);

    /// user モードで走るためのレジスタ既定値（segment selector / RFLAGS）を入れる
    fn init_user_registers(&self, regs: &mut Registers);

    /// 直近の #PF の faulting address（CR2）
    fn fault_address(&self) -> VirtAddr;

    /// プロセスの NUL 終端文字列を buf にコピーし、長さを返す（読めなければ None）
    fn read_user_str(&self, table: PhysFrame, va: VirtAddr, buf: &mut [u8]) -> Option<usize>;

    /// オペレータからの中断要求（Ctrl-C）が来ているか
    fn check_abort(&mut self) -> bool;

    /// regs を復元して user へ戻る。戻ってくるのは次の trap（dispatcher 経由）だけ。
    fn exception_return(&mut self, regs: &Registers) -> !;

    /// 中断要求でマシンを終了する
    fn poweroff(&mut self) -> !;

    /// 診断を出してマシンを止める
    fn halt(&mut self, reason: &Fatal) -> !;
}
