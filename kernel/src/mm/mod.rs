// src/mm/mod.rs
//
// 物理メモリ管理の入り口（ベアメタル専用）。
// - ブートローダから渡された BootInfo::memory_map をもとに、
//   「Usable」な物理フレームを順番に返すだけの最小アロケータ。
// - 返すのはページテーブル用フレームだけ。プロセスには物理ページを配らない。
// - プロセス窓（identity map される物理範囲）のフレームは決して返さない。

use bootloader::bootinfo::{MemoryMap, MemoryRegionType};
use bootloader::BootInfo;
use x86_64::structures::paging::{FrameAllocator, PhysFrame, Size4KiB};
use x86_64::PhysAddr;

use crate::logging;
use crate::mem::addr::PAGE_SIZE;
use crate::mem::layout::{PROC_SIZE, PROC_START_ADDR};
use crate::types::NPROC;

/// identity map でプロセスが直接使う物理範囲 [start, end)
pub const PROCESS_PHYS_RANGE: (u64, u64) = (
    PROC_START_ADDR,
    PROC_START_ADDR + PROC_SIZE * (NPROC as u64 - 1),
);

fn in_process_range(addr: u64) -> bool {
    PROCESS_PHYS_RANGE.0 <= addr && addr < PROCESS_PHYS_RANGE.1
}

/// カーネル側から見える「物理メモリマネージャ」。
/// - 外部 API はすべて safe にする。
/// - 内部で BootInfoFrameAllocator を使ってフレームを順番に返す。
pub struct PhysicalMemoryManager {
    memory_map: &'static MemoryMap,
    next: usize,
}

impl PhysicalMemoryManager {
    /// BootInfo から PhysicalMemoryManager を構築する。
    ///
    /// # 設計上の前提
    /// - カーネル全体で PhysicalMemoryManager は 1 インスタンスのみ保持すること。
    pub fn new(boot_info: &'static BootInfo) -> Self {
        PhysicalMemoryManager {
            memory_map: &boot_info.memory_map,
            next: 0,
        }
    }

    /// memory_map 内の "Usable" な領域から、プロセス範囲を除いた 4KiB フレームを列挙する。
    fn usable_frames(&self) -> impl Iterator<Item = PhysFrame> {
        self.memory_map
            .iter()
            .filter(|r| r.region_type == MemoryRegionType::Usable)
            .map(|r| r.range.start_addr()..r.range.end_addr())
            .flat_map(|r| r.step_by(PAGE_SIZE as usize))
            .filter(|addr| !in_process_range(*addr))
            .map(|addr| PhysFrame::containing_address(PhysAddr::new(addr)))
    }

    /// 次の利用可能な物理フレームを 1 つ確保する。
    /// - self.next の値だけスキップし、同じフレームを二度返さない。
    pub fn allocate_frame(&mut self) -> Option<PhysFrame> {
        let frame = self.usable_frames().nth(self.next)?;
        self.next += 1;
        Some(frame)
    }

    /// プロセス範囲がすべて Usable か（でなければ identity map が他者のメモリを踏む）
    pub fn process_range_is_usable(&self) -> bool {
        let (start, end) = PROCESS_PHYS_RANGE;
        let mut addr = start;
        while addr < end {
            let usable = self.memory_map.iter().any(|r| {
                r.region_type == MemoryRegionType::Usable
                    && r.range.start_addr() <= addr
                    && addr < r.range.end_addr()
            });
            if !usable {
                logging::error("mm: process range overlaps non-usable memory");
                logging::info_u64(" phys", addr);
                return false;
            }
            addr += PAGE_SIZE;
        }
        true
    }
}

unsafe impl FrameAllocator<Size4KiB> for PhysicalMemoryManager {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        PhysicalMemoryManager::allocate_frame(self)
    }
}
