// kernel/src/arch/paging.rs
//
// 役割:
// - x86_64 のページテーブル操作（unsafe）をここに集約する。
//
// やること:
// - 任意の root フレームに対する OffsetPageTable を作り、map / translate する
// - CR3 切替、CR2 読み出し
// - 「物理アドレス → 仮想アドレス」変換を phys_to_virt() に集約する
//
// 設計方針:
// - 物理メモリは bootloader が physical_memory_offset に全域 map 済み
//   （map_physical_memory feature）。すべての物理アクセスはこの窓を通す。
// - map は既存マップを上書きする（unmap → map_to）。
// - user ページを置く場合に備えて、途中の親エントリには USER を足しておく。

use x86_64::registers::control::{Cr2, Cr3};
use x86_64::structures::paging::mapper::{MapToError, Translate};
use x86_64::structures::paging::{
    Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysFrame, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

use crate::kernel::platform::MapError;
use crate::logging;
use crate::mem::addr::{self, PAGE_SIZE};
use crate::mem::paging::PageFlags;
use crate::mm::PhysicalMemoryManager;

/// 物理メモリ窓
#[derive(Clone, Copy)]
pub struct PhysWindow {
    offset: u64,
}

impl PhysWindow {
    pub const fn new(offset: u64) -> Self {
        PhysWindow { offset }
    }

    /// 物理アドレス → 仮想アドレスへの変換関数（すべての物理アクセスはここを経由）
    pub fn phys_to_virt(self, phys: addr::PhysAddr) -> VirtAddr {
        VirtAddr::new(self.offset + phys.as_u64())
    }

    /// root フレームのテーブルを操作する mapper
    ///
    /// # Safety
    /// - root は有効な L4 テーブルであること
    /// - 返した mapper の生存中に同じテーブルへの別 mapper を作らないこと
    unsafe fn mapper(self, root: addr::PhysFrame) -> OffsetPageTable<'static> {
        let virt = self.phys_to_virt(root.start_address());
        let l4: &'static mut PageTable = &mut *virt.as_mut_ptr::<PageTable>();
        OffsetPageTable::new(l4, VirtAddr::new(self.offset))
    }

    /// [va, va+len) を [pa, pa+len) に map する（既存は上書き）
    pub fn map(
        self,
        root: addr::PhysFrame,
        va: addr::VirtAddr,
        pa: addr::PhysAddr,
        len: u64,
        flags: PageFlags,
        frames: &mut PhysicalMemoryManager,
    ) -> Result<(), MapError> {
        if !va.is_page_aligned() || !pa.is_page_aligned() {
            return Err(MapError::Misaligned);
        }

        let x86_flags = to_x86_flags(flags);
        let parent_flags = PageTableFlags::PRESENT
            | PageTableFlags::WRITABLE
            | (x86_flags & PageTableFlags::USER_ACCESSIBLE);

        // Safety: root はカーネル管理のテーブル。mapper はこの関数内だけで使う。
        let mut mapper = unsafe { self.mapper(root) };

        let mut off = 0;
        while off < len {
            let page: Page<Size4KiB> = Page::containing_address(VirtAddr::new(va.as_u64() + off));
            let frame: PhysFrame<Size4KiB> =
                PhysFrame::containing_address(PhysAddr::new(pa.as_u64() + off));

            if let Ok((_old, flush)) = mapper.unmap(page) {
                flush.flush();
            }

            // Safety: frame は identity 契約で呼び出し側が選んだもの
            let result = unsafe {
                mapper.map_to_with_table_flags(page, frame, x86_flags, parent_flags, frames)
            };
            match result {
                Ok(flush) => flush.flush(),
                Err(err) => {
                    log_map_to_error(err);
                    return Err(map_error(err));
                }
            }

            off += PAGE_SIZE;
        }

        Ok(())
    }

    /// root で va を引いて物理アドレスを得る
    pub fn translate(self, root: addr::PhysFrame, va: addr::VirtAddr) -> Option<addr::PhysAddr> {
        // Safety: 読み取りのみ
        let mapper = unsafe { self.mapper(root) };
        mapper
            .translate_addr(VirtAddr::new(va.as_u64()))
            .map(|pa| addr::PhysAddr(pa.as_u64()))
    }

    /// 物理ページ 1 枚をゼロクリアする
    pub fn zero_page(self, pa: addr::PhysAddr) {
        let dst = self.phys_to_virt(pa).as_mut_ptr::<u8>();
        // Safety: 物理窓はすべての物理メモリを覆う
        unsafe { core::ptr::write_bytes(dst, 0, PAGE_SIZE as usize) };
    }

    pub fn write_bytes(self, pa: addr::PhysAddr, bytes: &[u8]) {
        let dst = self.phys_to_virt(pa).as_mut_ptr::<u8>();
        // Safety: 物理窓経由。呼び出し側が範囲を map 済み
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
    }

    pub fn read_byte(self, pa: addr::PhysAddr) -> u8 {
        // Safety: 物理窓経由の読み取り
        unsafe { core::ptr::read_volatile(self.phys_to_virt(pa).as_ptr::<u8>()) }
    }
}

/// 抽象 PageFlags → x86_64 の PageTableFlags への変換。
fn to_x86_flags(flags: PageFlags) -> PageTableFlags {
    let mut res = PageTableFlags::empty();

    if flags.contains(PageFlags::PRESENT) {
        res |= PageTableFlags::PRESENT;
    }
    if flags.contains(PageFlags::WRITABLE) {
        res |= PageTableFlags::WRITABLE;
    }
    if flags.contains(PageFlags::USER) {
        res |= PageTableFlags::USER_ACCESSIBLE;
    }
    if flags.contains(PageFlags::NO_EXEC) {
        res |= PageTableFlags::NO_EXECUTE;
    }

    res
}

fn map_error(err: MapToError<Size4KiB>) -> MapError {
    match err {
        MapToError::FrameAllocationFailed => MapError::FrameAllocationFailed,
        MapToError::ParentEntryHugePage => MapError::ParentEntryHugePage,
        MapToError::PageAlreadyMapped(_) => MapError::AlreadyMapped,
    }
}

/// map_to のエラー内容をログに出すヘルパ。
fn log_map_to_error(err: MapToError<Size4KiB>) {
    match err {
        MapToError::FrameAllocationFailed => {
            logging::error("  MapToError::FrameAllocationFailed");
        }
        MapToError::ParentEntryHugePage => {
            logging::error("  MapToError::ParentEntryHugePage");
        }
        MapToError::PageAlreadyMapped(old_frame) => {
            logging::error("  MapToError::PageAlreadyMapped");
            logging::info_u64("   already_mapped_phys_addr", old_frame.start_address().as_u64());
        }
    }
}

/// 現在アクティブな L4 テーブルの root
pub fn active_root() -> addr::PhysFrame {
    let (frame, _) = Cr3::read();
    addr::PhysAddr(frame.start_address().as_u64()).frame()
}

/// CR3 切替（同じ root なら何もしない = TLB を無駄に捨てない）
pub fn switch_to(root: addr::PhysFrame) {
    let (current, flags) = Cr3::read();
    if current.start_address().as_u64() == root.start_address().as_u64() {
        return;
    }
    let frame = PhysFrame::containing_address(PhysAddr::new(root.start_address().as_u64()));
    // Safety: root はカーネルの全領域を含むテーブル
    unsafe { Cr3::write(frame, flags) };
}

/// 直近の #PF の faulting address
pub fn fault_address() -> addr::VirtAddr {
    addr::VirtAddr(Cr2::read_raw())
}
