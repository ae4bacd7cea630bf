// kernel/src/arch/platform.rs
//
// 役割:
// - x86_64 ベアメタル上の Platform 実装。arch の部品を束ねるだけ。
//
// やること:
// - init_hardware: logging → GDT/TSS → IDT → PIC → PIT
// - map / load / zero: 物理窓経由でページテーブルと物理メモリを触る
// - exception_return: trampoline（iretq）
// - poweroff: QEMU isa-debug-exit
//
// やらないこと:
// - プロセスごとのページテーブル作成（全プロセスがカーネルのテーブルを共有する）

use bootloader::BootInfo;
use x86_64::instructions::port::Port;

use crate::arch::interrupts::{self, KeyboardPoller};
use crate::arch::paging::{self, PhysWindow};
use crate::arch::{gdt, halt_loop, programs, trampoline};
use crate::kernel::fatal::Fatal;
use crate::kernel::platform::{LoadError, MapError, Platform};
use crate::kernel::registers::{Registers, RFLAGS_IF};
use crate::logging;
use crate::mem::addr::{PhysAddr, PhysFrame, VirtAddr, PAGE_SIZE};
use crate::mem::layout::PROC_SIZE;
use crate::mem::paging::PageFlags;
use crate::mm::PhysicalMemoryManager;
use crate::types::ProgramId;

/// QEMU の isa-debug-exit（iobase=0xf4）
const QEMU_EXIT_PORT: u16 = 0xf4;
const QEMU_EXIT_SUCCESS: u32 = 0x10;

pub struct X86Platform {
    phys: PhysWindow,
    frames: PhysicalMemoryManager,
    kernel_root: PhysFrame,
    keyboard: KeyboardPoller,
}

impl X86Platform {
    pub fn new(boot_info: &'static BootInfo) -> Self {
        X86Platform {
            phys: PhysWindow::new(boot_info.physical_memory_offset),
            frames: PhysicalMemoryManager::new(boot_info),
            kernel_root: paging::active_root(),
            keyboard: KeyboardPoller::new(),
        }
    }
}

impl Platform for X86Platform {
    fn init_hardware(&mut self, hz: u32) {
        logging::init();
        gdt::init();
        interrupts::init_idt();
        interrupts::init_pic();
        interrupts::init_pit(hz);

        if !self.frames.process_range_is_usable() {
            logging::error("arch: identity-mapped process memory may collide with boot data");
        }
    }

    fn kernel_page_table(&self) -> PhysFrame {
        self.kernel_root
    }

    fn map(
        &mut self,
        table: PhysFrame,
        va: VirtAddr,
        pa: PhysAddr,
        len: u64,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        self.phys.map(table, va, pa, len, flags, &mut self.frames)
    }

    fn load_program(&mut self, table: PhysFrame, program: ProgramId) -> Result<VirtAddr, LoadError> {
        let image = programs::image(program).ok_or(LoadError::UnknownProgram)?;

        let len = image.bytes.len() as u64;
        // 窓の最後のページはスタック
        if len > PROC_SIZE - PAGE_SIZE {
            return Err(LoadError::ImageTooLarge);
        }

        let base = image.load_addr;
        let mapped = len.div_ceil(PAGE_SIZE) * PAGE_SIZE;

        let mut off = 0;
        while off < mapped {
            self.phys.zero_page(PhysAddr(base.as_u64() + off));
            off += PAGE_SIZE;
        }
        self.phys
            .map(table, base, base.identity(), mapped, PageFlags::USER_RW, &mut self.frames)
            .map_err(LoadError::Map)?;
        self.phys.write_bytes(base.identity(), image.bytes);

        Ok(base)
    }

    fn zero_page(&mut self, pa: PhysAddr) {
        self.phys.zero_page(pa);
    }

    fn set_page_table(&mut self, table: PhysFrame) {
        paging::switch_to(table);
    }

    fn init_user_registers(&self, regs: &mut Registers) {
        if let Some(sel) = gdt::selectors() {
            regs.cs = sel.user_code.0 as u64;
            regs.ss = sel.user_data.0 as u64;
        }
        regs.rflags = RFLAGS_IF;
    }

    fn fault_address(&self) -> VirtAddr {
        paging::fault_address()
    }

    fn read_user_str(&self, table: PhysFrame, va: VirtAddr, buf: &mut [u8]) -> Option<usize> {
        for (i, slot) in buf.iter_mut().enumerate() {
            let pa = self.phys.translate(table, VirtAddr(va.as_u64() + i as u64))?;
            let b = self.phys.read_byte(pa);
            if b == 0 {
                return Some(i);
            }
            *slot = b;
        }
        Some(buf.len())
    }

    fn check_abort(&mut self) -> bool {
        self.keyboard.ctrl_c_pressed()
    }

    fn exception_return(&mut self, regs: &Registers) -> ! {
        // Safety: regs はプロセス記述子（static な Kernel の中）を指す
        unsafe { trampoline::exception_return(regs) }
    }

    fn poweroff(&mut self) -> ! {
        logging::info("poweroff");
        // Safety: QEMU 以外では何も起きないポート
        unsafe { Port::<u32>::new(QEMU_EXIT_PORT).write(QEMU_EXIT_SUCCESS) };
        halt_loop()
    }

    fn halt(&mut self, _reason: &Fatal) -> ! {
        // 診断本文は kernel 側で出力済み
        logging::error("machine halted");
        halt_loop()
    }
}
