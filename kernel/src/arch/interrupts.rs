// kernel/src/arch/interrupts.rs
//
// 役割:
// - IDT を初期化し、すべての trap を 1 つの entry stub 経由で dispatcher に届ける。
// - 8259 PIC / PIT（timer）を初期化し、キーボードを poll して Ctrl-C を拾う。
//
// entry stub の仕事（asm）:
// - エラーコードの無い例外では 0 を積んで揃える → ベクタ番号を積む
// - 汎用レジスタを Registers の逆順で積む（rax が最下位アドレスになる）
// - rsp（= &Registers）を第 1 引数に trap_entry を call（戻らない）
//
// 設計方針:
// - x86-interrupt ABI は使わない（レジスタを丸ごと Registers にしたいので asm で組む）
// - user から int で叩くベクタ（48..=52）だけ DPL=3 にする
// - 割り込みゲートなので kernel は IF=0 で走る。kernel 内で sti はしない。
// - timer の EOI は dispatcher に入る前に出す（dispatcher は戻らない）

use core::arch::global_asm;

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::port::Port;
use x86_64::structures::idt::InterruptDescriptorTable;
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::arch::{gdt, halt_loop, state_ref};
use crate::kernel::registers::Registers;
use crate::kernel::trap::{
    INT_SYS_FORK, INT_SYS_GETPID, INT_SYS_PAGE_ALLOC, INT_SYS_PANIC, INT_SYS_YIELD, INT_TIMER,
};
use crate::logging;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

const PIT_BASE_HZ: u32 = 1_193_182;

const KEYBOARD_STATUS_PORT: u16 = 0x64;
const KEYBOARD_DATA_PORT: u16 = 0x60;
const CTRL_C: char = '\u{3}';

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

static IDT: Mutex<Option<InterruptDescriptorTable>> = Mutex::new(None);

// ─────────────────────────────────────────────
// entry stubs
// ─────────────────────────────────────────────

global_asm!(
    r#"
.section .text
.global trapkernel_vector_0
trapkernel_vector_0:
    push 0
    push 0
    jmp trapkernel_trap_common

.global trapkernel_vector_3
trapkernel_vector_3:
    push 0
    push 3
    jmp trapkernel_trap_common

.global trapkernel_vector_6
trapkernel_vector_6:
    push 0
    push 6
    jmp trapkernel_trap_common

.global trapkernel_vector_8
trapkernel_vector_8:
    push 8
    jmp trapkernel_trap_common

.global trapkernel_vector_13
trapkernel_vector_13:
    push 13
    jmp trapkernel_trap_common

.global trapkernel_vector_14
trapkernel_vector_14:
    push 14
    jmp trapkernel_trap_common

.global trapkernel_vector_32
trapkernel_vector_32:
    push 0
    push 32
    jmp trapkernel_trap_common

.global trapkernel_vector_48
trapkernel_vector_48:
    push 0
    push 48
    jmp trapkernel_trap_common

.global trapkernel_vector_49
trapkernel_vector_49:
    push 0
    push 49
    jmp trapkernel_trap_common

.global trapkernel_vector_50
trapkernel_vector_50:
    push 0
    push 50
    jmp trapkernel_trap_common

.global trapkernel_vector_51
trapkernel_vector_51:
    push 0
    push 51
    jmp trapkernel_trap_common

.global trapkernel_vector_52
trapkernel_vector_52:
    push 0
    push 52
    jmp trapkernel_trap_common

trapkernel_trap_common:
    push r15
    push r14
    push r13
    push r12
    push r11
    push r10
    push r9
    push r8
    push rdi
    push rsi
    push rbp
    push rbx
    push rdx
    push rcx
    push rax
    mov rdi, rsp
    cld
    call trapkernel_trap_entry
    ud2
"#
);

extern "C" {
    fn trapkernel_vector_0();
    fn trapkernel_vector_3();
    fn trapkernel_vector_6();
    fn trapkernel_vector_8();
    fn trapkernel_vector_13();
    fn trapkernel_vector_14();
    fn trapkernel_vector_32();
    fn trapkernel_vector_48();
    fn trapkernel_vector_49();
    fn trapkernel_vector_50();
    fn trapkernel_vector_51();
    fn trapkernel_vector_52();
}

fn stub_addr(stub: unsafe extern "C" fn()) -> VirtAddr {
    VirtAddr::new(stub as usize as u64)
}

/// stub から呼ばれる Rust 側の入口
#[no_mangle]
extern "C" fn trapkernel_trap_entry(regs: &Registers) -> ! {
    if regs.intno == INT_TIMER {
        end_of_interrupt(INT_TIMER as u8);
    }

    state_ref::with_kernel(|k| k.exception(regs));

    logging::error_fmt(format_args!(
        "trap {} before kernel was registered (rip={:#x})",
        regs.intno, regs.rip
    ));
    halt_loop()
}

// ─────────────────────────────────────────────
// IDT
// ─────────────────────────────────────────────

pub fn init_idt() {
    let mut guard = IDT.lock();
    if guard.is_some() {
        return;
    }

    let mut idt = InterruptDescriptorTable::new();

    // Safety: stub は上の global_asm で定義され、trap_entry まで正しいフレームを組む
    unsafe {
        idt.divide_error.set_handler_addr(stub_addr(trapkernel_vector_0));
        idt.breakpoint.set_handler_addr(stub_addr(trapkernel_vector_3));
        idt.invalid_opcode.set_handler_addr(stub_addr(trapkernel_vector_6));
        idt.double_fault
            .set_handler_addr(stub_addr(trapkernel_vector_8))
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        idt.general_protection_fault
            .set_handler_addr(stub_addr(trapkernel_vector_13));
        idt.page_fault.set_handler_addr(stub_addr(trapkernel_vector_14));

        idt[INT_TIMER as u8].set_handler_addr(stub_addr(trapkernel_vector_32));

        let syscalls: [(u64, unsafe extern "C" fn()); 5] = [
            (INT_SYS_PANIC, trapkernel_vector_48),
            (INT_SYS_GETPID, trapkernel_vector_49),
            (INT_SYS_YIELD, trapkernel_vector_50),
            (INT_SYS_PAGE_ALLOC, trapkernel_vector_51),
            (INT_SYS_FORK, trapkernel_vector_52),
        ];
        for (vector, stub) in syscalls {
            idt[vector as u8]
                .set_handler_addr(stub_addr(stub))
                .set_privilege_level(PrivilegeLevel::Ring3);
        }
    }

    let idt = guard.insert(idt);

    // Safety: IDT は static の中にあり、以後動かない
    let idt: &'static InterruptDescriptorTable =
        unsafe { &*(idt as *const InterruptDescriptorTable) };
    idt.load();

    logging::info("arch::interrupts::init_idt: IDT loaded");
}

// ─────────────────────────────────────────────
// PIC / PIT
// ─────────────────────────────────────────────

pub fn init_pic() {
    let mut pics = PICS.lock();
    // Safety: 単一CPU・IF=0 の boot 中
    unsafe {
        pics.initialize();
        // timer（IRQ0）だけ通す。キーボードは poll する。
        pics.write_masks(0xFE, 0xFF);
    }
    logging::info("arch::interrupts::init_pic: PIC remapped (IRQ0 only)");
}

pub fn init_pit(hz: u32) {
    let divisor = (PIT_BASE_HZ / hz).clamp(1, u16::MAX as u32) as u16;
    // Safety: PIT のポート I/O のみ
    unsafe {
        let mut command = Port::<u8>::new(0x43);
        let mut channel0 = Port::<u8>::new(0x40);

        // channel 0, lobyte/hibyte, mode 3 (square wave), binary
        command.write(0x36);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }
    logging::info_kv("arch::interrupts::init_pit: hz", hz as u64);
}

fn end_of_interrupt(vector: u8) {
    // Safety: vector は PIC に割り当てた範囲
    unsafe { PICS.lock().notify_end_of_interrupt(vector) };
}

// ─────────────────────────────────────────────
// キーボード（poll）
// ─────────────────────────────────────────────

pub struct KeyboardPoller {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
}

impl KeyboardPoller {
    pub fn new() -> Self {
        KeyboardPoller {
            keyboard: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::MapLettersToUnicode,
            ),
        }
    }

    /// 溜まっているスキャンコードを全部読み、Ctrl-C があれば true
    pub fn ctrl_c_pressed(&mut self) -> bool {
        let mut status = Port::<u8>::new(KEYBOARD_STATUS_PORT);
        let mut data = Port::<u8>::new(KEYBOARD_DATA_PORT);
        let mut pressed = false;

        // Safety: PS/2 コントローラのポート I/O のみ
        unsafe {
            while status.read() & 0x01 != 0 {
                let scancode = data.read();
                if let Ok(Some(event)) = self.keyboard.add_byte(scancode) {
                    if let Some(DecodedKey::Unicode(CTRL_C)) = self.keyboard.process_keyevent(event)
                    {
                        pressed = true;
                    }
                }
            }
        }

        pressed
    }
}

impl Default for KeyboardPoller {
    fn default() -> Self {
        Self::new()
    }
}
