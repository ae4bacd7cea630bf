// kernel/src/arch/gdt.rs
//
// 役割:
// - GDT と TSS を初期化してロードする
// - user → kernel の trap で切り替わる RSP0 スタックを用意する
//
// やること:
// - kernel code/data、user data/code、TSS の各 descriptor を登録
// - #DF を IST で受けられるように TSS.ist を設定
// - user 用 selector（RPL=3）を Registers の初期値として公開する
//
// やらないこと:
// - syscall/sysret 用の MSR 設定（trap は int 命令だけ）
// - per-cpu 構造（単一CPU前提）
//
// 設計方針:
// - GDT/TSS は “ロード後に動かない” 静的領域へ固定配置
// - trap は必ず RSP0 の先頭から始まる（kernel は割り込まれたスタックに戻らない）
// - IST index は x86_64 crate の set_stack_index と同じ 0-based を使う

use core::mem::MaybeUninit;
use core::ptr::{addr_of, addr_of_mut};
use core::sync::atomic::{AtomicBool, Ordering};

use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
use x86_64::instructions::tables::load_tss;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::logging;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0; // IST1

const RSP0_STACK_SIZE: usize = 4096 * 8;
const IST_STACK_SIZE: usize = 4096 * 4;

static INIT_DONE: AtomicBool = AtomicBool::new(false);

static mut GDT: MaybeUninit<GlobalDescriptorTable> = MaybeUninit::uninit();
static mut TSS: MaybeUninit<TaskStateSegment> = MaybeUninit::uninit();
static mut SELECTORS: MaybeUninit<Selectors> = MaybeUninit::uninit();

#[derive(Clone, Copy)]
pub struct Selectors {
    pub kernel_code: SegmentSelector,
    pub kernel_data: SegmentSelector,
    pub user_code: SegmentSelector,
    pub user_data: SegmentSelector,
    tss: SegmentSelector,
}

/// `#[repr(align(N))]` は static ではなく “型” に付ける必要があるため、
/// アライン済みのスタック領域はラッパ型で表現する。
#[repr(align(16))]
struct AlignedStack<const N: usize> {
    buf: [u8; N],
}

static mut RSP0_STACK: AlignedStack<RSP0_STACK_SIZE> = AlignedStack {
    buf: [0; RSP0_STACK_SIZE],
};
static mut DF_IST_STACK: AlignedStack<IST_STACK_SIZE> = AlignedStack {
    buf: [0; IST_STACK_SIZE],
};

/// スタックは上位へ向かって伸びるので、top = base + size
fn stack_top<const N: usize>(stack: *const AlignedStack<N>) -> VirtAddr {
    VirtAddr::from_ptr(stack) + N as u64
}

pub fn init() {
    if INIT_DONE.load(Ordering::SeqCst) {
        return;
    }

    // Safety: 単一CPU・割り込み禁止の boot 中に 1 回だけ書く。以後は読み取りのみ。
    unsafe {
        let mut tss = TaskStateSegment::new();
        tss.privilege_stack_table[0] = stack_top(addr_of!(RSP0_STACK));
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
            stack_top(addr_of!(DF_IST_STACK));
        let tss: &'static TaskStateSegment = (*addr_of_mut!(TSS)).write(tss);

        let mut gdt = GlobalDescriptorTable::new();
        let kernel_code = gdt.append(Descriptor::kernel_code_segment());
        let kernel_data = gdt.append(Descriptor::kernel_data_segment());
        // sysret 互換の並び（user data → user code）
        let user_data = gdt.append(Descriptor::user_data_segment());
        let user_code = gdt.append(Descriptor::user_code_segment());
        let tss_sel = gdt.append(Descriptor::tss_segment(tss));

        let gdt: &'static GlobalDescriptorTable = (*addr_of_mut!(GDT)).write(gdt);
        gdt.load();

        let sel = (*addr_of_mut!(SELECTORS)).write(Selectors {
            kernel_code,
            kernel_data,
            user_code,
            user_data,
            tss: tss_sel,
        });

        CS::set_reg(sel.kernel_code);
        DS::set_reg(sel.kernel_data);
        ES::set_reg(sel.kernel_data);
        SS::set_reg(sel.kernel_data);
        load_tss(sel.tss);

        logging::info("arch::gdt::init: GDT/TSS loaded");
        logging::info_u64("user_cs", sel.user_code.0 as u64);
        logging::info_u64("user_ss", sel.user_data.0 as u64);
    }

    INIT_DONE.store(true, Ordering::SeqCst);
}

/// init() 前は None
pub fn selectors() -> Option<Selectors> {
    if !INIT_DONE.load(Ordering::SeqCst) {
        return None;
    }
    // Safety: INIT_DONE が立つ前に書き込み済み
    Some(unsafe { (*addr_of!(SELECTORS)).assume_init() })
}
