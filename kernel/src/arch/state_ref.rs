// kernel/src/arch/state_ref.rs
//
// 役割:
// - trap 入口（asm stub → trap_entry）から Kernel にアクセスするための “唯一の入口”。
//
// やること:
// - Kernel の raw pointer(アドレス) を登録する。
// - 呼び出し側は with_kernel() 経由でのみ &mut Kernel を得る。
//
// やらないこと:
// - 複雑な同期（単一コア前提・kernel は割り込み禁止で走る）
// - Kernel の所有権移動（所有は main 側の static のまま）

use core::sync::atomic::{AtomicU64, Ordering};

use crate::arch::platform::X86Platform;
use crate::kernel::Kernel;

pub type X86Kernel = Kernel<X86Platform>;

// 0 なら未登録
static KERNEL_ADDR: AtomicU64 = AtomicU64::new(0);

/// Kernel を登録する（boot で start() の直前に 1 回）
pub fn register_kernel(k: &'static mut X86Kernel) -> &'static mut X86Kernel {
    let addr = k as *mut X86Kernel as u64;
    KERNEL_ADDR.store(addr, Ordering::SeqCst);
    k
}

/// Kernel を一時的に借用して処理する（trap 入口はこれだけ使う）
pub fn with_kernel<R>(f: impl FnOnce(&mut X86Kernel) -> R) -> Option<R> {
    let addr = KERNEL_ADDR.load(Ordering::SeqCst);
    if addr == 0 {
        return None;
    }

    let p = addr as *mut X86Kernel;

    // Safety:
    // - 登録される Kernel は static にあり、以後動かない
    // - kernel の制御フローは常に 1 本（start() も exception() も戻らない）
    Some(unsafe { f(&mut *p) })
}
