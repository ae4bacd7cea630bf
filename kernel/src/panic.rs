// kernel/src/panic.rs
//
// no_std カーネル用 panic ハンドラ（Rust コードのバグ用。プロセスの panic syscall とは別物）
// - 挙動は「緊急出力（ロック無し） → CPU 停止」に固定する。
// - VGA / logging のロックを握ったまま panic した可能性があるので、それらは使わない。
// - 二重 panic は即停止（再入で #DF になりやすい）

use core::fmt::{self, Write};
use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;

use trapkernel::arch;

static PANIC_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// QEMU debugcon(0xE9) と COM1(0x3F8) へロック無しで書く
struct Emergency;

impl Emergency {
    fn write_byte(b: u8) {
        unsafe {
            Port::<u8>::new(0xE9).write(b);

            let mut lsr = Port::<u8>::new(0x3FD);
            let mut data = Port::<u8>::new(0x3F8);
            for _ in 0..10_000 {
                if (lsr.read() & 0x20) != 0 {
                    break;
                }
            }
            data.write(b);
        }
    }
}

impl Write for Emergency {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            Emergency::write_byte(b);
        }
        Ok(())
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    interrupts::disable();

    let mut out = Emergency;

    if PANIC_IN_PROGRESS.swap(true, Ordering::AcqRel) {
        let _ = out.write_str("[PANIC] re-entered => halt\n");
        arch::halt_loop();
    }

    let _ = writeln!(out, "[PANIC] kernel panic: {}", info.message());
    if let Some(loc) = info.location() {
        let _ = writeln!(out, "[PANIC] at {}:{}:{}", loc.file(), loc.line(), loc.column());
    }

    arch::halt_loop()
}
