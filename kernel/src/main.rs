// kernel/src/main.rs
//
// ベアメタル起動の入口（bootloader 0.9 の entry_point!）
//
// - Kernel は static に置き、trap 入口から届くよう state_ref に登録してから start() する
// - bootloader はコマンドラインを渡さないので、起動シナリオは cargo feature で選ぶ
// - ホスト向けにビルドされた場合は何もしない（コアのテストは lib 側の cargo test）

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod panic;

#[cfg(target_os = "none")]
mod bare {
    use core::mem::MaybeUninit;
    use core::ptr::addr_of_mut;

    use bootloader::{entry_point, BootInfo};

    use trapkernel::arch::platform::X86Platform;
    use trapkernel::arch::state_ref::{self, X86Kernel};
    use trapkernel::Kernel;

    static mut KERNEL: MaybeUninit<X86Kernel> = MaybeUninit::uninit();

    entry_point!(kernel_main);

    fn boot_command() -> Option<&'static str> {
        if cfg!(feature = "boot_fork") {
            Some("fork")
        } else if cfg!(feature = "boot_forkexit") {
            Some("forkexit")
        } else {
            None
        }
    }

    fn kernel_main(boot_info: &'static BootInfo) -> ! {
        let platform = X86Platform::new(boot_info);

        // Safety: ここを通るのは 1 回だけ。以後 KERNEL は state_ref 経由でのみ触る。
        let k: &'static mut X86Kernel = unsafe { (*addr_of_mut!(KERNEL)).write(Kernel::new(platform)) };
        let k = state_ref::register_kernel(k);

        k.start(boot_command())
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("trapkernel boots on x86_64 bare metal only (build with bootimage)");
}
