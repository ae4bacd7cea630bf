// kernel/src/lib.rs
//
// trapkernel: 単一コア教育用カーネルの trap/process コア
//
// - types / mem / kernel はハードウェア非依存（ホストの cargo test で動く）
// - arch / mm は x86_64 ベアメタル専用（target_os = "none"）
// - logging は両方にまたがる（出力先だけ cfg で切替）

#![cfg_attr(not(test), no_std)]

pub mod kernel;
pub mod logging;
pub mod mem;
pub mod types;

#[cfg(target_os = "none")]
pub mod arch;
#[cfg(target_os = "none")]
pub mod mm;

pub use kernel::boot::BootScenario;
pub use kernel::fatal::Fatal;
pub use kernel::platform::Platform;
pub use kernel::registers::Registers;
pub use kernel::Kernel;
pub use types::{Pid, ProgramId, HZ, NPROC};
