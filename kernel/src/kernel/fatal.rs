// kernel/src/kernel/fatal.rs
//
// 役割:
// - 「マシン全体を止める」理由の型。fatal はこの enum だけで表す。
//
// 設計方針:
// - 呼び出し元に回復させるエラーではない（受け取った Platform::halt は戻らない）。
// - Display が console に出す診断文になる。
// - NotImplemented は他の fatal と区別できる独立 variant にしておく
//   （page-alloc syscall を実装するときはその分岐だけ差し替える）。

use core::fmt;

use crate::kernel::platform::{LoadError, MapError};
use crate::kernel::process::ProcState;
use crate::mem::addr::VirtAddr;
use crate::mem::paging::FaultCode;
use crate::types::{Pid, ProgramId};

/// プロセスが panic syscall で渡すメッセージの最大長
pub const PANIC_MESSAGE_CAP: usize = 160;

/// ヒープ無しで持ち回れる固定長メッセージ
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PanicMessage {
    buf: [u8; PANIC_MESSAGE_CAP],
    len: usize,
}

impl PanicMessage {
    /// 長すぎる分は切り捨てる。UTF-8 として壊れている場合は有効な先頭部分だけ残す。
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let take = bytes.len().min(PANIC_MESSAGE_CAP);
        let valid = match core::str::from_utf8(&bytes[..take]) {
            Ok(s) => s.len(),
            Err(e) => e.valid_up_to(),
        };

        let mut buf = [0u8; PANIC_MESSAGE_CAP];
        buf[..valid].copy_from_slice(&bytes[..valid]);
        PanicMessage { buf, len: valid }
    }

    pub fn as_str(&self) -> &str {
        // from_bytes で UTF-8 境界に揃えてあるので失敗しない
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupError {
    InvalidPid,
    Load(LoadError),
    Map(MapError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::InvalidPid => write!(f, "pid out of range"),
            SetupError::Load(e) => write!(f, "program_load: {}", e),
            SetupError::Map(e) => write!(f, "stack map: {}", e),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fatal {
    ProcessPanic {
        pid: Pid,
        message: Option<PanicMessage>,
    },
    NotImplemented {
        what: &'static str,
    },
    KernelPageFault {
        addr: VirtAddr,
        code: FaultCode,
        rip: u64,
    },
    UnexpectedTrap {
        intno: u64,
    },
    SetupFailed {
        pid: Pid,
        program: ProgramId,
        cause: SetupError,
    },
    BootMapFailed {
        cause: MapError,
    },
    NotRunnable {
        pid: Pid,
        state: ProcState,
    },
    NoPageTable {
        pid: Pid,
    },
    NoCurrentProcess {
        intno: u64,
    },
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::ProcessPanic { pid, message: Some(m) } => {
                write!(f, "process {} panicked: {}", pid, m.as_str())
            }
            Fatal::ProcessPanic { pid, message: None } => write!(f, "process {} panicked", pid),
            Fatal::NotImplemented { what } => write!(f, "{} not implemented", what),
            Fatal::KernelPageFault { addr, code, rip } => write!(
                f,
                "Kernel page fault for {} ({} {}, rip={:#x})!",
                addr,
                code.operation(),
                code.problem(),
                rip
            ),
            Fatal::UnexpectedTrap { intno } => write!(f, "Unexpected exception {}!", intno),
            Fatal::SetupFailed { pid, program, cause } => {
                write!(f, "process_setup({}, {}) failed: {}", pid, program, cause)
            }
            Fatal::BootMapFailed { cause } => write!(f, "boot mapping failed: {}", cause),
            Fatal::NotRunnable { pid, state } => {
                write!(f, "run({}): process is {:?}, not Runnable", pid, state)
            }
            Fatal::NoPageTable { pid } => write!(f, "run({}): process has no page table", pid),
            Fatal::NoCurrentProcess { intno } => {
                write!(f, "exception {} with no current process", intno)
            }
        }
    }
}
