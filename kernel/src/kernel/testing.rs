// kernel/src/kernel/testing.rs
//
// ホスト上のテスト用 Platform
//
// - 副作用（map / load / CR3 切替 / zero）はすべて記録するだけ
// - 戻らない操作（exception_return / poweroff / halt）は Exit を payload に unwind する
// - drive() がそれを捕まえて「kernel がどこへ抜けたか」を返す

use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use super::fatal::Fatal;
use super::platform::{LoadError, MapError, Platform};
use super::registers::{Registers, RFLAGS_IF};
use super::Kernel;
use crate::mem::addr::{PhysAddr, PhysFrame, VirtAddr};
use crate::mem::layout::{PROC_SIZE, PROC_START_ADDR};
use crate::mem::paging::PageFlags;
use crate::types::ProgramId;

pub(crate) const MOCK_KERNEL_TABLE: PhysFrame = PhysFrame::from_index(0x1000);
pub(crate) const MOCK_USER_CS: u64 = 0x23;
pub(crate) const MOCK_USER_SS: u64 = 0x1b;

/// kernel が user / 外界へ抜けた先
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Exit {
    Resumed(Registers),
    PoweredOff,
    Halted(Fatal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MapCall {
    pub table: PhysFrame,
    pub va: VirtAddr,
    pub pa: PhysAddr,
    pub len: u64,
    pub flags: PageFlags,
}

pub(crate) struct MockPlatform {
    pub hz: Option<u32>,
    pub maps: Vec<MapCall>,
    pub loads: Vec<(PhysFrame, ProgramId)>,
    pub zeroed: Vec<PhysAddr>,
    pub activations: Vec<PhysFrame>,
    pub active_table: Option<PhysFrame>,

    /// これ未満の ProgramId だけロードできる
    pub known_programs: usize,
    pub fault_addr: VirtAddr,

    pub abort_now: bool,
    /// N 回目の poll で中断要求を出す
    pub abort_after_polls: Option<usize>,
    pub abort_polls: usize,

    /// read_user_str が返す (アドレス, 文字列)
    pub user_strings: Vec<(VirtAddr, &'static str)>,
    pub fail_map_at: Option<VirtAddr>,
}

impl MockPlatform {
    pub fn new() -> Self {
        MockPlatform {
            hz: None,
            maps: Vec::new(),
            loads: Vec::new(),
            zeroed: Vec::new(),
            activations: Vec::new(),
            active_table: None,
            known_programs: 6,
            fault_addr: VirtAddr(0),
            abort_now: false,
            abort_after_polls: None,
            abort_polls: 0,
            user_strings: Vec::new(),
            fail_map_at: None,
        }
    }

    pub fn maps_at(&self, va: VirtAddr) -> Vec<MapCall> {
        self.maps.iter().copied().filter(|m| m.va == va).collect()
    }
}

/// program 0..3 は各プロセス窓の先頭、4 以降は pid 1 の窓に置かれる
pub(crate) fn mock_entry(program: ProgramId) -> VirtAddr {
    let slot = if program.0 < 4 { program.0 as u64 } else { 0 };
    VirtAddr(PROC_START_ADDR + PROC_SIZE * slot)
}

impl Platform for MockPlatform {
    fn init_hardware(&mut self, hz: u32) {
        self.hz = Some(hz);
    }

    fn kernel_page_table(&self) -> PhysFrame {
        MOCK_KERNEL_TABLE
    }

    fn map(
        &mut self,
        table: PhysFrame,
        va: VirtAddr,
        pa: PhysAddr,
        len: u64,
        flags: PageFlags,
    ) -> Result<(), MapError> {
        if !va.is_page_aligned() || !pa.is_page_aligned() {
            return Err(MapError::Misaligned);
        }
        if self.fail_map_at == Some(va) {
            return Err(MapError::FrameAllocationFailed);
        }
        self.maps.push(MapCall {
            table,
            va,
            pa,
            len,
            flags,
        });
        Ok(())
    }

    fn load_program(&mut self, table: PhysFrame, program: ProgramId) -> Result<VirtAddr, LoadError> {
        if program.0 >= self.known_programs {
            return Err(LoadError::UnknownProgram);
        }
        self.loads.push((table, program));
        Ok(mock_entry(program))
    }

    fn zero_page(&mut self, pa: PhysAddr) {
        self.zeroed.push(pa);
    }

    fn set_page_table(&mut self, table: PhysFrame) {
        self.activations.push(table);
        self.active_table = Some(table);
    }

    fn init_user_registers(&self, regs: &mut Registers) {
        regs.cs = MOCK_USER_CS;
        regs.ss = MOCK_USER_SS;
        regs.rflags = RFLAGS_IF;
    }

    fn fault_address(&self) -> VirtAddr {
        self.fault_addr
    }

    fn read_user_str(&self, _table: PhysFrame, va: VirtAddr, buf: &mut [u8]) -> Option<usize> {
        let (_, s) = self.user_strings.iter().find(|(at, _)| *at == va)?;
        let len = s.len().min(buf.len());
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Some(len)
    }

    fn check_abort(&mut self) -> bool {
        self.abort_polls += 1;
        self.abort_now || self.abort_after_polls.is_some_and(|n| self.abort_polls >= n)
    }

    fn exception_return(&mut self, regs: &Registers) -> ! {
        panic::panic_any(Exit::Resumed(*regs))
    }

    fn poweroff(&mut self) -> ! {
        panic::panic_any(Exit::PoweredOff)
    }

    fn halt(&mut self, reason: &Fatal) -> ! {
        panic::panic_any(Exit::Halted(*reason))
    }
}

static QUIET_HOOK: Once = Once::new();

/// Exit の unwind では panic メッセージを出さない（本物の panic はそのまま）
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let default = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<Exit>().is_none() {
                default(info);
            }
        }));
    });
}

/// kernel の `-> !` な入口を 1 回走らせ、抜けた先を返す
pub(crate) fn drive<F: FnOnce()>(f: F) -> Exit {
    install_quiet_hook();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("kernel entry returned"),
        Err(payload) => match payload.downcast::<Exit>() {
            Ok(exit) => *exit,
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// boot 済み（最初のプロセスへ resume した直後）のカーネル
pub(crate) fn booted(command: Option<&str>) -> Kernel<MockPlatform> {
    let mut k = Kernel::new(MockPlatform::new());
    let exit = drive(|| k.start(command));
    assert!(matches!(exit, Exit::Resumed(_)), "boot ended in {:?}", exit);
    k
}

/// current が intno で trap したときに entry stub が渡すレジスタ
pub(crate) fn trap_regs(k: &Kernel<MockPlatform>, intno: u64) -> Registers {
    let mut regs = k.current().map(|p| p.registers).unwrap_or_default();
    regs.intno = intno;
    regs.err = 0;
    regs
}
