// kernel/src/arch/programs.rs
//
// 組み込みの user プログラム（平坦な機械語 image）
//
// - 各 image は「ロード先アドレス」に置かれ、先頭がエントリになる。
// - program 0..=3 は pid 1..=4 の窓の先頭に、4 / 5 は pid 1 の窓の先頭に置く。
// - 使えるのは int 48..=52 の trap だけ（libc も data セグメントも無い）。
//
//   0: getpid → yield を繰り返す
//   1: getpid → 何もせず回り続ける（timer でだけ切り替わる）
//   2: 数回 yield した後、自分の窓の未 map ページに書いて page fault
//   3: getpid → yield を繰り返す
//   4: fork（未実装 → Unexpected exception 52）
//   5: メッセージ付きで panic

use crate::mem::addr::VirtAddr;
use crate::mem::layout::{PROC_SIZE, PROC_START_ADDR};
use crate::types::ProgramId;

// int 49; loop: int 50; jmp loop
const YIELD_LOOP: &[u8] = &[0xCD, 0x31, 0xCD, 0x32, 0xEB, 0xFC];

// int 49; jmp $
const SPIN: &[u8] = &[0xCD, 0x31, 0xEB, 0xFE];

// mov ecx, 8
// loop: int 50; dec ecx; jnz loop
// mov byte [0x181000], al   ; pid 3 の窓。コードとスタック以外は未 map
// jmp $
const YIELD_THEN_FAULT: &[u8] = &[
    0xB9, 0x08, 0x00, 0x00, 0x00, // mov ecx, 8
    0xCD, 0x32, // int 50
    0xFF, 0xC9, // dec ecx
    0x75, 0xFA, // jnz -6
    0x88, 0x04, 0x25, 0x00, 0x10, 0x18, 0x00, // mov [0x181000], al
    0xEB, 0xFE, // jmp $
];

// int 52; jmp $
const FORK: &[u8] = &[0xCD, 0x34, 0xEB, 0xFE];

// lea rdi, [rip + 4]; int 48; jmp $; "forkexit: exit is not supported\0"
const PANIC_WITH_MESSAGE: &[u8] = &[
    0x48, 0x8D, 0x3D, 0x04, 0x00, 0x00, 0x00, // lea rdi, [rip+4]
    0xCD, 0x30, // int 48
    0xEB, 0xFE, // jmp $
    b'f', b'o', b'r', b'k', b'e', b'x', b'i', b't', b':', b' ', b'e', b'x', b'i', b't', b' ',
    b'i', b's', b' ', b'n', b'o', b't', b' ', b's', b'u', b'p', b'p', b'o', b'r', b't', b'e',
    b'd', 0x00,
];

pub struct Image {
    pub load_addr: VirtAddr,
    pub bytes: &'static [u8],
}

pub fn image(program: ProgramId) -> Option<Image> {
    let (slot, bytes) = match program.0 {
        0 => (0, YIELD_LOOP),
        1 => (1, SPIN),
        2 => (2, YIELD_THEN_FAULT),
        3 => (3, YIELD_LOOP),
        4 => (0, FORK),
        5 => (0, PANIC_WITH_MESSAGE),
        _ => return None,
    };

    Some(Image {
        load_addr: VirtAddr(PROC_START_ADDR + PROC_SIZE * slot),
        bytes,
    })
}
