// kernel/src/logging/mod.rs
//
// 役割:
// - カーネル内の診断出力の唯一の出口。
// - ベアメタルでは VGA テキスト画面と COM1 の両方に同じ行を出す。
// - ホスト（cargo test）ではキャプチャバッファに溜め、テストから検査できるようにする。
//
// 設計方針:
// - 行単位（"[INFO] " / "[ERROR] " prefix + 改行）で出す。
// - 固定文字列 + u64 の API（info_u64）はヒープ不要で例外経路でも安全。
// - fmt 系（info_fmt / error_fmt）は診断メッセージ用。format_args! をそのまま流す。

#[cfg(target_os = "none")]
mod serial;
#[cfg(target_os = "none")]
mod vga;

use core::fmt::{self, Write};

pub fn init() {
    #[cfg(target_os = "none")]
    {
        vga::init();
        serial::init();
    }
}

pub fn info(msg: &str) {
    write_prefixed_line("[INFO] ", msg);
}

pub fn error(msg: &str) {
    backend::alert();
    write_prefixed_line("[ERROR] ", msg);
}

pub fn info_u64(label: &str, value: u64) {
    info_kv(label, value);
}

pub fn info_kv(key: &str, value: u64) {
    let mut buf = [0u8; 21];
    let s = u64_to_decimal(value, &mut buf);

    backend::write_str("[INFO] ");
    if !key.is_empty() {
        backend::write_str(key);
        backend::write_str(" = ");
    }
    backend::write_str(s);
    backend::newline();
}

pub fn info_fmt(args: fmt::Arguments) {
    write_prefixed_args("[INFO] ", args);
}

pub fn error_fmt(args: fmt::Arguments) {
    backend::alert();
    write_prefixed_args("[ERROR] ", args);
}

fn write_prefixed_line(prefix: &str, msg: &str) {
    backend::write_str(prefix);
    backend::write_str(msg);
    backend::newline();
}

fn write_prefixed_args(prefix: &str, args: fmt::Arguments) {
    backend::write_str(prefix);
    let _ = LogWriter.write_fmt(args);
    backend::newline();
}

/// fmt::Write を backend に流すだけの writer
struct LogWriter;

impl fmt::Write for LogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        backend::write_str(s);
        Ok(())
    }
}

fn u64_to_decimal(mut value: u64, buf: &mut [u8; 21]) -> &str {
    if value == 0 {
        let last = buf.len() - 1;
        buf[last] = b'0';
        return unsafe { core::str::from_utf8_unchecked(&buf[last..]) };
    }

    let mut i = buf.len();
    while value > 0 {
        let digit = (value % 10) as u8;
        i -= 1;
        buf[i] = b'0' + digit;
        value /= 10;
    }

    unsafe { core::str::from_utf8_unchecked(&buf[i..]) }
}

// ─────────────────────────────────────────────
// backend（出力先の切替はここだけ）
// ─────────────────────────────────────────────

#[cfg(target_os = "none")]
mod backend {
    pub fn write_str(s: &str) {
        super::vga::write_str(s);
        super::serial::write_str(s);
    }

    pub fn newline() {
        super::vga::write_str("\n");
        super::serial::write_str("\r\n");
    }

    pub fn alert() {
        super::vga::alert();
    }
}

#[cfg(all(not(target_os = "none"), test))]
mod backend {
    use core::cell::RefCell;
    use std::string::String;

    std::thread_local! {
        static CAPTURED: RefCell<String> = RefCell::new(String::new());
    }

    pub fn write_str(s: &str) {
        CAPTURED.with(|c| c.borrow_mut().push_str(s));
    }

    pub fn newline() {
        write_str("\n");
    }

    pub fn alert() {}

    pub fn take() -> String {
        CAPTURED.with(|c| core::mem::take(&mut *c.borrow_mut()))
    }
}

#[cfg(all(not(target_os = "none"), not(test)))]
mod backend {
    pub fn write_str(_s: &str) {}

    pub fn newline() {}

    pub fn alert() {}
}

/// このスレッドで出たログを取り出す（テスト専用）
#[cfg(all(not(target_os = "none"), test))]
pub fn take_captured() -> std::string::String {
    backend::take()
}
