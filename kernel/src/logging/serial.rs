// kernel/src/logging/serial.rs
//
// COM1 (0x3F8) への最小限のシリアル出力。
// - init(): 115200bps, 8N1 に初期化
// - write_str(): 文字列を送信（改行の変換は呼び出し側）

use core::sync::atomic::{AtomicBool, Ordering};
use x86_64::instructions::port::Port;

const COM1: u16 = 0x3F8;

static SERIAL_INITIALIZED: AtomicBool = AtomicBool::new(false);

pub fn init() {
    if SERIAL_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    unsafe {
        let mut port_int_en = Port::<u8>::new(COM1 + 1);
        let mut port_line_ctrl = Port::<u8>::new(COM1 + 3);
        let mut port_div_low = Port::<u8>::new(COM1);
        let mut port_div_high = Port::<u8>::new(COM1 + 1);
        let mut port_fifo_ctrl = Port::<u8>::new(COM1 + 2);
        let mut port_modem_ctrl = Port::<u8>::new(COM1 + 4);

        port_int_en.write(0x00);

        port_line_ctrl.write(0x80);
        port_div_low.write(0x01);
        port_div_high.write(0x00);

        port_line_ctrl.write(0x03);
        port_fifo_ctrl.write(0xC7);
        port_modem_ctrl.write(0x0B);
    }
}

fn write_byte(byte: u8) {
    unsafe {
        let mut line_status = Port::<u8>::new(COM1 + 5);
        let mut data = Port::<u8>::new(COM1);

        while (line_status.read() & 0x20) == 0 {}

        data.write(byte);
    }
}

pub fn write_str(s: &str) {
    for b in s.bytes() {
        write_byte(b);
    }
}
