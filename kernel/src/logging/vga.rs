// src/logging/vga.rs
//
// VGA テキストモード(0xb8000)への最小限出力。
// - 最下行に書き、改行で 1 行スクロールする。
// - ERROR 行（プロセスの page fault 診断・fatal）は赤で出す。

use core::fmt::{self, Write};
use spin::Mutex;
use volatile::Volatile;

const ROWS: usize = 25;
const COLS: usize = 80;

const VGA_TEXT_BUFFER: usize = 0xb8000;

#[derive(Clone, Copy)]
#[repr(u8)]
enum Color {
    Black = 0x0,
    LightGray = 0x7,
    LightRed = 0xC,
}

const fn attr(fg: Color, bg: Color) -> u8 {
    (fg as u8) | ((bg as u8) << 4)
}

const NORMAL: u8 = attr(Color::LightGray, Color::Black);
const ALERT: u8 = attr(Color::LightRed, Color::Black);

#[repr(C)]
#[derive(Clone, Copy)]
struct Cell {
    ch: u8,
    attr: u8,
}

#[repr(transparent)]
struct Screen {
    cells: [[Volatile<Cell>; COLS]; ROWS],
}

struct Console {
    col: usize,
    attr: u8,
    screen: &'static mut Screen,
}

impl Console {
    fn put(&mut self, byte: u8) {
        if byte == b'\n' {
            self.scroll();
            return;
        }
        if self.col >= COLS {
            self.scroll();
        }
        let cell = Cell {
            // 非 ASCII は ■ にする
            ch: if byte.is_ascii() && !byte.is_ascii_control() { byte } else { 0xFE },
            attr: self.attr,
        };
        self.screen.cells[ROWS - 1][self.col].write(cell);
        self.col += 1;
    }

    fn scroll(&mut self) {
        for row in 1..ROWS {
            for col in 0..COLS {
                let cell = self.screen.cells[row][col].read();
                self.screen.cells[row - 1][col].write(cell);
            }
        }
        self.blank_row(ROWS - 1);
        self.col = 0;
        self.attr = NORMAL;
    }

    fn blank_row(&mut self, row: usize) {
        let blank = Cell { ch: b' ', attr: NORMAL };
        for col in 0..COLS {
            self.screen.cells[row][col].write(blank);
        }
    }
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(|b| self.put(b));
        Ok(())
    }
}

static CONSOLE: Mutex<Option<Console>> = Mutex::new(None);

pub fn init() {
    let mut console = Console {
        col: 0,
        attr: NORMAL,
        // Safety: bootloader が VGA テキストバッファを identity map している
        screen: unsafe { &mut *(VGA_TEXT_BUFFER as *mut Screen) },
    };
    for row in 0..ROWS {
        console.blank_row(row);
    }
    *CONSOLE.lock() = Some(console);
}

/// 現在の行を赤にする（改行で戻る）
pub fn alert() {
    with_console(|c| c.attr = ALERT);
}

pub fn write_str(s: &str) {
    with_console(|c| {
        let _ = c.write_str(s);
    });
}

// 例外経路から呼ばれても固まらないよう、取れなければ捨てる
fn with_console(f: impl FnOnce(&mut Console)) {
    if let Some(mut guard) = CONSOLE.try_lock() {
        if let Some(console) = guard.as_mut() {
            f(console);
        }
    }
}
