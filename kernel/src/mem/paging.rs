// kernel/src/mem/paging.rs
//
// ページ属性と #PF エラーコードの抽象表現。
// - arch 側はこれを x86_64 の PageTableFlags / PageFaultErrorCode へ変換する。
// - kernel 側（dispatcher / setup）はこちらだけを見る。

bitflags::bitflags! {
    /// ページ属性（最低限）
    ///
    /// - PRESENT: ページが有効
    /// - WRITABLE: 書き込み可能
    /// - USER: ユーザ空間からアクセス可能
    /// - NO_EXEC: 実行禁止（NX bit 相当）
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const NO_EXEC = 1 << 63;
    }
}

impl PageFlags {
    /// プロセス用データ/スタックページの既定属性
    pub const USER_RW: PageFlags = PageFlags::PRESENT
        .union(PageFlags::WRITABLE)
        .union(PageFlags::USER);
}

bitflags::bitflags! {
    /// #PF のエラーコード（ハードウェアが積む値の下位ビット）
    ///
    /// - PRESENT: 0 = 未マップ, 1 = 保護違反
    /// - WRITE:   0 = read, 1 = write
    /// - USER:    0 = kernel モードで発生, 1 = user モードで発生
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FaultCode: u64 {
        const PRESENT = 1 << 0;
        const WRITE = 1 << 1;
        const USER = 1 << 2;
    }
}

impl FaultCode {
    pub fn operation(self) -> &'static str {
        if self.contains(FaultCode::WRITE) {
            "write"
        } else {
            "read"
        }
    }

    pub fn problem(self) -> &'static str {
        if self.contains(FaultCode::PRESENT) {
            "protection problem"
        } else {
            "missing page"
        }
    }

    pub fn is_user(self) -> bool {
        self.contains(FaultCode::USER)
    }
}
