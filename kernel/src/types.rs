/*!
 * types
 *
 * 役割:
 *   - カーネル全体で共有する素朴な型・定数を集約する。
 *
 * やること:
 *   - pid / program id の newtype、プロセス表の容量、タイマ周波数。
 *
 * やらないこと:
 *   - アドレス計算（mem::layout の責務）や arch 依存処理。
 *
 * 設計方針:
 *   - 依存を増やさず、kernel / arch / tooling の全員が同じ定数を見る。
 */

use core::fmt;

/// プロセス表の容量。pid 0 は予約で、生きたプロセスには割り当てない。
pub const NPROC: usize = 16;

/// タイマ割り込み周波数（interrupts/sec）
pub const HZ: u32 = 100;

/// プロセス ID。常にプロセス表の index と一致する。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub usize);

impl Pid {
    /// 循環スキャン順での次の pid（NPROC で wrap する）
    pub const fn next(self) -> Pid {
        Pid((self.0 + 1) % NPROC)
    }

    /// 生きたプロセスに使える pid か（1..NPROC）
    pub const fn is_assignable(self) -> bool {
        self.0 >= 1 && self.0 < NPROC
    }

    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ローダが知っているプログラムイメージの番号
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramId(pub usize);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
