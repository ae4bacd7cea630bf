// kernel/src/mem/mod.rs
//
// 役割:
// - メモリ関連のサブモジュールをまとめる中継点。
// - addr.rs / paging.rs / layout.rs を公開する。

pub mod addr;
pub mod layout;
pub mod paging;
