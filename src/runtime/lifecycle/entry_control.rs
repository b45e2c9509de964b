// 运行时控制入口：debug/record 开关与记录导出
use crate::api::RpcExport;
use crate::errno::Errno;

use super::super::record;
use super::super::state::GLOBAL;
use crate::runtime::state::MutexPoisonRecover;

// 目前不导出任何远程调用
static RPC_EXPORTS: [RpcExport; 0] = [];

pub(super) fn get_debug() -> bool {
    let state = GLOBAL.state.lock_or_poison();
    state.debug
}

pub(super) fn set_debug(debug: bool) {
    let mut state = GLOBAL.state.lock_or_poison();
    state.debug = debug;
    crate::log::set_debug_enabled(debug);
}

pub(super) fn get_recordable() -> bool {
    let state = GLOBAL.state.lock_or_poison();
    state.recordable
}

pub(super) fn set_recordable(recordable: bool) {
    let mut state = GLOBAL.state.lock_or_poison();
    state.recordable = recordable;
}

pub(super) fn get_records(item_flags: u32) -> Option<String> {
    let state = GLOBAL.state.lock_or_poison();
    record::get_records_text(&state, item_flags)
}

pub(super) fn dump_records(fd: i32, item_flags: u32) -> Errno {
    let text = {
        let state = GLOBAL.state.lock_or_poison();
        record::get_records_text(&state, item_flags)
    };
    let Some(text) = text else {
        return Errno::Ok;
    };
    match record::dump_records_text(fd, &text) {
        Ok(()) => Errno::Ok,
        Err(err) => err,
    }
}

pub(super) fn rpc_exports() -> &'static [RpcExport] {
    &RPC_EXPORTS
}

// 测试间复位全局状态
#[cfg(test)]
pub(super) fn reset() {
    let _install_guard = GLOBAL.install_mutex.lock_or_poison();
    *GLOBAL.state.lock_or_poison() = super::super::state::CoreState::default();
    crate::log::set_debug_enabled(false);
}
