// 拦截后的替换体：只记录一条日志，不终止、不发信号
// 签名必须与被替换的 libc 函数保持 C ABI 一致
use crate::log;
use std::ffi::c_int;

pub(super) unsafe extern "C" fn blocked_exit(status: c_int) {
    log::warn(format_args!("exit({status}) intercepted, blocked"));
}

pub(super) unsafe extern "C" fn blocked_underscore_exit(status: c_int) {
    log::warn(format_args!("_exit({status}) intercepted, blocked"));
}

pub(super) unsafe extern "C" fn blocked_abort() {
    log::warn(format_args!("abort() intercepted, blocked"));
}

pub(super) unsafe extern "C" fn blocked_raise(signal: c_int) -> c_int {
    log::warn(format_args!("raise({signal}) intercepted, returning 0"));
    0
}

pub(super) unsafe extern "C" fn blocked_kill(pid: c_int, signal: c_int) -> c_int {
    log::warn(format_args!("kill({pid}, {signal}) intercepted, returning 0"));
    0
}

pub(super) unsafe extern "C" fn blocked_killpg(pgrp: c_int, signal: c_int) -> c_int {
    log::warn(format_args!("killpg({pgrp}, {signal}) intercepted, returning 0"));
    0
}
