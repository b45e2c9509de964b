#![allow(dead_code)]
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)]

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
compile_error!("exit_guard supports Linux, Android and Darwin only");

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
compile_error!("exit_guard supports only 64-bit architectures: aarch64 and x86_64");

// 公共 API 层：安装调度、报告查询、记录导出
mod api;
// 错误码定义
mod errno;
// 日志输出：Android logcat，其他平台 stderr
mod log;
// 平台相关：内存保护与指令缓存
mod platform;
// 运行时：符号解析、补丁写入、拦截目录、ObjC 补丁、安装编排
mod runtime;
// 版本信息
mod version;

pub use api::{
    CallingConvention, Capability, ClassHandle, CodePatcher, DlsymResolver, DynamicObjcRuntime,
    EntryReport, HookKind, InlinePatcher, InstallEnv, InstallOptions, InstallReport, InstallState,
    InstallationOutcome, NoopImp, ObjcRuntime, OverrideEntry, RECORD_ITEM_ALL, RECORD_ITEM_ERRNO,
    RECORD_ITEM_NAME, RECORD_ITEM_NEW_ADDR, RECORD_ITEM_OP, RECORD_ITEM_OUTCOME,
    RECORD_ITEM_TARGET_ADDR, RECORD_ITEM_TIMESTAMP, Redirect, Replacement, RpcExport,
    RuntimeStatus, SymbolResolver, dump_records, get_debug, get_records, get_recordable,
    get_report, get_state, get_version, init, install_now, install_with, override_catalog,
    rpc_exports, set_debug, set_recordable,
};
pub use errno::Errno as ExitGuardErrno;
