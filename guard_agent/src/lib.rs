// 注入即生效的代理库
// 通过 LD_PRELOAD / DYLD_INSERT_LIBRARIES 或任意注入器加载后，构造函数调度一次性延迟安装：
//   LD_PRELOAD=/path/to/libguard_agent.so ./target_app
//   EXIT_GUARD_DELAY_MS / EXIT_GUARD_DEBUG / EXIT_GUARD_RECORD 可调整行为
use exit_guard::{InstallOptions, RECORD_ITEM_ALL, dump_records, init, install_now};
use std::ffi::c_int;
use std::panic::catch_unwind;

#[used]
#[cfg_attr(
    any(target_os = "macos", target_os = "ios"),
    unsafe(link_section = "__DATA,__mod_init_func")
)]
#[cfg_attr(
    any(target_os = "linux", target_os = "android"),
    unsafe(link_section = ".init_array")
)]
static INIT_ARRAY: extern "C" fn() = guard_agent_init;

// 构造函数里的 panic 不能越过 C 边界
extern "C" fn guard_agent_init() {
    let _ = catch_unwind(|| init(InstallOptions::from_env()));
}

// 供注入方在不想等待延迟时主动触发，返回成功安装的项数
#[unsafe(no_mangle)]
pub extern "C" fn exit_guard_install_now() -> c_int {
    catch_unwind(|| install_now().installed_count() as c_int).unwrap_or(-1)
}

#[unsafe(no_mangle)]
pub extern "C" fn exit_guard_dump_records(fd: c_int) -> c_int {
    catch_unwind(|| dump_records(fd, RECORD_ITEM_ALL).as_i32()).unwrap_or(-1)
}
