#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(any(target_os = "linux", target_os = "android"))]
mod scenarios;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod test_ctx;

use exit_guard::{get_version, set_debug};

// 会改写本进程 libc 的 exit/abort/kill 等入口，结束时必须走 exit_group
#[cfg(any(target_os = "linux", target_os = "android"))]
fn main() {
    test_ctx::install_panic_hook();
    // killpg 场景只允许波及自身
    unsafe {
        libc::setpgid(0, 0);
    }
    set_debug(true);
    println!("{}", get_version());
    unsafe {
        scenarios::run_all();
    }
    println!("guard_test all scenarios passed");
    test_ctx::exit_process(0);
}

// Darwin 的代码页不允许改写，只能在注入到真实 App 后验证
#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn main() {
    set_debug(true);
    println!("{}", get_version());
    println!("guard_test requires Linux or Android, skipped");
}
