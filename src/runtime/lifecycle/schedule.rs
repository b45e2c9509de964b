// 一次性延迟任务：独立线程睡眠 delay 后执行
use crate::log;
use crate::runtime::state::MutexPoisonRecover;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub(super) const INSTALLER_THREAD_NAME: &str = "exit_guard_installer";

// 线程创建失败时把任务交还给调用方
pub(super) fn schedule_once<F>(delay: Duration, task: F) -> Result<(), F>
where
    F: FnOnce() + Send + 'static,
{
    // 任务先放在共享槽里，spawn 失败时可以取回
    let slot = Arc::new(Mutex::new(Some(task)));
    let worker_slot = slot.clone();
    let builder = thread::Builder::new().name(INSTALLER_THREAD_NAME.to_string());
    let spawned = builder.spawn(move || {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let task = worker_slot.lock_or_poison().take();
        if let Some(task) = task {
            task();
        }
    });

    match spawned {
        Ok(_) => Ok(()),
        Err(err) => {
            log::error(format_args!("spawn {INSTALLER_THREAD_NAME} failed: {err}"));
            match slot.lock_or_poison().take() {
                Some(task) => Err(task),
                None => Ok(()),
            }
        }
    }
}
