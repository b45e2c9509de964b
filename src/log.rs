// 诊断日志：Android 输出到 logcat，其他平台直接 write(2) 到 stderr
// 所有写入失败都被吞掉，日志本身不能成为进程崩溃的原因
// 整行在栈上的定长缓冲里拼接，不分配堆内存，拦截体可在信号处理函数和 malloc 出错路径里调用
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicI32, Ordering};

pub const LOG_DEBUG: i32 = 3;
pub const LOG_INFO: i32 = 4;
pub const LOG_WARN: i32 = 5;
pub const LOG_ERROR: i32 = 6;

#[cfg(target_os = "android")]
const LOG_TAG_ANDROID: &[u8] = b"exit_guard\0";
#[cfg(not(target_os = "android"))]
const LOG_PREFIX: &str = "[exit_guard]";

// 含结尾的换行或 NUL
const LINE_CAPACITY: usize = 512;

static LOG_PRIORITY: AtomicI32 = AtomicI32::new(LOG_INFO);

#[cfg(target_os = "android")]
#[link(name = "log")]
unsafe extern "C" {
    fn __android_log_write(prio: i32, tag: *const libc::c_char, text: *const libc::c_char) -> i32;
}

// 启用时输出 DEBUG 及以上，禁用时输出 INFO 及以上
pub fn set_debug_enabled(enabled: bool) {
    let priority = if enabled { LOG_DEBUG } else { LOG_INFO };
    LOG_PRIORITY.store(priority, Ordering::SeqCst);
}

fn enabled(priority: i32) -> bool {
    LOG_PRIORITY.load(Ordering::Relaxed) <= priority
}

// 定长行缓冲：超出容量的内容被截断，内嵌的 NUL 替换为空格
struct LineBuffer {
    bytes: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuffer {
    fn new() -> Self {
        Self {
            bytes: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    // 追加结束符，始终为它保留最后一个字节
    fn terminated(&mut self, terminator: u8) -> &[u8] {
        self.bytes[self.len] = terminator;
        &self.bytes[..=self.len]
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for &byte in text.as_bytes() {
            if self.len + 1 >= LINE_CAPACITY {
                return Err(fmt::Error);
            }
            self.bytes[self.len] = if byte == 0 { b' ' } else { byte };
            self.len += 1;
        }
        Ok(())
    }
}

#[cfg_attr(target_os = "android", allow(dead_code))]
fn level_name(priority: i32) -> &'static str {
    match priority {
        LOG_DEBUG => "D",
        LOG_INFO => "I",
        LOG_WARN => "W",
        _ => "E",
    }
}

#[cfg(target_os = "android")]
fn write_log(priority: i32, args: fmt::Arguments) {
    if !enabled(priority) {
        return;
    }

    let mut line = LineBuffer::new();
    let _ = line.write_fmt(args);
    let text = line.terminated(0);

    unsafe {
        __android_log_write(
            priority,
            LOG_TAG_ANDROID.as_ptr() as *const libc::c_char,
            text.as_ptr() as *const libc::c_char,
        );
    }
}

// 整行拼好后一次 write，避免多线程同时拦截时日志行交错
#[cfg(not(target_os = "android"))]
fn write_log(priority: i32, args: fmt::Arguments) {
    if !enabled(priority) {
        return;
    }

    let mut line = LineBuffer::new();
    let _ = write!(line, "{LOG_PREFIX}[{}] {args}", level_name(priority));
    let text = line.terminated(b'\n');

    let mut offset = 0usize;
    while offset < text.len() {
        let written = unsafe {
            libc::write(
                libc::STDERR_FILENO,
                text[offset..].as_ptr() as *const libc::c_void,
                text.len() - offset,
            )
        };
        if written <= 0 {
            return;
        }
        offset += written as usize;
    }
}

pub(crate) fn info(args: fmt::Arguments) {
    write_log(LOG_INFO, args);
}

pub(crate) fn debug(args: fmt::Arguments) {
    write_log(LOG_DEBUG, args);
}

pub(crate) fn warn(args: fmt::Arguments) {
    write_log(LOG_WARN, args);
}

pub(crate) fn error(args: fmt::Arguments) {
    write_log(LOG_ERROR, args);
}
