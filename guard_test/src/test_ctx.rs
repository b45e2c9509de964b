use std::cell::RefCell;
use std::ffi::{CStr, c_int, c_void};
use std::io::Write;

use exit_guard::{
    ClassHandle, DlsymResolver, ExitGuardErrno, InstallReport, InstallationOutcome, NoopImp,
    ObjcRuntime, SymbolResolver,
};

pub type ExitFn = unsafe extern "C" fn(c_int);
pub type AbortFn = unsafe extern "C" fn();
pub type RaiseFn = unsafe extern "C" fn(c_int) -> c_int;
pub type KillFn = unsafe extern "C" fn(libc::pid_t, c_int) -> c_int;

pub const NATIVE_NAMES: [&str; 6] = ["exit", "_exit", "abort", "raise", "kill", "killpg"];

// exit/abort 被拦截后会返回，进程只能通过原始系统调用结束
pub fn exit_process(code: c_int) -> ! {
    let _ = std::io::stdout().flush();
    unsafe {
        libc::syscall(libc::SYS_exit_group, code);
    }
    loop {
        std::hint::spin_loop();
    }
}

// panic 默认路径最终调用 abort/exit，失败时直接退出
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("guard_test failed: {info}");
        exit_process(1);
    }));
}

// 以 libc 原型取函数指针，调用走的是被改写后的入口
pub unsafe fn lookup<T: Copy>(name: &CStr) -> T {
    assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<usize>());
    let addr = libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) as usize;
    assert_ne!(addr, 0, "{} not resolvable", name.to_string_lossy());
    std::mem::transmute_copy::<usize, T>(&addr)
}

pub unsafe fn entry_bytes(name: &CStr) -> Vec<u8> {
    let addr = libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) as usize;
    assert_ne!(addr, 0, "{} not resolvable", name.to_string_lossy());
    (0..16)
        .map(|offset| unsafe { std::ptr::read_volatile((addr + offset) as *const u8) })
        .collect()
}

pub fn ensure_outcome(report: &InstallReport, name: &str, expected: InstallationOutcome) {
    assert_eq!(report.outcome_of(name), Some(expected), "{name}");
}

// 在 fd 2 被临时重定向到管道期间执行 f，返回期间写出的全部内容
#[cfg(not(target_os = "android"))]
pub fn capture_stderr<F: FnOnce()>(f: F) -> String {
    let mut fds = [0; 2];
    unsafe {
        assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
        let saved = libc::dup(libc::STDERR_FILENO);
        assert!(saved >= 0);
        libc::dup2(fds[1], libc::STDERR_FILENO);
        libc::close(fds[1]);

        f();

        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);

        let mut output = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let read = libc::read(fds[0], buf.as_mut_ptr() as *mut c_void, buf.len());
            if read <= 0 {
                break;
            }
            output.extend_from_slice(&buf[..read as usize]);
        }
        libc::close(fds[0]);
        String::from_utf8_lossy(&output).into_owned()
    }
}

// logcat 无法回读，只执行不校验
#[cfg(target_os = "android")]
pub fn capture_stderr<F: FnOnce()>(f: F) -> String {
    f();
    String::new()
}

pub fn expect_logged(output: &str, needle: &str) {
    if cfg!(target_os = "android") {
        return;
    }
    assert!(output.contains(needle), "missing log {needle:?} in {output:?}");
}

// 把指定符号伪装成不存在
pub struct HidingResolver {
    inner: DlsymResolver,
    hidden: &'static [&'static str],
}

impl HidingResolver {
    pub fn new(hidden: &'static [&'static str]) -> Self {
        Self {
            inner: DlsymResolver::new(),
            hidden,
        }
    }
}

impl SymbolResolver for HidingResolver {
    fn resolve(&self, name: &CStr) -> Option<usize> {
        let text = name.to_str().ok()?;
        if self.hidden.contains(&text) {
            return None;
        }
        self.inner.resolve(name)
    }
}

// 只实现 -terminate 的 UIApplication
pub struct FakeUiApplication {
    pub selectors: &'static [&'static str],
    pub replaced: RefCell<Vec<(String, NoopImp)>>,
}

impl FakeUiApplication {
    pub fn new(selectors: &'static [&'static str]) -> Self {
        Self {
            selectors,
            replaced: RefCell::new(Vec::new()),
        }
    }

    pub fn imp_for(&self, selector: &str) -> Option<NoopImp> {
        self.replaced
            .borrow()
            .iter()
            .find(|(name, _)| name == selector)
            .map(|(_, imp)| *imp)
    }
}

const FAKE_CLASS: ClassHandle = ClassHandle(0x0a11_0000);

impl ObjcRuntime for FakeUiApplication {
    fn is_available(&self) -> bool {
        true
    }

    fn lookup_class(&self, name: &CStr) -> Option<ClassHandle> {
        (name == c"UIApplication").then_some(FAKE_CLASS)
    }

    fn instances_respond_to(&self, class: ClassHandle, selector: &CStr) -> bool {
        let selector = selector.to_string_lossy();
        class == FAKE_CLASS && self.selectors.iter().any(|known| *known == selector)
    }

    fn replace_method(
        &self,
        _class: ClassHandle,
        selector: &CStr,
        imp: NoopImp,
    ) -> Result<(), ExitGuardErrno> {
        self.replaced
            .borrow_mut()
            .push((selector.to_string_lossy().into_owned(), imp));
        Ok(())
    }
}
