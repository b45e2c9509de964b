// 单元测试共用的夹具：可执行的牺牲页、假解析器、假补丁器、假 ObjC 运行时
// 测试绝不改写测试进程自身的 libc
use crate::api::{
    ClassHandle, CodePatcher, NoopImp, ObjcRuntime, Redirect, SymbolResolver,
};
use crate::errno::Errno;
use crate::platform::memory::{
    PROT_EXEC_FLAG, PROT_READ_FLAG, flush_instruction_cache_range, set_mem_protect,
};
use std::cell::RefCell;
use std::ffi::{CStr, c_void};
use std::sync::{Mutex, MutexGuard};

// 全局状态相关测试串行执行
static RUNTIME_TEST_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn lock_runtime_tests() -> MutexGuard<'static, ()> {
    RUNTIME_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) const VICTIM_SLOT: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum VictimKind {
    // int f(...) { return 42; }
    ReturnsFortyTwo,
    // 一执行就陷入
    Traps,
}

#[cfg(target_arch = "x86_64")]
fn victim_code(kind: VictimKind) -> Vec<u8> {
    let mut code = match kind {
        VictimKind::ReturnsFortyTwo => vec![0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3],
        VictimKind::Traps => vec![0x0F, 0x0B],
    };
    code.resize(VICTIM_SLOT, 0xCC);
    code
}

#[cfg(target_arch = "aarch64")]
fn victim_code(kind: VictimKind) -> Vec<u8> {
    const MOV_W0_42: u32 = 0x5280_0540;
    const RET: u32 = 0xd65f_03c0;
    const BRK_0: u32 = 0xd420_0000;
    let words: Vec<u32> = match kind {
        VictimKind::ReturnsFortyTwo => vec![MOV_W0_42, RET],
        VictimKind::Traps => vec![BRK_0],
    };
    let mut code: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    while code.len() < VICTIM_SLOT {
        code.extend_from_slice(&BRK_0.to_le_bytes());
    }
    code
}

// 一页私有匿名映射，按槽位放置已知的机器码，最终保护为 r-x
pub(crate) struct VictimPage {
    base: usize,
    size: usize,
}

impl VictimPage {
    pub(crate) fn new(kinds: &[VictimKind]) -> Self {
        let size = crate::platform::memory::page_size();
        assert!(kinds.len() * VICTIM_SLOT <= size);
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(base, libc::MAP_FAILED);
        let base = base as usize;
        for (index, kind) in kinds.iter().enumerate() {
            let code = victim_code(*kind);
            unsafe {
                std::ptr::copy_nonoverlapping(
                    code.as_ptr(),
                    (base + index * VICTIM_SLOT) as *mut u8,
                    code.len(),
                );
            }
        }
        set_mem_protect(base, size, PROT_READ_FLAG | PROT_EXEC_FLAG).unwrap();
        flush_instruction_cache_range(base, base + size);
        Self { base, size }
    }

    pub(crate) fn addr(&self, slot: usize) -> usize {
        self.base + slot * VICTIM_SLOT
    }

    pub(crate) fn bytes(&self, slot: usize, len: usize) -> Vec<u8> {
        let start = self.addr(slot);
        (0..len)
            .map(|offset| unsafe { std::ptr::read_volatile((start + offset) as *const u8) })
            .collect()
    }

    pub(crate) fn call_int(&self, slot: usize, arg: i32) -> i32 {
        let func: unsafe extern "C" fn(i32) -> i32 =
            unsafe { std::mem::transmute::<usize, _>(self.addr(slot)) };
        unsafe { func(arg) }
    }

    pub(crate) fn call_void(&self, slot: usize, arg: i32) {
        let func: unsafe extern "C" fn(i32) = unsafe { std::mem::transmute::<usize, _>(self.addr(slot)) };
        unsafe { func(arg) }
    }
}

impl Drop for VictimPage {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut c_void, self.size);
        }
    }
}

// 名称到地址的静态映射
#[derive(Default)]
pub(crate) struct MapResolver {
    entries: Vec<(String, usize)>,
}

impl MapResolver {
    pub(crate) fn with(mut self, name: &str, addr: usize) -> Self {
        self.entries.push((name.to_string(), addr));
        self
    }
}

impl SymbolResolver for MapResolver {
    fn resolve(&self, name: &CStr) -> Option<usize> {
        let name = name.to_str().ok()?;
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, addr)| *addr)
    }
}

// 只记录调用、不写内存的补丁器
#[derive(Default)]
pub(crate) struct RecordingPatcher {
    pub(crate) calls: RefCell<Vec<(usize, usize)>>,
    pub(crate) fail_at: Option<(usize, Errno)>,
    pub(crate) panic_at: Option<usize>,
}

impl CodePatcher for RecordingPatcher {
    fn redirect(&self, target: usize, replacement: usize) -> Result<Redirect, Errno> {
        if self.panic_at == Some(target) {
            panic!("patcher exploded at 0x{target:x}");
        }
        self.calls.borrow_mut().push((target, replacement));
        match self.fail_at {
            Some((addr, errno)) if addr == target => Err(errno),
            _ => Ok(Redirect::Patched),
        }
    }
}

pub(crate) struct FakeObjcRuntime {
    pub(crate) available: bool,
    pub(crate) class: Option<ClassHandle>,
    pub(crate) selectors: Vec<&'static str>,
    pub(crate) fail_replace: Option<&'static str>,
    pub(crate) panic_on: Option<&'static str>,
    pub(crate) replaced: RefCell<Vec<(String, usize)>>,
}

impl FakeObjcRuntime {
    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            class: None,
            selectors: Vec::new(),
            fail_replace: None,
            panic_on: None,
            replaced: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_class(selectors: &[&'static str]) -> Self {
        Self {
            available: true,
            class: Some(ClassHandle(0x5150)),
            selectors: selectors.to_vec(),
            ..Self::unavailable()
        }
    }

    pub(crate) fn replaced_selectors(&self) -> Vec<String> {
        self.replaced
            .borrow()
            .iter()
            .map(|(selector, _)| selector.clone())
            .collect()
    }
}

impl ObjcRuntime for FakeObjcRuntime {
    fn is_available(&self) -> bool {
        self.available
    }

    fn lookup_class(&self, name: &CStr) -> Option<ClassHandle> {
        if !self.available || name != c"UIApplication" {
            return None;
        }
        self.class
    }

    fn instances_respond_to(&self, class: ClassHandle, selector: &CStr) -> bool {
        let selector = selector.to_string_lossy();
        if self.panic_on == Some(selector.as_ref()) {
            panic!("introspection exploded on {selector}");
        }
        self.class == Some(class) && self.selectors.iter().any(|known| *known == selector)
    }

    fn replace_method(&self, _class: ClassHandle, selector: &CStr, imp: NoopImp) -> Result<(), Errno> {
        let selector = selector.to_string_lossy().into_owned();
        if self.fail_replace == Some(selector.as_str()) {
            return Err(Errno::MethodReplace);
        }
        self.replaced.borrow_mut().push((selector, imp as usize));
        Ok(())
    }
}
