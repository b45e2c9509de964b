// ObjC 运行时函数在运行时通过 dlsym 取得，没有 libobjc 的进程中全部为 None
use crate::api::{ClassHandle, NoopImp, ObjcRuntime, SymbolResolver};
use crate::errno::Errno;
use crate::runtime::resolver::DlsymResolver;
use std::ffi::{CStr, c_char, c_void};

type ObjcGetClassFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type SelRegisterNameFn = unsafe extern "C" fn(*const c_char) -> *const c_void;
// BOOL 在 arm64 上是 bool，在 x86_64 上是 signed char，统一按低字节读取
type ClassRespondsToSelectorFn = unsafe extern "C" fn(*mut c_void, *const c_void) -> u8;
type ClassGetInstanceMethodFn = unsafe extern "C" fn(*mut c_void, *const c_void) -> *mut c_void;
type MethodSetImplementationFn = unsafe extern "C" fn(*mut c_void, *const c_void) -> *const c_void;

#[derive(Clone, Copy)]
struct ObjcFns {
    get_class: ObjcGetClassFn,
    register_selector: SelRegisterNameFn,
    responds_to_selector: ClassRespondsToSelectorFn,
    get_instance_method: ClassGetInstanceMethodFn,
    set_implementation: MethodSetImplementationFn,
}

#[derive(Clone, Copy, Default)]
pub struct DynamicObjcRuntime {
    fns: Option<ObjcFns>,
}

impl DynamicObjcRuntime {
    // 任一函数缺失即视为运行时不可用
    pub fn new() -> Self {
        Self::from_resolver(&DlsymResolver::new())
    }

    pub fn from_resolver(resolver: &dyn SymbolResolver) -> Self {
        let fns = (|| {
            let get_class = resolver.resolve(c"objc_getClass")?;
            let register_selector = resolver.resolve(c"sel_registerName")?;
            let responds_to_selector = resolver.resolve(c"class_respondsToSelector")?;
            let get_instance_method = resolver.resolve(c"class_getInstanceMethod")?;
            let set_implementation = resolver.resolve(c"method_setImplementation")?;
            unsafe {
                Some(ObjcFns {
                    get_class: std::mem::transmute::<usize, ObjcGetClassFn>(get_class),
                    register_selector: std::mem::transmute::<usize, SelRegisterNameFn>(
                        register_selector,
                    ),
                    responds_to_selector: std::mem::transmute::<usize, ClassRespondsToSelectorFn>(
                        responds_to_selector,
                    ),
                    get_instance_method: std::mem::transmute::<usize, ClassGetInstanceMethodFn>(
                        get_instance_method,
                    ),
                    set_implementation: std::mem::transmute::<usize, MethodSetImplementationFn>(
                        set_implementation,
                    ),
                })
            }
        })();
        Self { fns }
    }

    fn selector(fns: &ObjcFns, name: &CStr) -> *const c_void {
        unsafe { (fns.register_selector)(name.as_ptr()) }
    }
}

impl ObjcRuntime for DynamicObjcRuntime {
    fn is_available(&self) -> bool {
        self.fns.is_some()
    }

    fn lookup_class(&self, name: &CStr) -> Option<ClassHandle> {
        let fns = self.fns.as_ref()?;
        let class = unsafe { (fns.get_class)(name.as_ptr()) };
        if class.is_null() {
            None
        } else {
            Some(ClassHandle(class as usize))
        }
    }

    fn instances_respond_to(&self, class: ClassHandle, selector: &CStr) -> bool {
        let Some(fns) = self.fns.as_ref() else {
            return false;
        };
        let sel = Self::selector(fns, selector);
        if sel.is_null() {
            return false;
        }
        unsafe { (fns.responds_to_selector)(class.0 as *mut c_void, sel) != 0 }
    }

    fn replace_method(&self, class: ClassHandle, selector: &CStr, imp: NoopImp) -> Result<(), Errno> {
        let fns = self.fns.as_ref().ok_or(Errno::RuntimeUnavailable)?;
        let sel = Self::selector(fns, selector);
        if sel.is_null() {
            return Err(Errno::MethodAbsent);
        }
        let method = unsafe { (fns.get_instance_method)(class.0 as *mut c_void, sel) };
        if method.is_null() {
            return Err(Errno::MethodAbsent);
        }
        unsafe {
            (fns.set_implementation)(method, imp as *const c_void);
        }
        Ok(())
    }
}
