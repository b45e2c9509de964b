// 安装过程错误码，0 表示成功
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Errno {
    Ok = 0,                  // 成功
    InvalidArg = 2,          // 参数无效（空地址等）
    NoSym = 3,               // 符号未找到
    GetProt = 4,             // 读取内存保护属性失败
    SetProt = 5,             // 设置内存保护属性失败
    PatchVerify = 6,         // 写入后回读校验失败
    BadMaps = 7,             // /proc/self/maps 解析失败
    RuntimeUnavailable = 8,  // ObjC 运行时不可用
    NoClass = 9,             // 生命周期类不存在
    MethodAbsent = 10,       // 目标方法不存在
    MethodReplace = 11,      // 替换方法实现失败
    Panicked = 12,           // 故障边界捕获到 panic
    ThreadSpawn = 13,        // 延迟安装线程创建失败
    Repeat = 14,             // 重复请求
    Invalid = 1002,          // 无效状态
}

impl Errno {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<Errno> for i32 {
    fn from(value: Errno) -> Self {
        value as i32
    }
}
