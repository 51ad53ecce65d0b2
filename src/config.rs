//! 配置常量模块
//!
//! 所有可配置的语言相关常量都在这里定义，便于后期修改

/// 语言名称
pub const LANG_NAME: &str = "NanoCalc";

/// 源码文件扩展名
pub const SOURCE_EXTENSION: &str = "nano";

/// 表达式/语句块最大嵌套深度
///
/// 超过该深度的输入会以语法错误拒绝，而不是耗尽调用栈
pub const MAX_NESTING_DEPTH: usize = 256;

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
