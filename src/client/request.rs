//! 扫描请求参数
//!
//! 序列化后即为 POST 到扫描接口的 JSON 请求体。客户端不校验这些字段，
//! 只负责原样发送。

use serde::{Deserialize, Serialize};

fn default_filter_level() -> i32 {
    -1
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

/// 扫描请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// 起始 URL
    pub url: String,

    /// 逗号分隔的排除关键字
    #[serde(default)]
    pub exclude: String,

    /// 过滤级别，-1 表示不设置
    #[serde(default = "default_filter_level")]
    pub filter_level: i32,

    #[serde(default)]
    pub exclude_external: bool,

    #[serde(default)]
    pub exclude_internal: bool,

    #[serde(default)]
    pub follow: bool,

    /// 使用 GET 代替 HEAD
    #[serde(default)]
    pub get: bool,

    #[serde(default)]
    pub ordered: bool,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub verbose: bool,

    /// 最大并发请求数，0 表示不设置
    #[serde(default)]
    pub requests: u32,

    /// 每个主机的最大并发请求数，0 表示不设置
    #[serde(default)]
    pub host_requests: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ScanRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exclude: String::new(),
            filter_level: default_filter_level(),
            exclude_external: false,
            exclude_internal: false,
            follow: false,
            get: false,
            ordered: false,
            recursive: false,
            verbose: false,
            requests: 0,
            host_requests: 0,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = exclude.into();
        self
    }

    pub fn with_filter_level(mut self, level: i32) -> Self {
        self.filter_level = level;
        self
    }

    pub fn with_exclude_external(mut self, value: bool) -> Self {
        self.exclude_external = value;
        self
    }

    pub fn with_exclude_internal(mut self, value: bool) -> Self {
        self.exclude_internal = value;
        self
    }

    pub fn with_follow(mut self, value: bool) -> Self {
        self.follow = value;
        self
    }

    pub fn with_get(mut self, value: bool) -> Self {
        self.get = value;
        self
    }

    pub fn with_ordered(mut self, value: bool) -> Self {
        self.ordered = value;
        self
    }

    pub fn with_recursive(mut self, value: bool) -> Self {
        self.recursive = value;
        self
    }

    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    pub fn with_requests(mut self, requests: u32) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_host_requests(mut self, host_requests: u32) -> Self {
        self.host_requests = host_requests;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// 拆分并 trim 排除关键字，跳过空项
    pub fn exclude_keywords(&self) -> Vec<&str> {
        self.exclude
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
    }
}
