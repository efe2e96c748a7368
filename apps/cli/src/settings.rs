//! 配置文件定位与加载
//!
//! 优先级：`--config` 指定的文件 > `~/.config/ustepper/config.toml` > 内置默认值；
//! `--endpoint` 最后覆盖地址。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use ustepper_sdk::StepperConfig;

/// 默认配置文件路径
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("无法确定配置目录")?;
    path.push("ustepper");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置并应用命令行覆盖
pub fn resolve(explicit: Option<&Path>, endpoint: Option<&str>) -> Result<StepperConfig> {
    let mut config = match explicit {
        // 显式指定的文件必须存在
        Some(path) => StepperConfig::load(path)
            .with_context(|| format!("加载配置文件 {} 失败", path.display()))?,
        None => match default_config_file() {
            Ok(path) if path.exists() => StepperConfig::load(&path)
                .with_context(|| format!("加载配置文件 {} 失败", path.display()))?,
            _ => StepperConfig::default(),
        },
    };

    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint.to_string();
    }
    config.validate()?;
    Ok(config)
}
