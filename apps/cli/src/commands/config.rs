//! 配置管理命令

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs;
use std::path::Path;
use ustepper_sdk::StepperConfig;

use crate::settings::{default_config_file, resolve};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, explicit: Option<&Path>, endpoint: Option<&str>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let effective = resolve(explicit, endpoint)?;
                print!("{}", effective.to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Init { force } => {
                let path = match explicit {
                    Some(path) => path.to_path_buf(),
                    None => default_config_file()?,
                };
                init(&path, *force)?;
                println!("✅ 配置已写入 {}", path.display());
                Ok(())
            },
        }
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} 已存在（使用 --force 覆盖）", path.display());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("创建配置目录失败")?;
    }
    let content = StepperConfig::default().to_toml_string()?;
    fs::write(path, content).context("写入配置文件失败")?;
    Ok(())
}
