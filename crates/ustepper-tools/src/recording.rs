//! # 录制序列
//!
//! 控制器把录制保存为 `recording.txt`：每行一条指令，以换行结尾。

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use ustepper_protocol::{Command, ProtocolError};

#[derive(Error, Debug)]
pub enum RecordingError {
    /// 某一行不是合法指令（行号从 1 开始）
    #[error("line {line}: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 录制序列（原始文本行）
///
/// 行内容按原样保存，只有在调用 [`commands`](Self::commands) 时才解析。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSequence {
    lines: Vec<String>,
}

impl RecordingSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析换行分隔的文本
    ///
    /// 结尾的换行不产生空行；`\r\n` 也被接受。
    pub fn parse(text: &str) -> Self {
        let lines = text
            .strip_suffix('\n')
            .unwrap_or(text)
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect::<Vec<_>>();

        // 空文本没有任何行
        if lines.len() == 1 && lines[0].is_empty() {
            return Self::new();
        }
        Self { lines }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RecordingError> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn push(&mut self, command: &Command) {
        self.lines.push(command.encode());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 把每一行解析为指令，遇到第一条非法行即返回错误
    pub fn commands(&self) -> Result<Vec<Command>, RecordingError> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                Command::from_str(line).map_err(|source| RecordingError::InvalidLine {
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    /// 序列化为文件内容（每行以 `\n` 结尾）
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

impl fmt::Display for RecordingSequence {
    /// 带行号的列表，空序列显示 `No lines recorded`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return writeln!(f, "No lines recorded");
        }
        for (i, line) in self.lines.iter().enumerate() {
            writeln!(f, "{:>4}: {}", i + 1, line)?;
        }
        Ok(())
    }
}

impl FromIterator<Command> for RecordingSequence {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().map(|c| c.encode()).collect(),
        }
    }
}
